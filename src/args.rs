use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::errors::{Error, Result};

/// Parses `--name=value` flags into a name to raw value mapping.
///
/// Values are kept as strings; [`crate::params::ParameterSet::with_args`]
/// casts them once the declared field kinds are known. Everything after the
/// first `=` belongs to the value, and a repeated name keeps its last value.
pub fn args_to_dict<I, S>(args: I) -> Result<BTreeMap<String, String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut dict = BTreeMap::new();
    for arg in args {
        let arg = arg.as_ref();
        let (name, value) = arg
            .strip_prefix("--")
            .and_then(|flag| flag.split_once('='))
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| Error::MalformedArgument(arg.to_string()))?;
        dict.insert(name.to_string(), value.to_string());
    }
    Ok(dict)
}

/// [`args_to_dict`] over the arguments of the running process.
pub fn args_to_dict_from_env() -> Result<BTreeMap<String, String>> {
    args_to_dict_os(std::env::args_os().skip(1))
}

/// [`args_to_dict`] over raw OS strings. A token that is not valid unicode
/// is malformed.
pub fn args_to_dict_os<I>(args: I) -> Result<BTreeMap<String, String>>
where
    I: IntoIterator<Item = OsString>,
{
    let args = args
        .into_iter()
        .map(|os| {
            os.into_string()
                .map_err(|os| Error::MalformedArgument(os.to_string_lossy().into_owned()))
        })
        .collect::<Result<Vec<_>>>()?;
    args_to_dict(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_flags_parse_to_strings() {
        let dict = args_to_dict(["--a=1", "--b=2"]).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict["a"], "1");
        assert_eq!(dict["b"], "2");
    }

    #[test]
    fn test_value_keeps_everything_after_first_equals() {
        let dict = args_to_dict(vec![
            "--filter=a=b".to_string(),
            "--empty=".to_string(),
            "--another_argument=\"also shows up\"".to_string(),
        ])
        .unwrap();
        assert_eq!(dict["filter"], "a=b");
        assert_eq!(dict["empty"], "");
        assert_eq!(dict["another_argument"], "\"also shows up\"");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let dict = args_to_dict(["--lr=0.1", "--lr=0.01"]).unwrap();
        assert_eq!(dict["lr"], "0.01");
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        for token in ["a=1", "-a=1", "--a", "--=1", "=1", ""] {
            let err = args_to_dict([token]).unwrap_err();
            assert!(
                matches!(err, Error::MalformedArgument(ref t) if t == token),
                "{:?}",
                err
            );
            assert_eq!(err.kind(), ErrorKind::Argument);
        }
    }

    #[test]
    fn test_os_args_parse_like_strings() {
        let dict = args_to_dict_os(vec![OsString::from("--lr=0.01")]).unwrap();
        assert_eq!(dict["lr"], "0.01");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_os_arg_is_malformed() {
        use std::os::unix::ffi::OsStringExt;

        let token = OsString::from_vec(b"--name=\xff".to_vec());
        let err = args_to_dict_os(vec![OsString::from("--a=1"), token]).unwrap_err();
        assert!(
            matches!(err, Error::MalformedArgument(ref t) if t.starts_with("--name=")),
            "{:?}",
            err
        );
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_no_args_is_empty() {
        assert!(args_to_dict(Vec::<String>::new()).unwrap().is_empty());
    }
}
