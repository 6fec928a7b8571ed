//! Declared hyperparameter sets.
//!
//! A [`ParameterSet`] is an ordered schema of named fields. Each field holds a
//! literal default, a [`Distribution`] to sample from, or a nested set. The
//! set built with [`ParameterSet::builder`] plays the role of the declared
//! defaults; every other set is derived from it with overrides, sampling, or
//! by reading back command line arguments.
//!
//! ```
//! use hyper_params::distribution::{Choice, Double, Integer};
//! use hyper_params::params::{Field, ParameterSet};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let defaults = ParameterSet::builder("ModelHyperParams")
//!     .field("num_layers", 2)
//!     .field("dropout_rate", 0.5)
//!     .field("activation", "relu")
//!     .build()?;
//!
//! let ranges = defaults.with_overrides([
//!     ("num_layers", Field::from(Integer::new(1, 3)?)),
//!     ("dropout_rate", Double::new(-0.1, 0.9)?.into()),
//!     ("activation", Choice::categorical(["relu", "tanh"])?.into()),
//! ])?;
//!
//! let sampled = ranges.sample(&mut StdRng::seed_from_u64(0));
//! assert!(sampled.distributions().next().is_none());
//! # Ok::<(), hyper_params::errors::Error>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use rand::Rng;
use serde_json::Map;

use crate::distribution::{Choice, Distribution};
use crate::errors::{Error, Result};
use crate::value::{parse_bool, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Literal(Value),
    Distribution(Distribution),
    Nested(ParameterSet),
}

macro_rules! literal_field_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Field {
                fn from(value: $t) -> Self {
                    Field::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_field_from!(f64, f32, i64, i32, u32, bool, &str, String, Value);

impl<T: Into<Value>> From<Vec<T>> for Field {
    fn from(values: Vec<T>) -> Self {
        Field::Literal(Value::from(values))
    }
}

impl From<Distribution> for Field {
    fn from(value: Distribution) -> Self {
        Field::Distribution(value)
    }
}

impl From<crate::distribution::Double> for Field {
    fn from(value: crate::distribution::Double) -> Self {
        Field::Distribution(value.into())
    }
}

impl From<crate::distribution::Integer> for Field {
    fn from(value: crate::distribution::Integer) -> Self {
        Field::Distribution(value.into())
    }
}

impl From<crate::distribution::Boolean> for Field {
    fn from(value: crate::distribution::Boolean) -> Self {
        Field::Distribution(value.into())
    }
}

impl From<Choice> for Field {
    fn from(value: Choice) -> Self {
        Field::Distribution(value.into())
    }
}

impl From<ParameterSet> for Field {
    fn from(value: ParameterSet) -> Self {
        Field::Nested(value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Literal(v) => write!(f, "{}", v),
            Field::Distribution(d) => write!(f, "{}", d),
            Field::Nested(p) => write!(f, "{}", p),
        }
    }
}

/// What [`ParameterSet::with_args`] does with an argument that names no
/// declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UnknownFields {
    #[default]
    Reject,
    Ignore,
    /// Keep the raw string as a new literal field.
    Insert,
}

pub struct ParameterSetBuilder {
    name: String,
    fields: Vec<(String, Field)>,
}

impl ParameterSetBuilder {
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Field>) -> Self {
        self.fields.push((name.into(), default.into()));
        self
    }

    pub fn build(self) -> Result<ParameterSet> {
        if let Some(name) = self.fields.iter().map(|(name, _)| name).duplicates().next() {
            return Err(Error::DuplicateField(name.clone()));
        }
        Ok(ParameterSet {
            name: self.name,
            fields: self.fields,
            index: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    name: String,
    fields: Vec<(String, Field)>,
    index: Option<i64>,
}

impl ParameterSet {
    pub fn builder(name: impl Into<String>) -> ParameterSetBuilder {
        ParameterSetBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, field)| field)
    }

    /// The literal value of a field, `None` if it is missing or not a literal.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Field::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Top level fields that still hold a distribution.
    pub fn distributions(&self) -> impl Iterator<Item = (&str, &Distribution)> {
        self.fields.iter().filter_map(|(name, field)| match field {
            Field::Distribution(d) => Some((name.as_str(), d)),
            _ => None,
        })
    }

    /// Whether any field, at any nesting depth, still holds a distribution.
    pub fn has_distributions(&self) -> bool {
        self.fields.iter().any(|(_, field)| match field {
            Field::Literal(_) => false,
            Field::Distribution(_) => true,
            Field::Nested(p) => p.has_distributions(),
        })
    }

    /// Tag used to tell sets apart within a search. Not an identity.
    pub fn index(&self) -> Option<i64> {
        self.index
    }

    pub fn set_index(&mut self, index: i64) {
        self.index = Some(index);
    }

    pub fn clear_index(&mut self) {
        self.index = None;
    }

    /// Replaces a declared field. Literals and distributions may replace each other.
    pub fn set(&mut self, name: &str, value: impl Into<Field>) -> Result<()> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        slot.1 = value.into();
        Ok(())
    }

    /// Copies the declared defaults and applies `overrides` on top, in order.
    pub fn with_overrides<N: AsRef<str>>(
        &self,
        overrides: impl IntoIterator<Item = (N, Field)>,
    ) -> Result<ParameterSet> {
        let mut out = self.clone();
        for (name, field) in overrides {
            out.set(name.as_ref(), field)?;
        }
        Ok(out)
    }

    /// Returns an independent copy with every distribution replaced by one
    /// draw. Literal fields pass through and `self` is left untouched.
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterSet {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, field) in &self.fields {
            let sampled = match field {
                Field::Literal(v) => Field::Literal(v.clone()),
                Field::Distribution(d) => Field::Literal(d.sample(rng)),
                Field::Nested(p) => Field::Nested(p.sample(rng)),
            };
            fields.push((name.clone(), sampled));
        }
        ParameterSet {
            name: self.name.clone(),
            fields,
            index: self.index,
        }
    }

    /// Field name to value, sorted by name. Nested sets are converted
    /// recursively.
    pub fn to_dict(&self) -> Result<Map<String, serde_json::Value>> {
        let mut dict = Map::new();
        for (name, field) in self.fields.iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            let value = match field {
                Field::Literal(v) => v.to_json().ok_or_else(|| Error::Unsupported {
                    name: name.clone(),
                    reason: format!("{} has no JSON representation", v),
                })?,
                Field::Nested(p) => serde_json::Value::Object(p.to_dict()?),
                Field::Distribution(_) => {
                    return Err(Error::UnsampledDistribution(name.clone()))
                }
            };
            dict.insert(name.clone(), value);
        }
        Ok(dict)
    }

    /// Applies a mapping produced by [`ParameterSet::to_dict`] as overrides.
    pub fn with_dict(&self, dict: &Map<String, serde_json::Value>) -> Result<ParameterSet> {
        let mut out = self.clone();
        for (name, json) in dict {
            let field = match (self.get(name), json) {
                (None, _) => return Err(Error::UnknownField(name.clone())),
                (Some(Field::Nested(nested)), serde_json::Value::Object(inner)) => {
                    Field::Nested(nested.with_dict(inner)?)
                }
                (Some(_), json) => {
                    Field::Literal(Value::from_json(json).ok_or_else(|| Error::Unsupported {
                        name: name.clone(),
                        reason: "objects can only override nested parameter sets".to_string(),
                    })?)
                }
            };
            out.set(name, field)?;
        }
        Ok(out)
    }

    /// Rebuilds a set from raw `--name=value` strings, casting each one to the
    /// kind its declared field expects.
    pub fn with_args(
        &self,
        args: &BTreeMap<String, String>,
        unknown: UnknownFields,
    ) -> Result<ParameterSet> {
        let mut out = self.clone();
        for (name, raw) in args {
            let parsed = match self.get(name) {
                Some(Field::Literal(template)) => template.parse_like(raw),
                Some(Field::Distribution(d)) => parse_for_distribution(d, raw),
                Some(Field::Nested(_)) => None,
                None => match unknown {
                    UnknownFields::Reject => return Err(Error::UnknownField(name.clone())),
                    UnknownFields::Ignore => {
                        log::debug!("Ignoring undeclared argument {}", name);
                        continue;
                    }
                    UnknownFields::Insert => {
                        out.fields
                            .push((name.clone(), Field::Literal(Value::Str(raw.clone()))));
                        continue;
                    }
                },
            };
            let value = parsed.ok_or_else(|| Error::InvalidArgumentValue {
                name: name.clone(),
                value: raw.clone(),
            })?;
            out.set(name, Field::Literal(value))?;
        }
        Ok(out)
    }
}

fn parse_for_distribution(distribution: &Distribution, raw: &str) -> Option<Value> {
    match distribution {
        Distribution::Double(_) => raw.trim().parse().ok().map(Value::Float),
        Distribution::Integer(_) => raw.trim().parse().ok().map(Value::Integer),
        Distribution::Boolean(_) => parse_bool(raw).map(Value::Bool),
        Distribution::Choice(choice) => choice
            .values()
            .iter()
            .find_map(|candidate| candidate.parse_like(raw)),
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.name,
            self.fields
                .iter()
                .map(|(name, field)| format!("{}: {}", name, field))
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Boolean, Double, Integer};
    use crate::errors::ErrorKind;
    use rand::{rngs::StdRng, SeedableRng};

    fn model_defaults() -> ParameterSet {
        ParameterSet::builder("ModelHyperParams")
            .field("filter_size", 3)
            .field("num_hidden_layers", 2)
            .field("num_neurons_per_layer", 32)
            .field("dropout_rate", 0.5)
            .field("activation", "relu")
            .field("output_dir", "/tmp/output")
            .build()
            .unwrap()
    }

    fn model_ranges() -> ParameterSet {
        model_defaults()
            .with_overrides([
                ("filter_size", Field::from(Choice::discrete([3, 5, 7]).unwrap())),
                ("num_hidden_layers", Integer::new(1, 3).unwrap().into()),
                ("dropout_rate", Double::new(-0.1, 0.9).unwrap().into()),
            ])
            .unwrap()
    }

    #[test]
    fn test_defaults_keep_declaration_order() {
        let params = model_defaults();
        assert_eq!(
            params.names().collect::<Vec<_>>(),
            vec![
                "filter_size",
                "num_hidden_layers",
                "num_neurons_per_layer",
                "dropout_rate",
                "activation",
                "output_dir"
            ]
        );
        assert_eq!(params.value("filter_size"), Some(&Value::Integer(3)));
        assert_eq!(params.index(), None);
    }

    #[test]
    fn test_duplicate_declaration_is_rejected() {
        let err = ParameterSet::builder("P")
            .field("a", 1)
            .field("a", 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField(ref n) if n == "a"));
    }

    #[test]
    fn test_overrides_replace_by_name() {
        let ranges = model_ranges();
        assert!(matches!(
            ranges.get("num_hidden_layers"),
            Some(Field::Distribution(Distribution::Integer(_)))
        ));
        assert_eq!(ranges.value("activation"), Some(&Value::from("relu")));
        assert_eq!(ranges.distributions().count(), 3);

        // a distribution can be overridden back with a literal
        let fixed = ranges
            .with_overrides([("dropout_rate", Field::from(0.2))])
            .unwrap();
        assert_eq!(fixed.value("dropout_rate"), Some(&Value::Float(0.2)));
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let err = model_defaults()
            .with_overrides([("learning_rate", Field::from(0.1))])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField(ref n) if n == "learning_rate"));
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_sampling_literal_only_set_is_identity() {
        let params = model_defaults();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(params.sample(&mut rng), params);
    }

    #[test]
    fn test_sampling_does_not_mutate_source() {
        let ranges = model_ranges();
        let before = ranges.clone();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let sampled = ranges.sample(&mut rng);
            assert_eq!(sampled.distributions().count(), 0);
        }
        assert_eq!(ranges, before);
    }

    #[test]
    fn test_sample_scenario_num_layers_and_activation() {
        let ranges = ParameterSet::builder("Scenario")
            .field("num_layers", Integer::new(1, 3).unwrap())
            .field("activation", "relu")
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let sampled = ranges.sample(&mut rng);
            let layers = sampled.value("num_layers").and_then(Value::as_i64).unwrap();
            assert!(layers == 1 || layers == 2);
            assert_eq!(sampled.value("activation"), Some(&Value::from("relu")));
        }
    }

    #[test]
    fn test_sample_keeps_index_and_recurses_into_nested_sets() {
        let optimizer = ParameterSet::builder("Optimizer")
            .field("momentum", Boolean::new(0.5).unwrap())
            .build()
            .unwrap();
        let mut ranges = ParameterSet::builder("Outer")
            .field("optimizer", optimizer)
            .build()
            .unwrap();
        ranges.set_index(4);
        let sampled = ranges.sample(&mut StdRng::seed_from_u64(1));
        assert_eq!(sampled.index(), Some(4));
        match sampled.get("optimizer") {
            Some(Field::Nested(inner)) => {
                assert!(inner.value("momentum").and_then(Value::as_bool).is_some())
            }
            other => panic!("unexpected field {:?}", other),
        }
    }

    #[test]
    fn test_to_dict_is_sorted_and_recursive() {
        let inner = ParameterSet::builder("Inner")
            .field("sizes", vec![4, 8, 16])
            .build()
            .unwrap();
        let params = ParameterSet::builder("Outer")
            .field("zeta", 1)
            .field("alpha", "x")
            .field("inner", inner)
            .field("missing", Value::Null)
            .build()
            .unwrap();
        let dict = params.to_dict().unwrap();
        assert_eq!(
            dict.keys().collect::<Vec<_>>(),
            vec!["alpha", "inner", "missing", "zeta"]
        );
        assert_eq!(
            serde_json::Value::Object(dict),
            serde_json::json!({
                "alpha": "x",
                "inner": {"sizes": [4, 8, 16]},
                "missing": null,
                "zeta": 1,
            })
        );
    }

    #[test]
    fn test_to_dict_rejects_unserializable_fields() {
        let err = model_ranges().to_dict().unwrap_err();
        assert!(matches!(err, Error::UnsampledDistribution(_)));
        assert_eq!(err.kind(), ErrorKind::Serialization);

        let params = ParameterSet::builder("P")
            .field("lr", f64::NAN)
            .build()
            .unwrap();
        assert!(matches!(
            params.to_dict(),
            Err(Error::Unsupported { ref name, .. }) if name == "lr"
        ));
    }

    #[test]
    fn test_to_dict_round_trip() {
        let defaults = model_defaults();
        let sampled = model_ranges().sample(&mut StdRng::seed_from_u64(21));
        let dict = sampled.to_dict().unwrap();
        let rebuilt = defaults.with_dict(&dict).unwrap();
        for name in defaults.names() {
            assert_eq!(rebuilt.value(name), sampled.value(name), "field {}", name);
        }
    }

    #[test]
    fn test_from_args_casts_to_declared_kinds() {
        let ranges = ParameterSet::builder("ModelHyperParams")
            .field("num_hidden_layers", Integer::new(1, 4).unwrap())
            .field("num_neurons_per_layer", Choice::discrete([4, 8, 16]).unwrap())
            .field("dropout_rate", Double::new(0.0, 0.99).unwrap())
            .field("activation", Choice::categorical(["relu", "sigmoid"]).unwrap())
            .field("use_bias", Boolean::new(0.5).unwrap())
            .field("output_dir", "/tmp/output")
            .field("filter_size", 3)
            .build()
            .unwrap();
        let args: BTreeMap<String, String> = [
            ("num_hidden_layers", "3"),
            ("num_neurons_per_layer", "2"),
            ("dropout_rate", "0.2"),
            ("activation", "relu"),
            ("use_bias", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let params = ranges.with_args(&args, UnknownFields::Reject).unwrap();
        assert_eq!(params.value("num_hidden_layers"), Some(&Value::Integer(3)));
        assert_eq!(params.value("num_neurons_per_layer"), Some(&Value::Integer(2)));
        assert_eq!(params.value("dropout_rate"), Some(&Value::Float(0.2)));
        assert_eq!(params.value("activation"), Some(&Value::from("relu")));
        assert_eq!(params.value("use_bias"), Some(&Value::Bool(false)));
        assert_eq!(params.value("filter_size"), Some(&Value::Integer(3)));
        assert_eq!(
            params.to_string(),
            "ModelHyperParams(num_hidden_layers: 3, num_neurons_per_layer: 2, \
             dropout_rate: 0.2, activation: relu, use_bias: false, \
             output_dir: /tmp/output, filter_size: 3)"
        );
    }

    #[test]
    fn test_from_args_unknown_policies() {
        let defaults = model_defaults();
        let args: BTreeMap<String, String> =
            [("learning_rate".to_string(), "0.4".to_string())].into();

        let err = defaults.with_args(&args, UnknownFields::Reject).unwrap_err();
        assert!(matches!(err, Error::UnknownField(_)));

        let ignored = defaults.with_args(&args, UnknownFields::Ignore).unwrap();
        assert_eq!(ignored, defaults);

        let inserted = defaults.with_args(&args, UnknownFields::Insert).unwrap();
        assert_eq!(inserted.value("learning_rate"), Some(&Value::from("0.4")));
        assert_eq!(inserted.len(), defaults.len() + 1);
    }

    #[test]
    fn test_from_args_rejects_unparseable_values() {
        let args: BTreeMap<String, String> =
            [("filter_size".to_string(), "three".to_string())].into();
        let err = model_defaults()
            .with_args(&args, UnknownFields::Reject)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentValue { ref name, .. } if name == "filter_size"));
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_display_shows_distributions() {
        let params = ParameterSet::builder("P")
            .field("lr", Double::new(0.0, 1.0).unwrap())
            .field("act", "relu")
            .build()
            .unwrap();
        assert_eq!(params.to_string(), "P(lr: Double(0, 1), act: relu)");
    }
}
