use thiserror::Error;

/// Coarse classification of an [`Error`], so callers can tell a bad
/// declaration apart from a failed render or a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Construction,
    Serialization,
    Argument,
    Submission,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid range: min ({min}) must be less than max ({max})")]
    InvalidRange { min: f64, max: f64 },

    #[error("invalid probability: {0} must be in [0, 1]")]
    InvalidProbability(f64),

    #[error("choice needs at least one candidate value")]
    EmptyChoices,

    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("discrete candidates must be numeric, got {0}")]
    NonNumericCandidate(String),

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' still holds a distribution and has no concrete value")]
    UnsampledDistribution(String),

    #[error("field '{name}' holds a value that cannot be serialized: {reason}")]
    Unsupported { name: String, reason: String },

    #[error("malformed argument '{0}', expected --name=value")]
    MalformedArgument(String),

    #[error("invalid value '{value}' for argument '{name}'")]
    InvalidArgumentValue { name: String, value: String },

    #[error("job '{job_name}' could not be submitted")]
    Submission {
        job_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRange { .. }
            | Error::InvalidProbability(_)
            | Error::EmptyChoices
            | Error::InvalidWeights(_)
            | Error::NonNumericCandidate(_)
            | Error::DuplicateField(_)
            | Error::UnknownField(_) => ErrorKind::Construction,
            Error::UnsampledDistribution(_)
            | Error::Unsupported { .. }
            | Error::Yaml(_)
            | Error::Json(_) => ErrorKind::Serialization,
            Error::MalformedArgument(_) | Error::InvalidArgumentValue { .. } => {
                ErrorKind::Argument
            }
            Error::Submission { .. } => ErrorKind::Submission,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
