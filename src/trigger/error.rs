use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What is wrong with a single option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    Unknown,
    WrongType { expected: &'static str },
    NotAllowed { allowed: &'static [&'static str] },
    Invalid(String),
}

/// One offending option, addressed by its dotted path
/// (`brokers`, `authentication.password`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: String,
    pub problem: Problem,
}

impl FieldProblem {
    pub fn new(field: impl Into<String>, problem: Problem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Missing => write!(f, "`{}` is required", self.field),
            Problem::Unknown => write!(f, "`{}` is not allowed", self.field),
            Problem::WrongType { expected } => {
                write!(f, "`{}` must be a {}", self.field, expected)
            }
            Problem::NotAllowed { allowed } => {
                write!(f, "`{}` must be one of {}", self.field, allowed.join(", "))
            }
            Problem::Invalid(reason) => write!(f, "`{}` {}", self.field, reason),
        }
    }
}

/// The trigger configuration does not satisfy its schema.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration must be an object")]
    NotAnObject,
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<FieldProblem>),
    #[error("configuration cannot be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, problem: Problem) -> Self {
        ConfigurationError::Invalid(vec![FieldProblem::new(field, problem)])
    }

    /// Paths of the offending options.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ConfigurationError::Invalid(problems) => {
                problems.iter().map(|p| p.field.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A delivery attempt failed. Never retried by the trigger itself.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to connect: {0}")]
    Connect(#[source] BoxError),
    #[error("failed to send: {0}")]
    Send(#[source] BoxError),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to build a trigger from its configuration entry.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("unknown trigger type `{0}`")]
    UnknownKind(String),
    #[error("trigger {id}: {source}")]
    Configuration {
        id: String,
        #[source]
        source: ConfigurationError,
    },
}
