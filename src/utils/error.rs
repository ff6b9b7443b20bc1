use crate::models::Domain;
use std::fmt;
use thiserror::Error;

/// Faults that stop an operation. Routine OCR misreads are never reported
/// through this type, see [`Rejection`].
#[derive(Debug, Error)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Record sink error: {0}")]
    Sink(String),
}

/// Why a candidate string failed its domain grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    Length { len: usize, min: usize, max: usize },
    Pattern,
    UnknownStateCode(String),
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MismatchReason::Length { len, min, max } => {
                write!(f, "length {} outside {}..={}", len, min, max)
            }
            MismatchReason::Pattern => write!(f, "does not match grammar"),
            MismatchReason::UnknownStateCode(code) => write!(f, "unknown state code {}", code),
        }
    }
}

/// Outcome of an observation that contributed nothing. Expected in the
/// common case and handled as an ordinary branch by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("malformed input: no alphanumeric characters in {raw:?}")]
    MalformedInput { raw: String },
    #[error("grammar mismatch for {domain}: {candidate:?} {reason}")]
    GrammarMismatch {
        domain: Domain,
        candidate: String,
        reason: MismatchReason,
    },
}

impl Rejection {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Rejection::MalformedInput { .. })
    }
}
