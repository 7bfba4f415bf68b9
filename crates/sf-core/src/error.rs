use crate::diagnostics::Diagnostic;
use crate::ir::OpId;
use std::result;
use thiserror::Error;

fn at(op: &Option<OpId>) -> String {
    match op {
        Some(op) => format!(" at {}", op),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Broken compiler invariant: missing side-table entry, malformed terminator, unbalanced nesting.
    #[error("internal lowering error{}: {message}", at(.op))]
    Internal { op: Option<OpId>, message: String },
    /// Structured input that does not have the shape the producer promised.
    #[error("malformed structured input{}: {message}", at(.op))]
    Contract { op: Option<OpId>, message: String },
    #[error("{0}")]
    Diagnostic(Diagnostic),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            op: None,
            message: message.into(),
        }
    }

    pub fn internal_at(op: OpId, message: impl Into<String>) -> Self {
        Error::Internal {
            op: Some(op),
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Error::Contract {
            op: None,
            message: message.into(),
        }
    }

    pub fn contract_at(op: OpId, message: impl Into<String>) -> Self {
        Error::Contract {
            op: Some(op),
            message: message.into(),
        }
    }

    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(diagnostic)
    }

    /// The operation the error points at, when there is one.
    pub fn op(&self) -> Option<OpId> {
        match self {
            Error::Internal { op, .. } | Error::Contract { op, .. } => *op,
            Error::Diagnostic(_) | Error::Generic(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal { .. })
    }
}

pub type Result<T> = result::Result<T, Error>;

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
