//! Error types for the foreign type inspector

use crate::types::Address;
use thiserror::Error;

/// Main error type shared by every component.
///
/// Every variant is recoverable: callers degrade to "unreadable" or omit a
/// section instead of aborting the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not a mangled symbol")]
    NotMangled,

    #[error("Unsupported mangling at position {position}: {reason}")]
    UnsupportedGrammar { position: usize, reason: String },

    #[error("Type is not introspectable: {0}")]
    NotIntrospectable(String),

    #[error("No field information: {0}")]
    NoFieldInfo(String),

    #[error("Field at {address} ({size} bytes) lies outside the object")]
    OutOfBounds { address: Address, size: usize },

    #[error("Unsupported representation: {0}")]
    UnsupportedRepresentation(String),

    #[error("Field is read-only: {0}")]
    ReadOnly(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Type cannot be represented in the local encoding: {0}")]
    Unrepresentable(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unsupported_grammar(position: usize, reason: impl Into<String>) -> Self {
        Self::UnsupportedGrammar {
            position,
            reason: reason.into(),
        }
    }

    pub fn not_introspectable(msg: impl Into<String>) -> Self {
        Self::NotIntrospectable(msg.into())
    }

    pub fn no_field_info(msg: impl Into<String>) -> Self {
        Self::NoFieldInfo(msg.into())
    }

    pub fn unsupported_representation(msg: impl Into<String>) -> Self {
        Self::UnsupportedRepresentation(msg.into())
    }

    pub fn read_only(msg: impl Into<String>) -> Self {
        Self::ReadOnly(msg.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unrepresentable(msg: impl Into<String>) -> Self {
        Self::Unrepresentable(msg.into())
    }

    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Short, stable label used by display sentinels.
    pub fn label(&self) -> &'static str {
        match self {
            Error::NotMangled => "not mangled",
            Error::UnsupportedGrammar { .. } => "unsupported grammar",
            Error::NotIntrospectable(_) => "not introspectable",
            Error::NoFieldInfo(_) => "no field info",
            Error::OutOfBounds { .. } => "out of bounds",
            Error::UnsupportedRepresentation(_) => "unsupported representation",
            Error::ReadOnly(_) => "read-only",
            Error::TypeMismatch { .. } => "type mismatch",
            Error::Unrepresentable(_) => "unrepresentable",
            Error::Memory(_) => "memory",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
