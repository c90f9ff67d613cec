//! Error types
//!
//! Construction-time kinds abort startup. Per-request kinds are reported to the
//! single caller that triggered them and never touch shared engine state.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway error taxonomy
#[derive(Debug, Error)]
pub enum Error {
    /// A required construction parameter is missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The model artifact path does not exist
    #[error("model path does not exist: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The model artifact exists but could not be turned into a graph
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// A declared tensor is absent from the loaded graph
    #[error("Non existent tensor in graph: {0}")]
    UnknownTensor(String),

    /// A declared input tensor is not a graph entry point
    #[error("Input node must be placeholder: {0}")]
    NotAPlaceholder(String),

    /// Caller-attributable request problem
    #[error("{0}")]
    BadInput(String),

    /// Encode produced a tensor set different from the declared inputs
    #[error(
        "encode function must generate all and only input tensors (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    InputMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Diagnostic from the execution backend, carried verbatim
    #[error("{0}")]
    Execution(String),

    /// Encode callback failed without flagging bad input
    #[error("encode failed: {0}")]
    Encode(String),

    /// Decode callback failed without flagging bad input
    #[error("decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error belongs to a single request rather than to startup
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Error::BadInput(_)
                | Error::InputMismatch { .. }
                | Error::Execution(_)
                | Error::Encode(_)
                | Error::Decode(_)
        )
    }

    pub(crate) fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    pub(crate) fn model_load(msg: impl Into<String>) -> Self {
        Error::ModelLoad(msg.into())
    }
}

/// Marker error for encode/decode callbacks.
///
/// Returning this (directly or wrapped in `anyhow` context) from a callback
/// reports the request as bad input with `description` as the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct BadInput {
    pub description: String,
}

impl BadInput {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl From<BadInput> for Error {
    fn from(e: BadInput) -> Self {
        Error::BadInput(e.description)
    }
}
