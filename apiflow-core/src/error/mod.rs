use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared by every layer of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    FailedPrecondition,
    DeadlineExceeded,
    Canceled,
    Unsupported,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::Canceled => "CANCELED",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged failure as recorded on node executions and run outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FlowError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FlowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }
}

/// Implemented by every module-level error so it can be folded into a [`FlowError`].
pub trait Classify: fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn to_flow_error(&self) -> FlowError {
        FlowError::new(self.kind(), self.to_string())
    }
}

impl Classify for crate::varsystem::VarError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl Classify for crate::expressions::ExprError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl Classify for crate::graph::GraphError {
    fn kind(&self) -> ErrorKind {
        use crate::graph::GraphError;
        match self {
            GraphError::UnknownNode { .. } => ErrorKind::NotFound,
            GraphError::NoStart | GraphError::MultipleStart | GraphError::Cycle(_) => {
                ErrorKind::FailedPrecondition
            }
        }
    }
}

impl Classify for crate::compress::CompressError {
    fn kind(&self) -> ErrorKind {
        use crate::compress::CompressError;
        match self {
            CompressError::Unsupported(_) => ErrorKind::Unsupported,
            CompressError::Io(_) | CompressError::Json(_) => ErrorKind::Internal,
        }
    }
}

impl Classify for crate::ids::IdError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl Classify for crate::overlay::OverlayError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::FailedPrecondition
    }
}
