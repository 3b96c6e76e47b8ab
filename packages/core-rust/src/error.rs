//! Error taxonomy shared by every wire protocol.
//!
//! Handlers raise [`ProtocolError`] values carrying a stable `code` string.
//! The code alone decides the [`ErrorKind`] and therefore the HTTP status; the
//! codecs decide the envelope.

use http::StatusCode;

/// Generic message used for failures that must not leak collaborator details.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// Well-known error codes produced by the core itself.
pub mod codes {
    pub const INVALID_ACTION: &str = "InvalidAction";
    pub const UNKNOWN_OPERATION: &str = "UnknownOperationException";
    pub const SERIALIZATION: &str = "SerializationException";
    pub const VALIDATION: &str = "ValidationException";
    pub const INTERNAL_FAILURE: &str = "InternalFailure";
    pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Protocol-independent classification of an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    Conflict,
    Unsupported,
    Internal,
}

impl ErrorKind {
    /// Classifies an error code by its naming family.
    ///
    /// Families are checked in order: not-found, already-exists, conflict
    /// (including `Invalid*State*` codes), internal, unsupported. Anything
    /// else is treated as invalid input.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        if code.contains("NotFound") || code.contains("DoesNotExist") || code.starts_with("NoSuch")
        {
            Self::NotFound
        } else if code.contains("Exists") || code.contains("Duplicate") {
            Self::AlreadyExists
        } else if code.contains("Conflict") || (code.starts_with("Invalid") && code.contains("State"))
        {
            Self::Conflict
        } else if matches!(
            code,
            codes::INTERNAL_FAILURE
                | "InternalError"
                | "InternalServerError"
                | codes::SERVICE_UNAVAILABLE
        ) {
            Self::Internal
        } else if matches!(
            code,
            codes::INVALID_ACTION | codes::UNKNOWN_OPERATION | "UnsupportedOperation"
        ) {
            Self::Unsupported
        } else {
            Self::InvalidInput
        }
    }

    /// HTTP status used for this kind in every protocol.
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidInput | Self::Unsupported => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// ProtocolError
// ---------------------------------------------------------------------------

/// Domain-level failure raised by an action handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    pub code: String,
    pub message: String,
}

impl ProtocolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The operation is not known to the service that received it.
    pub fn unknown_operation(operation: &str) -> Self {
        Self::new(
            codes::UNKNOWN_OPERATION,
            format!("Operation {operation} is not supported by this service"),
        )
    }

    /// The request body could not be decoded into the operation's input.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(codes::SERIALIZATION, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION, message)
    }

    /// Opaque internal failure; never carries collaborator details.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(codes::INTERNAL_FAILURE, INTERNAL_ERROR_MESSAGE)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(&self.code)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// Everything an action handler can fail with.
///
/// `Internal` wraps any failure that is not a deliberate [`ProtocolError`];
/// the dispatcher logs it and replies with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
