//! Handler error types

use crate::protocol::CloseCode;
use chat_core::DomainError;
use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload rejected; the message is shown to the client as-is
    #[error("{0}")]
    Validation(String),

    /// Referenced message or user does not exist
    #[error("Not found")]
    NotFound,

    /// The store failed while performing `action`
    #[error("Failed to {action}")]
    Persistence {
        action: &'static str,
        #[source]
        source: DomainError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Wrap a store failure. A missing record becomes `NotFound`.
    pub fn persistence(action: &'static str, source: DomainError) -> Self {
        if source.is_not_found() {
            Self::NotFound
        } else {
            Self::Persistence { action, source }
        }
    }

    /// Text sent back in an `error` event, if the client should see one
    pub fn client_message(&self) -> Option<String> {
        match self {
            Self::Validation(_) | Self::Persistence { .. } => Some(self.to_string()),
            Self::NotFound | Self::Internal(_) => None,
        }
    }

    /// Convert to a close code (if applicable)
    ///
    /// Handler failures are reported in-band; only internal errors end the connection.
    pub fn to_close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Internal(_) => Some(CloseCode::UnknownError),
            Self::Validation(_) | Self::NotFound | Self::Persistence { .. } => None,
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
