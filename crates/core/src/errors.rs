use thiserror::Error;
use uuid::Uuid;

use crate::domain::campaign::CampaignStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid campaign transition from {from:?} to {to:?}")]
    InvalidCampaignTransition { from: CampaignStatus, to: CampaignStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors surfaced at the HTTP boundary. Each one is minted with a fresh
/// correlation id so a user-reported failure can be matched to server logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: new_correlation_id() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into(), correlation_id: new_correlation_id() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into(), correlation_id: new_correlation_id() }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Forbidden { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. } => correlation_id,
        }
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
