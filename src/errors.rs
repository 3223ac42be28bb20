// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextileGuardError {
    #[error("{}", message_or(.0, "Authentication failed"))]
    Auth(Option<String>),

    #[error("{0}")]
    Validation(String),

    #[error("{}", message_or(.0, "Failed to fetch reports"))]
    Fetch(Option<String>),

    #[error("{}", message_or(.0, "Failed to update report"))]
    Update(Option<String>),

    #[error("{}", message_or(.0, "Failed to delete report"))]
    Delete(Option<String>),

    #[error("{}", message_or(.0, "Error uploading report"))]
    Upload(Option<String>),

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl TextileGuardError {
    pub fn validation(message: impl Into<String>) -> Self {
        TextileGuardError::Validation(message.into())
    }

    /// Auth failure showing the server's message, or `fallback` without one.
    pub fn auth(detail: Option<String>, fallback: &str) -> Self {
        TextileGuardError::Auth(Some(detail.unwrap_or_else(|| fallback.to_string())))
    }

    /// True when the collaborator rejected the bearer token and the
    /// caller should drop the local session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, TextileGuardError::SessionExpired)
    }
}

fn message_or<'a>(message: &'a Option<String>, fallback: &'a str) -> &'a str {
    message.as_deref().unwrap_or(fallback)
}

/// Failure of a single collaborator call, before it is classified by the
/// store that issued it.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status}: {}", message_or(.detail, "no detail"))]
    Status {
        status: reqwest::StatusCode,
        detail: Option<String>,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == reqwest::StatusCode::UNAUTHORIZED)
    }

    /// Server supplied message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Status { detail, .. } => detail.clone(),
            _ => None,
        }
    }

    /// Classifies the failure with `kind`, except that a 401 always becomes
    /// `SessionExpired`.
    pub fn into_store_error(self, kind: fn(Option<String>) -> TextileGuardError) -> TextileGuardError {
        if self.is_unauthorized() {
            TextileGuardError::SessionExpired
        } else {
            kind(self.detail())
        }
    }
}
