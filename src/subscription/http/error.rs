use thiserror::Error;

/// Message shown for a failed write when the backend gave no reason.
pub const GENERIC_FAILURE: &str = "Something went wrong";

/// Why a read or write against the backend failed.
///
/// The optional string carried by the backend variants is the `message`
/// field of the error payload, if there was one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The request never got a response.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {}", .0.as_deref().unwrap_or("the resource does not exist"))]
    NotFound(Option<String>),

    #[error("Validation failed: {}", .0.as_deref().unwrap_or("the request was rejected"))]
    Validation(Option<String>),

    #[error("Request failed: {}", .0.as_deref().unwrap_or("unexpected response"))]
    Unknown(Option<String>),
}

impl QueryError {
    /// The backend's own explanation, if it sent one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Network(_) => None,
            Self::NotFound(message) | Self::Validation(message) | Self::Unknown(message) => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
        }
    }

    /// Text suitable for a notification: the backend message or `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        self.message().unwrap_or(fallback).to_string()
    }
}

/// A failed mutation, ready to be shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct MutationError {
    /// The underlying failure.
    pub error: QueryError,
    /// Human-readable text derived from the backend payload.
    pub message: String,
}

impl MutationError {
    /// Wraps `error`, taking its backend message or falling back to `fallback`.
    #[must_use]
    pub fn new(error: QueryError, fallback: &str) -> Self {
        let message = error.user_message(fallback);
        Self { error, message }
    }
}
