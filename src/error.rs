//! Error surface of the client library.
//!
//! Every variant renders as the human-readable message the views display.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// A protected operation was invoked without a credential.
    #[error("You must be logged in to {action}.")]
    Unauthenticated { action: &'static str },

    /// Caller-supplied fields failed local checks.
    #[error("{0}")]
    Validation(String),

    /// The signed-in role may not use the requested screen.
    #[error("{0}")]
    Forbidden(String),

    /// Another update for the same entity has not resolved yet.
    #[error("An update for {0} is already in progress.")]
    Busy(String),

    /// The API answered with a non-success status.
    #[error("API error ({status}){}", remote_suffix(.message))]
    Remote { status: u16, message: Option<String> },

    /// Success status, but the body was not what the endpoint promises.
    #[error("Unexpected response from API: {0}")]
    MalformedResponse(String),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Persisted session storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

fn remote_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {}", m),
        None => String::new(),
    }
}

impl ClientError {
    pub fn unauthenticated(action: &'static str) -> Self {
        Self::Unauthenticated { action }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures raised before anything was sent over the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated { .. } | Self::Validation(_) | Self::Forbidden(_) | Self::Busy(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
