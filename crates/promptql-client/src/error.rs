use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptQlError {
    /// Transport failure before any HTTP response arrived
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// 200 response whose body is unusable
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {}s waiting for thread {thread_id} to complete", .waited.as_secs())]
    Timeout { thread_id: String, waited: Duration },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Thread {thread_id} is not currently processing")]
    CancelRejected { thread_id: String, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PromptQlError {
    /// Stable tag for structured failure results
    pub fn kind(&self) -> &'static str {
        match self {
            PromptQlError::Connection(_) => "connection_error",
            PromptQlError::Api { .. } => "api_error",
            PromptQlError::Protocol(_) => "protocol_error",
            PromptQlError::Timeout { .. } => "timeout",
            PromptQlError::NotFound(_) => "not_found",
            PromptQlError::CancelRejected { .. } => "cancel_rejected",
            PromptQlError::Config(_) => "config_error",
        }
    }

    /// Raw server payload, when there is one worth surfacing
    pub fn details(&self) -> Option<&str> {
        match self {
            PromptQlError::Api { body, .. } | PromptQlError::CancelRejected { body, .. }
                if !body.is_empty() =>
            {
                Some(body)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PromptQlError {
    fn from(err: reqwest::Error) -> Self {
        PromptQlError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PromptQlError>;
