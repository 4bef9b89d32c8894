use std::time::Duration;
use thiserror::Error;

/// Type alias for Result with VkError
pub type Result<T> = std::result::Result<T, VkError>;

/// Error types for the VK long-poll marker
#[derive(Error, Debug)]
pub enum VkError {
    /// The request did not complete within its wait budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (DNS, TLS, reset, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// VK API returned an error envelope
    #[error("VK API error [{code}]: {message}")]
    Api { code: i64, message: String },

    /// Long-poll server reported a failure code we cannot recover from locally
    #[error("Long poll failed with code {0}")]
    LongPoll(i64),

    /// Response arrived but does not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (token file, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VkError {
    /// The network call exceeded its wait budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, VkError::Timeout(_))
    }

    /// Client, library or protocol level failure of a single request
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            VkError::Connection(_)
                | VkError::HttpStatus { .. }
                | VkError::Api { .. }
                | VkError::LongPoll(_)
                | VkError::InvalidResponse(_)
                | VkError::Serialization(_)
        )
    }

    /// An account loop logs these and keeps going
    pub fn is_recoverable(&self) -> bool {
        self.is_timeout() || self.is_transport()
    }

    /// Short name of the error kind, used in log lines
    pub fn category(&self) -> &'static str {
        match self {
            VkError::Timeout(_) => "Timeout",
            VkError::Connection(_) => "Connection",
            VkError::HttpStatus { .. } => "HttpStatus",
            VkError::Api { .. } => "Api",
            VkError::LongPoll(_) => "LongPoll",
            VkError::InvalidResponse(_) => "InvalidResponse",
            VkError::Serialization(_) => "Serialization",
            VkError::Config(_) => "Config",
            VkError::Io(_) => "Io",
        }
    }
}

impl From<hyper_util::client::legacy::Error> for VkError {
    fn from(error: hyper_util::client::legacy::Error) -> Self {
        VkError::Connection(error.to_string())
    }
}

impl From<hyper::Error> for VkError {
    fn from(error: hyper::Error) -> Self {
        VkError::Connection(error.to_string())
    }
}

impl From<hyper::http::Error> for VkError {
    fn from(error: hyper::http::Error) -> Self {
        VkError::InvalidResponse(format!("Failed to build request: {}", error))
    }
}

impl From<url::ParseError> for VkError {
    fn from(error: url::ParseError) -> Self {
        VkError::InvalidResponse(format!("Invalid URL: {}", error))
    }
}
