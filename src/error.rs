use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A failure the remote API reported through its HTTP status, translated into
/// a stable code and a message meant for the person running the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No response generated by the model")]
    EmptyResponse,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to open URL list {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No URLs found in file {}", .path.display())]
    NoUrlsFound { path: PathBuf },

    #[error("Could not retrieve content from any URL")]
    NoContentRetrieved,
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "config_error",
            Error::Credentials(_) => "credentials_error",
            Error::Transport(_) => "transport_error",
            Error::Decode(_) => "decode_error",
            Error::EmptyResponse => "empty_response",
            Error::Api(_) => "api_error",
            Error::UnexpectedStatus(_) => "unexpected_status",
            Error::FileAccess { .. } => "file_access_error",
            Error::NoUrlsFound { .. } => "no_urls_found",
            Error::NoContentRetrieved => "no_content_retrieved",
        }
    }

    /// The classified API failure, if this is one.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
