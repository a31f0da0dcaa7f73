//! Error types for the proxy core and its transport

use thiserror::Error;

/// Errors surfaced by the public proxy API
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Multiplier outside [-1, 1] or not a finite number
    #[error("Invalid {axis} multiplier: {value} (must be within [-1, 1])")]
    InvalidMultiplier { axis: &'static str, value: f64 },

    /// No device registered under this name
    #[error("Unknown camera: {0}")]
    UnknownDevice(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure talking to the upstream camera
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection error to camera: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout
        } else if e.is_connect() {
            ForwardError::Connect(e.to_string())
        } else {
            ForwardError::Other(e.to_string())
        }
    }
}

/// XML read/write failure inside a transform; never leaves the crate
#[derive(Debug, Error)]
pub(crate) enum SoapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML write error: {0}")]
    Write(#[from] std::io::Error),

    #[error("Invalid UTF-8 in rewritten document: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
