//! Error types for http-courier
//!
//! This module provides the error handling for the library, including:
//! - The crate-level [`Error`] for client operations (enqueue, config, shutdown)
//! - [`TransportError`] for failures raised by a transport before or while
//!   obtaining an HTTP response
//! - [`RequestError`], the typed error delivered to a request's handler,
//!   tagged with a status code and an [`ErrorDetail`] classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for http-courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for http-courier
///
/// This is the error returned by client-facing operations such as building
/// requests, constructing the client, and enqueueing work. Failures of an
/// individual request are not surfaced here; they are delivered to that
/// request's handler as a [`RequestError`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_requests")
        key: Option<String>,
    },

    /// Request could not be built (invalid URL, header, or body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Shutdown in progress - not accepting new requests
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a transport operation
///
/// A transport error means no usable HTTP response was produced. Once a
/// status code has been obtained, outcomes are classified from the status
/// instead, so this type never carries one.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client error (DNS, connect, TLS, timeout, protocol violation)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., writing a download to its destination file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-specific failure that fits no other variant
    #[error("{0}")]
    Other(String),
}

/// Classification tag carried by every delivered [`RequestError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDetail {
    /// The server answered with a status code >= 400
    ServerError,
    /// The request failed before an HTTP status code was obtained
    ConnectionError,
    /// The response arrived but could not be converted to the expected value
    ParseError,
    /// The request was cancelled before completion
    Cancelled,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorDetail::ServerError => "server_error",
            ErrorDetail::ConnectionError => "connection_error",
            ErrorDetail::ParseError => "parse_error",
            ErrorDetail::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Terminal error delivered to a request's handler
///
/// Exactly one of these (or a successful response) is delivered per request.
/// The `code` is the HTTP status for server errors and 0 otherwise; `detail`
/// carries the classification. Server errors retain the raw error body so
/// `parse_error` hooks can extract domain-specific failure shapes from it.
#[derive(Debug, Error)]
#[error("request failed ({detail}, code {code}): {message}")]
pub struct RequestError {
    code: u16,
    detail: ErrorDetail,
    message: String,
    body: Option<Vec<u8>>,
}

impl RequestError {
    /// Error for a response with status code >= 400, carrying the raw error body
    pub fn server(code: u16, body: Option<Vec<u8>>) -> Self {
        Self {
            code,
            detail: ErrorDetail::ServerError,
            message: format!("server responded with status {}", code),
            body,
        }
    }

    /// Error for a failure that occurred before a status code was obtained
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            detail: ErrorDetail::ConnectionError,
            message: message.into(),
            body: None,
        }
    }

    /// Error for a response body that could not be converted to the expected value
    ///
    /// This is the constructor response parsers are expected to use.
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            detail: ErrorDetail::ParseError,
            message: message.into(),
            body: None,
        }
    }

    /// Error for a request cancelled before completion
    pub fn cancelled() -> Self {
        Self {
            code: 0,
            detail: ErrorDetail::Cancelled,
            message: "request cancelled".to_string(),
            body: None,
        }
    }

    /// Re-stamp the code and detail tags
    ///
    /// Applied after the `parse_error` hook has run, so a hook can reshape
    /// the message and body but never the classification.
    pub(crate) fn tagged(mut self, code: u16, detail: ErrorDetail) -> Self {
        self.code = code;
        self.detail = detail;
        self
    }

    /// Replace the human-readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// HTTP status code for server errors, 0 otherwise
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Classification tag
    pub fn detail(&self) -> ErrorDetail {
        self.detail
    }

    /// Human-readable error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw error body returned by the server, if one was read
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Raw error body decoded as UTF-8, if present and valid
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }
}
