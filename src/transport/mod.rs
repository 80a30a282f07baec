//! Transport abstraction and the reqwest-backed implementation
//!
//! The execution unit never talks HTTP itself; it calls one of the three
//! [`Transport`] operations and classifies whatever comes back. The bundled
//! [`HttpTransport`] implements the trait on top of reqwest; tests and
//! alternative stacks can substitute their own implementation.

mod http;


pub use http::HttpTransport;

use crate::error::{RequestError, TransportError};
use crate::request::Request;
use async_trait::async_trait;
use reqwest::header::HeaderMap;

/// Streamed response body handed back by a transport
///
/// The executing unit owns the body for the duration of processing and
/// closes it exactly once on every exit path. Closing an already-drained
/// body is a no-op.
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the remaining bytes of the body
    async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>>;

    /// Release the underlying connection resources
    fn close(&mut self) -> std::io::Result<()>;
}

/// Raw result of a transport operation
///
/// Produced once an HTTP status line has been received. Download operations
/// write their payload directly to the destination file and return no body.
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Live response body, if the operation left one open
    pub body: Option<Box<dyn ResponseBody>>,
}

impl RawResponse {
    /// Create a raw response
    pub fn new(status: u16, headers: HeaderMap, body: Option<Box<dyn ResponseBody>>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Fully-read response data handed to a response parser
///
/// For download requests the body is always empty; the payload has already
/// been written to the destination file by the transport.
#[derive(Clone, Debug)]
pub struct ResponseData {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl ResponseData {
    /// Decode the body as JSON into any serde value
    ///
    /// # Errors
    ///
    /// Returns a parse-classified [`RequestError`] if decoding fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| RequestError::parse(format!("failed to decode JSON body: {}", e)))
    }

    /// Decode the body as UTF-8 text
    ///
    /// # Errors
    ///
    /// Returns a parse-classified [`RequestError`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, RequestError> {
        String::from_utf8(self.body.clone())
            .map_err(|e| RequestError::parse(format!("response body is not valid UTF-8: {}", e)))
    }
}

/// Transport operations consumed by the execution unit
///
/// Each operation performs one network exchange and may fail with a
/// [`TransportError`] before a status code is obtained. Retry policy for
/// transient failures lives inside the transport; the execution unit never
/// retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a simple request, returning the response with its body open
    async fn perform_simple(&self, request: &Request) -> Result<RawResponse, TransportError>;

    /// Perform a download, streaming the body to the request's destination
    /// path and returning a body-less response
    async fn perform_download(&self, request: &Request) -> Result<RawResponse, TransportError>;

    /// Perform a multipart upload, returning the response with its body open
    async fn perform_upload(&self, request: &Request) -> Result<RawResponse, TransportError>;
}
