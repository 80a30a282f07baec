//! Request descriptors and per-request handler hooks

use crate::error::{Error, RequestError, Result};
use crate::transport::ResponseData;
use crate::types::{Priority, RequestId, RequestKind};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::PathBuf;
use url::Url;

/// Behavioral hooks supplied with each request
///
/// The parsing hooks run on the worker that executed the request; the
/// delivery callbacks (`on_response` / `on_error` / `on_finish`) run later,
/// on the delivery context. Exactly one of `on_response` / `on_error` is
/// invoked per request, followed by exactly one `on_finish`.
pub trait RequestHandler: Send + 'static {
    /// Value produced by a successfully parsed response
    type Output: Send + 'static;

    /// Convert response data into the expected output value
    ///
    /// Only called for responses with a status code below 400 (and not 304).
    /// For download requests the body is empty; only metadata is available.
    fn parse_response(&self, response: ResponseData) -> std::result::Result<Self::Output, RequestError>;

    /// Reshape an error before delivery
    ///
    /// Called for server errors (status >= 400) and connection errors, with
    /// the raw error as input. Lets callers extract domain-specific failure
    /// shapes (e.g., decode an API error body). The status code and
    /// classification tag are re-stamped after this hook returns, so they
    /// cannot be overridden. Defaults to the identity.
    fn parse_error(&self, error: RequestError) -> RequestError {
        error
    }

    /// Deliver the parsed response
    fn on_response(&mut self, response: Self::Output);

    /// Deliver the terminal error
    fn on_error(&mut self, error: RequestError);

    /// Always invoked last, exactly once, after the response or error (or
    /// directly after a 304 not-modified, which delivers nothing)
    fn on_finish(&mut self) {}
}

/// Request body bytes plus an optional content type
#[derive(Clone, Debug)]
pub struct RequestBody {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl RequestBody {
    /// Body from raw bytes
    pub fn bytes(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// JSON body serialized from any serde value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the value cannot be serialized.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            bytes: serde_json::to_vec(value)?,
            content_type: Some("application/json".to_string()),
        })
    }

    /// The body bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The content type, if one was set
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// One part of a multipart upload
#[derive(Clone, Debug)]
pub struct Part {
    /// Field name of the part
    pub name: String,
    /// Payload of the part
    pub value: PartValue,
}

/// Payload variants for a multipart [`Part`]
#[derive(Clone, Debug)]
pub enum PartValue {
    /// Plain text field
    Text(String),
    /// In-memory bytes, optionally presented as a named file
    Bytes {
        /// Raw part content
        data: Vec<u8>,
        /// File name advertised for this part
        file_name: Option<String>,
        /// MIME type advertised for this part
        content_type: Option<String>,
    },
    /// File read from disk when the upload is performed
    File {
        /// Path of the file to upload
        path: PathBuf,
        /// File name advertised for this part (defaults to the path's file name)
        file_name: Option<String>,
        /// MIME type advertised for this part
        content_type: Option<String>,
    },
}

impl Part {
    /// Plain text part
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }

    /// In-memory bytes part
    pub fn file_bytes(
        name: impl Into<String>,
        data: Vec<u8>,
        file_name: Option<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Bytes {
                data,
                file_name,
                content_type,
            },
        }
    }

    /// Part read from a file on disk at upload time
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::File {
                path: path.into(),
                file_name: None,
                content_type: None,
            },
        }
    }
}

/// A fully-constructed request descriptor
///
/// Immutable after dispatch: the executing unit reads it but never changes
/// it. Build one with [`Request::get`], [`Request::post`],
/// [`Request::download`], or [`Request::upload`]. The sequence number is
/// assigned when the request is enqueued.
#[derive(Debug)]
pub struct Request {
    kind: RequestKind,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<RequestBody>,
    download_to: Option<PathBuf>,
    parts: Vec<Part>,
    priority: Priority,
    sequence: u64,
}

impl Request {
    /// Start building a simple GET request
    pub fn get(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestKind::Simple, Method::GET, url)
    }

    /// Start building a simple POST request
    pub fn post(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestKind::Simple, Method::POST, url)
    }

    /// Start building a simple PUT request
    pub fn put(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestKind::Simple, Method::PUT, url)
    }

    /// Start building a simple DELETE request
    pub fn delete(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestKind::Simple, Method::DELETE, url)
    }

    /// Start building a download request that writes its body to `destination`
    pub fn download(url: impl Into<String>, destination: impl Into<PathBuf>) -> RequestBuilder {
        let mut builder = RequestBuilder::new(RequestKind::Download, Method::GET, url);
        builder.download_to = Some(destination.into());
        builder
    }

    /// Start building a multipart upload request
    pub fn upload(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestKind::Upload, Method::POST, url)
    }

    /// Execution shape of this request
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, if one was set
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Download destination path (present for download requests)
    pub fn download_to(&self) -> Option<&PathBuf> {
        self.download_to.as_ref()
    }

    /// Multipart parts (non-empty for upload requests)
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Ordering key: priority
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Ordering key: monotonic sequence number (0 until enqueued)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Identifier derived from the sequence number
    pub fn id(&self) -> RequestId {
        RequestId(self.sequence)
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

/// Builder for [`Request`]
#[derive(Debug)]
pub struct RequestBuilder {
    kind: RequestKind,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    download_to: Option<PathBuf>,
    parts: Vec<Part>,
    priority: Priority,
}

impl RequestBuilder {
    fn new(kind: RequestKind, method: Method, url: impl Into<String>) -> Self {
        Self {
            kind,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            download_to: None,
            parts: Vec::new(),
            priority: Priority::default(),
        }
    }

    /// Override the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request priority
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set a raw byte body with an optional content type
    pub fn body_bytes(mut self, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        self.body = Some(RequestBody::bytes(bytes, content_type));
        self
    }

    /// Set a JSON body serialized from any serde value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the value cannot be serialized.
    pub fn body_json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(RequestBody::json(value)?);
        Ok(self)
    }

    /// Add a multipart part (upload requests)
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Validate and build the request
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an unparseable URL or header.
    pub fn build(self) -> Result<Request> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", self.url, e)))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::InvalidRequest(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.append(name, value);
        }

        if self.kind == RequestKind::Download && self.download_to.is_none() {
            return Err(Error::InvalidRequest(
                "download request is missing a destination path".to_string(),
            ));
        }

        Ok(Request {
            kind: self.kind,
            method: self.method,
            url,
            headers,
            body: self.body,
            download_to: self.download_to,
            parts: self.parts,
            priority: self.priority,
            sequence: 0,
        })
    }
}
