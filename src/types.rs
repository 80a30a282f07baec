//! Core types for http-courier

use serde::{Deserialize, Serialize};

/// Unique identifier for a dispatched request
///
/// Wraps the monotonic sequence number assigned when the request is enqueued.
/// Among requests of equal priority, a lower sequence number means earlier
/// submission and therefore earlier execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new RequestId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RequestId> for u64 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl PartialEq<u64> for RequestId {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<RequestId> for u64 {
    fn eq(&self, other: &RequestId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Request priority
///
/// Priority only affects the order in which queued requests are started.
/// It never alters how a response or failure is classified.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work, started after everything else
    Low,
    /// Normal priority (default)
    #[default]
    Medium,
    /// Started before medium and low priority requests
    High,
    /// Started as soon as a worker slot is free
    Immediate,
}

/// Request execution shape
///
/// All three shapes share one execution algorithm; the kind selects which
/// transport operation is invoked and whether a response body is expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Plain request whose response body is handed to the response parser
    Simple,
    /// Response body is streamed directly to a destination file by the transport
    Download,
    /// Multipart upload; the response body is handed to the response parser
    Upload,
}

impl RequestKind {
    /// Whether the response body is read and handed to the response parser
    ///
    /// Downloads write their body straight to the destination file, so the
    /// parser only ever sees response metadata for them.
    pub fn expects_parsed_body(&self) -> bool {
        !matches!(self, RequestKind::Download)
    }
}
