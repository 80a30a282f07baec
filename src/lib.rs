//! # http-courier
//!
//! Priority-ordered HTTP request execution library.
//!
//! ## Design Philosophy
//!
//! http-courier is designed to be:
//! - **Exactly-once** - every request delivers one response or one typed
//!   error, followed by one finish callback, never more, never less
//! - **Priority-ordered** - queued requests start highest-priority first,
//!   submission order breaking ties
//! - **Delivery-decoupled** - terminal callbacks run on a single delivery
//!   context, never on the I/O workers
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use http_courier::{Config, Courier, Priority, Request, RequestError, RequestHandler, ResponseData};
//!
//! struct TextHandler;
//!
//! impl RequestHandler for TextHandler {
//!     type Output = String;
//!
//!     fn parse_response(&self, response: ResponseData) -> Result<String, RequestError> {
//!         response.text()
//!     }
//!
//!     fn on_response(&mut self, response: String) {
//!         println!("response: {response}");
//!     }
//!
//!     fn on_error(&mut self, error: RequestError) {
//!         eprintln!("error: {error}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let courier = Courier::new(Config::default())?;
//!
//!     let request = Request::get("https://example.com/data")
//!         .priority(Priority::High)
//!         .build()?;
//!     courier.enqueue(request, TextHandler).await?;
//!
//!     courier.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Request dispatch client
pub mod client;
/// Configuration types
pub mod config;
/// Delivery context for terminal callbacks
pub mod delivery;
/// Error types
pub mod error;
/// Request descriptors and handler hooks
pub mod request;
/// Retry logic with exponential backoff
pub mod retry;
/// Transport abstraction and reqwest implementation
pub mod transport;
/// Core types
pub mod types;

pub(crate) mod runner;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use client::Courier;
pub use config::{Config, DispatchConfig, HttpConfig, RetryConfig};
pub use delivery::DeliveryContext;
pub use error::{Error, ErrorDetail, RequestError, Result, TransportError};
pub use request::{Part, PartValue, Request, RequestBody, RequestBuilder, RequestHandler};
pub use transport::{HttpTransport, RawResponse, ResponseBody, ResponseData, Transport};
pub use types::{Priority, RequestId, RequestKind};
