//! Request dispatch client
//!
//! The `Courier` struct and its methods are organized by concern:
//! - this module - construction, enqueueing, cancellation, shutdown
//! - [`queue_processor`] - draining the priority queue onto worker tasks
//!
//! `Courier` owns the priority queue, the concurrency limiter, and the
//! delivery context. Every collaborator is passed in by construction; there
//! is no process-global state.

mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::delivery::DeliveryContext;
use crate::error::{Error, Result};
use crate::request::{Request, RequestHandler};
use crate::runner::RequestRunner;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Priority, RequestId};
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for in-flight requests to finish delivering
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Type-erased execution job: runs one request to completion
type RunnerJob = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send,
>;

/// Queue and request state management
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Priority queue of requests waiting for a worker slot
    pub(crate) queue: Arc<Mutex<BinaryHeap<QueuedRequest>>>,
    /// Semaphore bounding concurrent request execution
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cancellation tokens for every queued or executing request
    pub(crate) active: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
    /// Flag cleared when shutdown begins; no new requests are accepted after
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Internal struct representing a request in the priority queue
pub(crate) struct QueuedRequest {
    pub(crate) id: RequestId,
    pub(crate) priority: Priority,
    pub(crate) sequence: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) job: RunnerJob,
}

// Implement Ord for BinaryHeap (max-heap by default)
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // First compare by priority (higher priority wins)
        match self.priority.cmp(&other.priority) {
            std::cmp::Ordering::Equal => {
                // If priorities are equal, earlier submissions come first
                // Note: Reversed because a lower sequence number must rank higher
                other.sequence.cmp(&self.sequence)
            }
            ordering => ordering,
        }
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for QueuedRequest {}

/// Priority-ordered HTTP request dispatch client (cloneable - all state is Arc-wrapped)
///
/// Requests are enqueued with a handler, started in priority order (sequence
/// number breaking ties) under a concurrency bound, and their terminal
/// callbacks are delivered on a single delivery context. Must be created
/// inside a tokio runtime.
///
/// # Example
///
/// ```no_run
/// use http_courier::{Config, Courier, Request, RequestHandler, RequestError, ResponseData};
///
/// struct PrintHandler;
///
/// impl RequestHandler for PrintHandler {
///     type Output = String;
///
///     fn parse_response(&self, response: ResponseData) -> Result<String, RequestError> {
///         response.text()
///     }
///
///     fn on_response(&mut self, response: String) {
///         println!("got: {response}");
///     }
///
///     fn on_error(&mut self, error: RequestError) {
///         eprintln!("failed: {error}");
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let courier = Courier::new(Config::default())?;
///     let request = Request::get("https://example.com/data").build()?;
///     courier.enqueue(request, PrintHandler).await?;
///     courier.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Courier {
    /// Transport performing the actual network exchanges
    pub(crate) transport: Arc<dyn Transport>,
    /// Delivery context for terminal callbacks
    pub(crate) delivery: DeliveryContext,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Queue and request state management
    pub(crate) queue_state: QueueState,
    /// Monotonic sequence counter; assigned values double as request IDs
    pub(crate) next_sequence: Arc<AtomicU64>,
}

impl Courier {
    /// Create a new Courier with the bundled reqwest transport
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a new Courier with a custom transport implementation
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let queue_state = QueueState {
            queue: Arc::new(Mutex::new(BinaryHeap::new())),
            concurrent_limit: Arc::new(Semaphore::new(config.dispatch.max_concurrent_requests)),
            active: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        let courier = Self {
            transport,
            delivery: DeliveryContext::spawn(),
            config: Arc::new(config),
            queue_state,
            next_sequence: Arc::new(AtomicU64::new(0)),
        };

        courier.start_queue_processor();

        Ok(courier)
    }

    /// Enqueue a request for execution
    ///
    /// Assigns the request its sequence number and queues it; the returned
    /// [`RequestId`] can be used to cancel it later. The handler receives
    /// exactly one response-or-error callback followed by one finish
    /// callback, on the delivery context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn enqueue<H>(&self, mut request: Request, handler: H) -> Result<RequestId>
    where
        H: RequestHandler + Sync,
    {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        request.set_sequence(sequence);
        let id = request.id();
        let priority = request.priority();

        let runner = RequestRunner::new(
            request,
            handler,
            Arc::clone(&self.transport),
            self.delivery.clone(),
        );
        let job: RunnerJob = Box::new(move |token| Box::pin(runner.run(token)));

        let cancel = CancellationToken::new();
        {
            let mut active = self.queue_state.active.lock().await;
            active.insert(id, cancel.clone());
        }
        {
            let mut queue = self.queue_state.queue.lock().await;
            queue.push(QueuedRequest {
                id,
                priority,
                sequence,
                cancel,
                job,
            });
        }

        tracing::debug!(request_id = id.0, priority = ?priority, "request enqueued");
        Ok(id)
    }

    /// Cancel a request by ID
    ///
    /// Works on queued and executing requests alike; either way the
    /// request's handler receives a cancellation-typed error followed by
    /// finish, exactly once. Returns false if the ID is unknown (never
    /// enqueued, or already completed).
    pub async fn cancel(&self, id: RequestId) -> bool {
        let token = {
            let active = self.queue_state.active.lock().await;
            active.get(&id).cloned()
        };

        let Some(token) = token else {
            return false;
        };
        token.cancel();

        // If the request is still queued, pull it out and run it right away
        // so the cancellation error is delivered without waiting for a
        // worker slot.
        if let Some(item) = self.remove_from_queue(id).await {
            self.spawn_runner(item, None);
        }

        tracing::debug!(request_id = id.0, "request cancelled");
        true
    }

    /// Cancel every queued and executing request
    pub async fn cancel_all(&self) {
        let tokens: Vec<CancellationToken> = {
            let active = self.queue_state.active.lock().await;
            active.values().cloned().collect()
        };
        for token in &tokens {
            token.cancel();
        }

        let drained: Vec<QueuedRequest> = {
            let mut queue = self.queue_state.queue.lock().await;
            queue.drain().collect()
        };

        tracing::debug!(
            signalled = tokens.len(),
            drained = drained.len(),
            "cancelling all requests"
        );

        for item in drained {
            self.spawn_runner(item, None);
        }
    }

    /// Gracefully shut down the client
    ///
    /// Stops accepting new requests, cancels everything queued or in
    /// flight, waits (bounded) for the cancellation deliveries to complete,
    /// and flushes the delivery context.
    pub async fn shutdown(&self) {
        tracing::info!("initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        self.cancel_all().await;
        self.queue_state.concurrent_limit.close();

        let wait_result =
            tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_requests()).await;
        if wait_result.is_err() {
            tracing::warn!("timeout waiting for requests to complete, proceeding with shutdown");
        }

        // Flush every delivery posted so far before declaring shutdown done
        let (flushed_tx, flushed_rx) = tokio::sync::oneshot::channel();
        if self.delivery.post(move || {
            flushed_tx.send(()).ok();
        }) {
            flushed_rx.await.ok();
        }

        tracing::info!("graceful shutdown complete");
    }

    /// Get the current configuration
    ///
    /// The configuration is wrapped in an Arc, so this is a cheap clone.
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Number of requests waiting in the queue
    pub async fn queued_requests(&self) -> usize {
        self.queue_state.queue.lock().await.len()
    }

    /// Number of requests that are queued or executing
    pub async fn active_requests(&self) -> usize {
        self.queue_state.active.lock().await.len()
    }

    /// Spawn the execution task for a queued request
    ///
    /// The worker permit, when present, is held until the runner completes.
    pub(crate) fn spawn_runner(
        &self,
        item: QueuedRequest,
        permit: Option<tokio::sync::OwnedSemaphorePermit>,
    ) {
        let active = Arc::clone(&self.queue_state.active);
        tokio::spawn(async move {
            let _permit = permit;
            let QueuedRequest {
                id, cancel, job, ..
            } = item;
            (job)(cancel).await;
            active.lock().await.remove(&id);
        });
    }

    async fn remove_from_queue(&self, id: RequestId) -> Option<QueuedRequest> {
        let mut queue = self.queue_state.queue.lock().await;

        let mut items: Vec<QueuedRequest> = queue.drain().collect();
        let position = items.iter().position(|item| item.id == id);
        let removed = position.map(|index| items.remove(index));

        // Rebuild queue without the removed item
        *queue = items.into_iter().collect();

        removed
    }

    async fn wait_for_active_requests(&self) {
        loop {
            let active_count = {
                let active = self.queue_state.active.lock().await;
                active.len()
            };

            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "waiting for requests to complete");
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
