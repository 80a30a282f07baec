//! Delivery context for terminal callbacks
//!
//! Worker tasks never invoke handler callbacks directly. Each terminal
//! outcome is packaged as a closure and posted to a [`DeliveryContext`],
//! a single-consumer task that runs posted work in submission order. This
//! keeps result consumption off the I/O workers and gives every request the
//! (response-or-error, then finish) ordering without locks. No ordering is
//! guaranteed between different requests' deliveries.

use tokio::sync::mpsc;

type DeliveryJob = Box<dyn FnOnce() + Send>;

/// Handle to a single-consumer executor for terminal callbacks
///
/// Cheap to clone; all clones feed the same consumer task. The consumer
/// stops once every handle has been dropped and the queued work has drained.
#[derive(Clone)]
pub struct DeliveryContext {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl DeliveryContext {
    /// Spawn the consumer task and return a handle to it
    ///
    /// Must be called from within a tokio runtime. Posted closures run
    /// sequentially on the consumer task, so they should hand off any
    /// long-running work rather than block the context.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DeliveryJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            tracing::debug!("delivery context stopped");
        });

        Self { tx }
    }

    /// Post a unit of work to run later on the consumer task
    ///
    /// Work is run in submission order. Returns false if the consumer is
    /// gone, in which case the job is dropped; this can only happen during
    /// teardown.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }
}
