//! Queue processor — drains the priority queue onto bounded worker tasks.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Courier;

/// Interval between queue polling attempts when the queue is empty
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl Courier {
    /// Start the queue processor task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Acquires a permit from the concurrency limiter (respects max_concurrent_requests)
    /// 2. Pops the highest-priority request from the queue
    /// 3. Spawns the execution task for that request, handing it the permit
    /// 4. Repeats until shutdown
    ///
    /// The permit is claimed before the pop so the selection happens when a
    /// worker slot is actually available; a high-priority request arriving
    /// while all slots are busy is never passed over in favor of one that
    /// was merely popped earlier.
    pub(crate) fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let queue = std::sync::Arc::clone(&self.queue_state.queue);
        let concurrent_limit = std::sync::Arc::clone(&self.queue_state.concurrent_limit);
        let accepting_new = std::sync::Arc::clone(&self.queue_state.accepting_new);
        let courier = self.clone();

        tokio::spawn(async move {
            loop {
                let permit = match concurrent_limit.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Semaphore closed - shutdown has begun
                        break;
                    }
                };

                let queued_item = {
                    let mut queue_guard = queue.lock().await;
                    queue_guard.pop()
                };

                if let Some(item) = queued_item {
                    courier.spawn_runner(item, Some(permit));
                } else {
                    // Queue is empty; give the permit back and wait a bit
                    drop(permit);

                    if !accepting_new.load(Ordering::SeqCst) {
                        // Nothing queued and nothing new can arrive
                        break;
                    }

                    tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                }
            }

            tracing::debug!("queue processor stopped");
        })
    }
}
