use super::*;
use crate::config::DispatchConfig;
use crate::test_support::{HandlerEvent, MockTransport, RecordingHandler};
use crate::types::Priority;
use std::time::Duration;

fn noop_job() -> RunnerJob {
    Box::new(|_token| {
        let future: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async {});
        future
    })
}

fn queued(priority: Priority, sequence: u64) -> QueuedRequest {
    QueuedRequest {
        id: RequestId(sequence),
        priority,
        sequence,
        cancel: CancellationToken::new(),
        job: noop_job(),
    }
}

fn test_config(max_concurrent: usize) -> Config {
    Config {
        dispatch: DispatchConfig {
            max_concurrent_requests: max_concurrent,
        },
        ..Default::default()
    }
}

fn simple_request(priority: Priority) -> Request {
    Request::get("http://unit.test/item")
        .priority(priority)
        .build()
        .expect("request builds")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

#[test]
fn test_heap_orders_by_priority_then_sequence() {
    let mut heap = BinaryHeap::new();
    heap.push(queued(Priority::Low, 1));
    heap.push(queued(Priority::High, 2));
    heap.push(queued(Priority::Medium, 3));

    let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|item| item.sequence)).collect();
    assert_eq!(order, vec![2, 3, 1], "high before medium before low");
}

#[test]
fn test_heap_breaks_priority_ties_by_sequence() {
    let mut heap = BinaryHeap::new();
    heap.push(queued(Priority::Medium, 5));
    heap.push(queued(Priority::Medium, 2));
    heap.push(queued(Priority::Medium, 9));

    let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|item| item.sequence)).collect();
    assert_eq!(order, vec![2, 5, 9], "earlier submissions run first");
}

#[test]
fn test_immediate_priority_outranks_everything() {
    let mut heap = BinaryHeap::new();
    heap.push(queued(Priority::High, 1));
    heap.push(queued(Priority::Immediate, 2));
    heap.push(queued(Priority::Low, 3));

    assert_eq!(heap.pop().map(|item| item.sequence), Some(2));
}

#[tokio::test]
async fn test_successful_request_roundtrip() {
    let transport = Arc::new(MockTransport::new());
    let courier = Courier::with_transport(test_config(2), transport).unwrap();

    let (handler, events, done) = RecordingHandler::new();
    let id = courier
        .enqueue(simple_request(Priority::Medium), handler)
        .await
        .unwrap();
    assert_eq!(id, RequestId(1));

    done.await.unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec![HandlerEvent::Response("ok".to_string()), HandlerEvent::Finish]
    );

    // The bookkeeping entry is removed once the runner completes
    for _ in 0..400 {
        if courier.active_requests().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("active request count never drained");
}

#[tokio::test]
async fn test_dispatch_order_respects_priority() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(1), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    // Plug the single worker slot so the next three sit in the queue together
    let (plug_handler, _plug_events, plug_done) = RecordingHandler::new();
    courier
        .enqueue(simple_request(Priority::Immediate), plug_handler)
        .await
        .unwrap();
    wait_until(|| transport.started_order().len() == 1).await;

    let mut dones = Vec::new();
    for priority in [Priority::Low, Priority::High, Priority::Medium] {
        let (handler, _events, done) = RecordingHandler::new();
        courier
            .enqueue(simple_request(priority), handler)
            .await
            .unwrap();
        dones.push(done);
    }
    assert_eq!(courier.queued_requests().await, 3);

    gate.add_permits(8);
    plug_done.await.unwrap();
    for done in dones {
        done.await.unwrap();
    }

    // Plug was sequence 1; low/high/medium got 2/3/4 and start high-first
    assert_eq!(transport.started_order(), vec![1, 3, 4, 2]);
}

#[tokio::test]
async fn test_dispatch_order_is_fifo_within_a_priority() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(1), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    let (plug_handler, _plug_events, plug_done) = RecordingHandler::new();
    courier
        .enqueue(simple_request(Priority::Immediate), plug_handler)
        .await
        .unwrap();
    wait_until(|| transport.started_order().len() == 1).await;

    let mut dones = Vec::new();
    for _ in 0..3 {
        let (handler, _events, done) = RecordingHandler::new();
        courier
            .enqueue(simple_request(Priority::Medium), handler)
            .await
            .unwrap();
        dones.push(done);
    }

    gate.add_permits(8);
    plug_done.await.unwrap();
    for done in dones {
        done.await.unwrap();
    }

    assert_eq!(transport.started_order(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(2), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    let mut dones = Vec::new();
    for _ in 0..4 {
        let (handler, _events, done) = RecordingHandler::new();
        courier
            .enqueue(simple_request(Priority::Medium), handler)
            .await
            .unwrap();
        dones.push(done);
    }

    wait_until(|| transport.started_order().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        transport.started_order().len(),
        2,
        "no more than two requests may be in flight"
    );

    gate.add_permits(16);
    for done in dones {
        done.await.unwrap();
    }
    assert_eq!(transport.started_order().len(), 4);
}

#[tokio::test]
async fn test_cancel_queued_request_delivers_cancellation() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(1), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    let (plug_handler, _plug_events, plug_done) = RecordingHandler::new();
    courier
        .enqueue(simple_request(Priority::Immediate), plug_handler)
        .await
        .unwrap();
    wait_until(|| transport.started_order().len() == 1).await;

    let (handler, events, done) = RecordingHandler::new();
    let victim = courier
        .enqueue(simple_request(Priority::Low), handler)
        .await
        .unwrap();

    assert!(courier.cancel(victim).await);
    done.await.unwrap();

    let events = events.lock().unwrap();
    match &events[0] {
        HandlerEvent::Error { code, detail, .. } => {
            assert_eq!(*code, 0);
            assert_eq!(*detail, crate::error::ErrorDetail::Cancelled);
        }
        other => panic!("expected cancellation error, got {:?}", other),
    }
    assert_eq!(*events.last().unwrap(), HandlerEvent::Finish);
    assert_eq!(
        transport.started_order().len(),
        1,
        "a cancelled queued request never reaches the transport"
    );

    gate.add_permits(4);
    plug_done.await.unwrap();
}

#[tokio::test]
async fn test_cancel_active_request_delivers_cancellation() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(1), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    let (handler, events, done) = RecordingHandler::new();
    let id = courier
        .enqueue(simple_request(Priority::Medium), handler)
        .await
        .unwrap();
    wait_until(|| transport.started_order().len() == 1).await;

    assert!(courier.cancel(id).await);
    done.await.unwrap();

    let events = events.lock().unwrap();
    match &events[0] {
        HandlerEvent::Error { code, detail, .. } => {
            assert_eq!(*code, 0);
            assert_eq!(*detail, crate::error::ErrorDetail::Cancelled);
        }
        other => panic!("expected cancellation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_unknown_id_returns_false() {
    let transport = Arc::new(MockTransport::new());
    let courier = Courier::with_transport(test_config(1), transport).unwrap();

    assert!(!courier.cancel(RequestId(999)).await);
}

#[tokio::test]
async fn test_enqueue_after_shutdown_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    let courier = Courier::with_transport(test_config(1), transport).unwrap();

    courier.shutdown().await;

    let (handler, _events, _done) = RecordingHandler::new();
    let result = courier.enqueue(simple_request(Priority::Medium), handler).await;
    assert!(matches!(result, Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn test_shutdown_cancels_queued_and_active_requests() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockTransport::gated(Arc::clone(&gate)));
    let courier = Courier::with_transport(test_config(1), Arc::clone(&transport) as Arc<dyn Transport>).unwrap();

    let (active_handler, active_events, active_done) = RecordingHandler::new();
    courier
        .enqueue(simple_request(Priority::Medium), active_handler)
        .await
        .unwrap();
    wait_until(|| transport.started_order().len() == 1).await;

    let (queued_handler, queued_events, queued_done) = RecordingHandler::new();
    courier
        .enqueue(simple_request(Priority::Medium), queued_handler)
        .await
        .unwrap();

    courier.shutdown().await;
    active_done.await.unwrap();
    queued_done.await.unwrap();

    for events in [active_events, queued_events] {
        let events = events.lock().unwrap();
        match &events[0] {
            HandlerEvent::Error { detail, .. } => {
                assert_eq!(*detail, crate::error::ErrorDetail::Cancelled);
            }
            other => panic!("expected cancellation error, got {:?}", other),
        }
        assert_eq!(*events.last().unwrap(), HandlerEvent::Finish);
    }
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    let result = Courier::with_transport(test_config(0), transport);
    assert!(matches!(result, Err(Error::Config { .. })));
}
