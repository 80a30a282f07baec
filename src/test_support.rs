//! Shared test doubles for runner and client tests.

use crate::error::{ErrorDetail, RequestError, TransportError};
use crate::request::{Request, RequestHandler};
use crate::transport::{RawResponse, ResponseBody, ResponseData, Transport};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory response body that counts how often it is closed.
pub(crate) struct MockBody {
    data: Option<Vec<u8>>,
    fail_read: bool,
    closes: Arc<AtomicUsize>,
}

impl MockBody {
    pub(crate) fn new(data: Vec<u8>, closes: Arc<AtomicUsize>) -> Self {
        Self {
            data: Some(data),
            fail_read: false,
            closes,
        }
    }

    pub(crate) fn failing(closes: Arc<AtomicUsize>) -> Self {
        Self {
            data: None,
            fail_read: true,
            closes,
        }
    }
}

#[async_trait]
impl ResponseBody for MockBody {
    async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        if self.fail_read {
            return Err(std::io::Error::other("scripted body read failure"));
        }
        Ok(self.data.take().unwrap_or_default())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted result for one transport call.
#[derive(Clone)]
pub(crate) enum Script {
    /// Respond with a status and (for Some) an open body stream
    Respond { status: u16, body: Option<Vec<u8>> },
    /// Respond with a status whose body fails on read
    RespondBodyReadError { status: u16 },
    /// Fail before any status is obtained
    Fail(String),
}

/// Transport double: plays back scripted replies in call order.
///
/// Falls back to `200 OK` with an `ok` body when the script runs dry.
/// Records the sequence number of every request at call start, counts the
/// bodies it opens, and shares one close counter across all of them. An
/// optional gate makes each call wait for a permit, so tests can hold
/// requests in flight.
pub(crate) struct MockTransport {
    replies: Mutex<VecDeque<Script>>,
    pub(crate) opened: Arc<AtomicUsize>,
    pub(crate) closed: Arc<AtomicUsize>,
    pub(crate) started: Mutex<Vec<u64>>,
    gate: Option<Arc<tokio::sync::Semaphore>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            started: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub(crate) fn scripted(scripts: impl IntoIterator<Item = Script>) -> Self {
        let transport = Self::new();
        transport
            .replies
            .lock()
            .expect("replies lock poisoned")
            .extend(scripts);
        transport
    }

    /// Gate every transport call on one permit from the given semaphore.
    pub(crate) fn gated(gate: Arc<tokio::sync::Semaphore>) -> Self {
        let mut transport = Self::new();
        transport.gate = Some(gate);
        transport
    }

    pub(crate) fn started_order(&self) -> Vec<u64> {
        self.started.lock().expect("started lock poisoned").clone()
    }

    async fn respond(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.started
            .lock()
            .expect("started lock poisoned")
            .push(request.sequence());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| TransportError::Other("gate closed".to_string()))?;
            permit.forget();
        }

        let script = self
            .replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front()
            .unwrap_or(Script::Respond {
                status: 200,
                body: Some(b"ok".to_vec()),
            });

        match script {
            Script::Respond { status, body } => {
                let body = body.map(|data| {
                    self.opened.fetch_add(1, Ordering::SeqCst);
                    Box::new(MockBody::new(data, Arc::clone(&self.closed)))
                        as Box<dyn ResponseBody>
                });
                Ok(RawResponse::new(status, HeaderMap::new(), body))
            }
            Script::RespondBodyReadError { status } => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(RawResponse::new(
                    status,
                    HeaderMap::new(),
                    Some(Box::new(MockBody::failing(Arc::clone(&self.closed)))),
                ))
            }
            Script::Fail(message) => Err(TransportError::Other(message)),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform_simple(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.respond(request).await
    }

    async fn perform_download(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.respond(request).await
    }

    async fn perform_upload(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.respond(request).await
    }
}

/// Everything a handler observed, in callback order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum HandlerEvent {
    Response(String),
    Error {
        code: u16,
        detail: ErrorDetail,
        message: String,
    },
    Finish,
}

/// Handler double: records callbacks and resolves a oneshot on finish.
pub(crate) struct RecordingHandler {
    events: Arc<Mutex<Vec<HandlerEvent>>>,
    parse_fail: bool,
    reshape_errors: bool,
    done: Option<tokio::sync::oneshot::Sender<()>>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (
        Self,
        Arc<Mutex<Vec<HandlerEvent>>>,
        tokio::sync::oneshot::Receiver<()>,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        (
            Self {
                events: Arc::clone(&events),
                parse_fail: false,
                reshape_errors: false,
                done: Some(done_tx),
            },
            events,
            done_rx,
        )
    }

    /// Make `parse_response` fail with a scripted parse error.
    pub(crate) fn failing_parse(mut self) -> Self {
        self.parse_fail = true;
        self
    }

    /// Make `parse_error` rewrite the message, proving the hook ran.
    pub(crate) fn reshaping_errors(mut self) -> Self {
        self.reshape_errors = true;
        self
    }
}

impl RequestHandler for RecordingHandler {
    type Output = String;

    fn parse_response(&self, response: ResponseData) -> Result<String, RequestError> {
        if self.parse_fail {
            return Err(RequestError::parse("scripted parse failure"));
        }
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    fn parse_error(&self, error: RequestError) -> RequestError {
        if self.reshape_errors {
            let message = format!("reshaped: {}", error.message());
            error.with_message(message)
        } else {
            error
        }
    }

    fn on_response(&mut self, response: String) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push(HandlerEvent::Response(response));
    }

    fn on_error(&mut self, error: RequestError) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push(HandlerEvent::Error {
                code: error.code(),
                detail: error.detail(),
                message: error.message().to_string(),
            });
    }

    fn on_finish(&mut self) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push(HandlerEvent::Finish);
        if let Some(tx) = self.done.take() {
            tx.send(()).ok();
        }
    }
}
