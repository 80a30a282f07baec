//! Request execution unit
//!
//! One [`RequestRunner`] owns one request descriptor. It performs the
//! transport operation for the request's kind, classifies the raw result
//! into an [`Outcome`], posts exactly one terminal delivery (response or
//! error, then finish) to the delivery context, and closes any open
//! response body on every exit path. No failure escapes a runner: every
//! reachable error is converted to a typed [`RequestError`] and delivered.


use crate::delivery::DeliveryContext;
use crate::error::{ErrorDetail, RequestError, TransportError};
use crate::request::{Request, RequestHandler};
use crate::transport::{RawResponse, ResponseData, Transport};
use crate::types::RequestKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Classified outcome of one executed request
///
/// Derived deterministically from the transport result by [`classify`];
/// each variant maps to exactly one delivery behavior.
pub(crate) enum Outcome<T> {
    /// Status 304: the caller's cached result is still valid, nothing to deliver
    NotModified,
    /// Response parsed into the expected value
    Success(T),
    /// Status >= 400
    ServerError(RequestError),
    /// Failure before a status code was obtained
    ConnectionError(RequestError),
    /// Status < 400 but the body could not be converted
    ParseFailure(RequestError),
}

impl<T> Outcome<T> {
    fn label(&self) -> &'static str {
        match self {
            Outcome::NotModified => "not_modified",
            Outcome::Success(_) => "success",
            Outcome::ServerError(_) => "server_error",
            Outcome::ConnectionError(_) => "connection_error",
            Outcome::ParseFailure(_) => "parse_failure",
        }
    }
}

/// Executes one request to completion and delivers its outcome
pub(crate) struct RequestRunner<H: RequestHandler> {
    request: Request,
    handler: H,
    transport: Arc<dyn Transport>,
    delivery: DeliveryContext,
}

impl<H: RequestHandler> RequestRunner<H> {
    pub(crate) fn new(
        request: Request,
        handler: H,
        transport: Arc<dyn Transport>,
        delivery: DeliveryContext,
    ) -> Self {
        Self {
            request,
            handler,
            transport,
            delivery,
        }
    }

    /// Execute the request
    ///
    /// Blocks (at an await point) for the duration of the transport call,
    /// racing it against the cancellation token. A cancelled runner delivers
    /// a cancellation-typed error exactly once, like any other outcome.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let Self {
            request,
            handler,
            transport,
            delivery,
        } = self;
        let id = request.id();

        tracing::debug!(
            request_id = id.0,
            kind = ?request.kind(),
            url = %request.url(),
            "request execution started"
        );

        let transport_result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = perform(transport.as_ref(), &request) => Some(result),
        };

        let Some(mut result) = transport_result else {
            tracing::debug!(request_id = id.0, "request cancelled");
            deliver_error(&delivery, handler, RequestError::cancelled());
            return;
        };

        let outcome = classify(&handler, &request, &mut result).await;

        // The body, when one was opened, is closed here exactly once,
        // whatever branch classification took. A close failure never
        // overrides the outcome already decided.
        if let Ok(raw) = &mut result {
            if let Some(mut body) = raw.body.take() {
                if let Err(e) = body.close() {
                    tracing::debug!(request_id = id.0, error = %e, "unable to close response body");
                }
            }
        }

        tracing::debug!(
            request_id = id.0,
            outcome = outcome.label(),
            "request execution done"
        );

        deliver(&delivery, handler, outcome);
    }
}

/// Dispatch to the transport operation matching the request's kind
async fn perform(
    transport: &dyn Transport,
    request: &Request,
) -> Result<RawResponse, TransportError> {
    match request.kind() {
        RequestKind::Simple => transport.perform_simple(request).await,
        RequestKind::Download => transport.perform_download(request).await,
        RequestKind::Upload => transport.perform_upload(request).await,
    }
}

/// Derive the classified outcome from the raw transport result
///
/// The single place where the status-code contract lives: 304 is a
/// not-modified no-op, >= 400 is a server error and never reaches the
/// response parser, anything else is handed to the parser. Reads the
/// response body as needed but never closes it; the caller owns the close.
async fn classify<H: RequestHandler>(
    handler: &H,
    request: &Request,
    result: &mut Result<RawResponse, TransportError>,
) -> Outcome<H::Output> {
    let raw = match result {
        Err(error) => {
            let error = handler.parse_error(RequestError::connection(error.to_string()));
            return Outcome::ConnectionError(error.tagged(0, ErrorDetail::ConnectionError));
        }
        Ok(raw) => raw,
    };

    if raw.status == 304 {
        return Outcome::NotModified;
    }

    if raw.status >= 400 {
        let body = read_error_body(raw).await;
        let error = handler.parse_error(RequestError::server(raw.status, body));
        return Outcome::ServerError(error.tagged(raw.status, ErrorDetail::ServerError));
    }

    let body = if request.kind().expects_parsed_body() {
        match read_body(raw).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::ParseFailure(RequestError::parse(format!(
                    "failed to read response body: {}",
                    e
                )));
            }
        }
    } else {
        Vec::new()
    };

    let data = ResponseData {
        status: raw.status,
        headers: raw.headers.clone(),
        body,
    };

    match handler.parse_response(data) {
        Ok(value) => Outcome::Success(value),
        // The parser's own error is delivered unmodified
        Err(error) => Outcome::ParseFailure(error),
    }
}

/// Best-effort read of a server error body; failures are logged and ignored
async fn read_error_body(raw: &mut RawResponse) -> Option<Vec<u8>> {
    let body = raw.body.as_mut()?;
    match body.read_to_end().await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "unable to read error response body");
            None
        }
    }
}

async fn read_body(raw: &mut RawResponse) -> std::io::Result<Vec<u8>> {
    match raw.body.as_mut() {
        Some(body) => body.read_to_end().await,
        None => Ok(Vec::new()),
    }
}

/// Post the terminal delivery for an outcome
///
/// Every path enqueues one closure invoking the handler callbacks in order,
/// so (response-or-error, then finish) holds per request by construction.
fn deliver<H: RequestHandler>(delivery: &DeliveryContext, handler: H, outcome: Outcome<H::Output>) {
    match outcome {
        Outcome::NotModified => {
            let posted = delivery.post(move || {
                let mut handler = handler;
                handler.on_finish();
            });
            if !posted {
                tracing::warn!("delivery context is gone, dropping not-modified completion");
            }
        }
        Outcome::Success(value) => {
            let posted = delivery.post(move || {
                let mut handler = handler;
                handler.on_response(value);
                handler.on_finish();
            });
            if !posted {
                tracing::warn!("delivery context is gone, dropping response");
            }
        }
        Outcome::ServerError(error)
        | Outcome::ConnectionError(error)
        | Outcome::ParseFailure(error) => deliver_error(delivery, handler, error),
    }
}

fn deliver_error<H: RequestHandler>(
    delivery: &DeliveryContext,
    handler: H,
    error: RequestError,
) {
    let posted = delivery.post(move || {
        let mut handler = handler;
        handler.on_error(error);
        handler.on_finish();
    });
    if !posted {
        tracing::warn!("delivery context is gone, dropping request error");
    }
}
