//! Inbound traffic inspection middleware.
//!
//! # Responsibilities
//! - Open a fresh context per request, adopting `x-correlation-id` from the
//!   caller or minting one
//! - Tee request and response bodies without altering delivery
//! - Emit exactly one record per handled request at response completion
//!
//! # Design Decisions
//! - Plain tower `Layer`/`Service` pair so it composes with any axum router
//! - Ignored routes short-circuit before any buffering is set up
//! - The record is emitted from the response body's end hook, carrying an
//!   explicit context snapshot since the handler scope has ended by then

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use futures_util::future::BoxFuture;
use http::header::HeaderValue;
use http::{Request, Response};
use serde_json::{json, Map, Value};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::context::{Context, ContextSnapshot};
use crate::error::InstallError;
use crate::inspect::body::{CaptureBuffer, StreamOutcome, TeeBody};
use crate::inspect::routes::RouteMatcher;
use crate::inspect::{headers_to_value, CORRELATION_HEADER};
use crate::logging::{level_for_status, LogEvent, LogPipeline, LoggedError};

/// Layer installing [`InboundInspector`] around a service.
#[derive(Clone)]
pub struct InboundInspectorLayer {
    shared: Arc<Shared>,
}

struct Shared {
    pipeline: Arc<LogPipeline>,
    ignore: RouteMatcher,
}

impl InboundInspectorLayer {
    pub fn new(pipeline: Arc<LogPipeline>, ignore_routes: &[String]) -> Result<Self, InstallError> {
        Ok(Self {
            shared: Arc::new(Shared {
                pipeline,
                ignore: RouteMatcher::compile(ignore_routes)?,
            }),
        })
    }
}

impl<S> Layer<S> for InboundInspectorLayer {
    type Service = InboundInspector<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InboundInspector {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service wrapper produced by [`InboundInspectorLayer`].
#[derive(Clone)]
pub struct InboundInspector<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> Service<Request<Body>> for InboundInspector<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let shared = self.shared.clone();
        // Swap in the clone, keep the service that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let path = req.uri().path().to_string();
            if shared.ignore.matches(&path) {
                return inner.call(req).await;
            }

            let correlation_id = req
                .headers()
                .get(CORRELATION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let ctx = Context::with_correlation_id(correlation_id.clone());
            let snapshot = ctx.snapshot();

            let started = Instant::now();
            let method = req.method().to_string();
            let url = req.uri().to_string();
            let query = query_to_value(req.uri().query());
            let request_headers = headers_to_value(req.headers());
            let client_ip = client_ip(&req);

            let request_capture = CaptureBuffer::new();
            let (parts, body) = req.into_parts();
            let req = Request::from_parts(
                parts,
                Body::new(TeeBody::new(body, request_capture.clone())),
            );

            let mut response = ctx.clone().scope(inner.call(req)).await?;

            if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                response.headers_mut().insert(CORRELATION_HEADER, value);
            }

            let status = response.status().as_u16();
            let response_headers = headers_to_value(response.headers());
            let response_capture = CaptureBuffer::new();
            let pipeline = shared.pipeline.clone();

            let (parts, body) = response.into_parts();
            let hook_capture = response_capture.clone();
            let emit = move |outcome: StreamOutcome| {
                emit_record(
                    &pipeline,
                    snapshot,
                    InboundExchange {
                        method,
                        path,
                        url,
                        query,
                        client_ip,
                        request_headers,
                        request_body: request_capture.to_value(),
                        status,
                        response_headers,
                        response_body: hook_capture.to_value(),
                        duration_ms: started.elapsed().as_millis(),
                    },
                    outcome,
                );
            };
            let body = Body::new(TeeBody::with_end_hook(body, response_capture, emit));
            Ok(Response::from_parts(parts, body))
        })
    }
}

struct InboundExchange {
    method: String,
    path: String,
    url: String,
    query: Value,
    client_ip: Option<String>,
    request_headers: Value,
    request_body: Value,
    status: u16,
    response_headers: Value,
    response_body: Value,
    duration_ms: u128,
}

fn emit_record(
    pipeline: &LogPipeline,
    snapshot: ContextSnapshot,
    exchange: InboundExchange,
    outcome: StreamOutcome,
) {
    let message = format!(
        "[HTTP] [INBOUND] [{}] [{}] [{}] [{}ms]",
        exchange.method, exchange.path, exchange.status, exchange.duration_ms
    );
    let mut payload = Map::new();
    payload.insert(
        "request".into(),
        json!({
            "method": exchange.method,
            "url": exchange.url,
            "ip": exchange.client_ip,
            "headers": exchange.request_headers,
            "body": exchange.request_body,
            "query": exchange.query,
        }),
    );
    payload.insert(
        "response".into(),
        json!({
            "statusCode": exchange.status,
            "headers": exchange.response_headers,
            "body": exchange.response_body,
        }),
    );
    payload.insert("duration".into(), json!(format!("{}ms", exchange.duration_ms)));

    let mut event = LogEvent::new(level_for_status(exchange.status), message)
        .with_payload(payload)
        .with_context(snapshot);
    if let StreamOutcome::Errored(error) = outcome {
        // Response stream errors outrank the status-derived level.
        event.level = crate::logging::Level::Error;
        event = event.with_error(LoggedError::new(error));
    }
    pipeline.emit(event);
}

fn query_to_value(query: Option<&str>) -> Value {
    let Some(query) = query else {
        return Value::Object(Map::new());
    };
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        map.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    Value::Object(map)
}

fn client_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            return Some(first.trim().to_string());
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
