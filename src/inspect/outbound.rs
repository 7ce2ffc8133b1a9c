//! Outbound traffic interception.
//!
//! # Responsibilities
//! - Inject the current context's correlation id into outgoing headers
//! - Tee request and response bodies for calls on the allow-list
//! - Emit one record per terminal call state, re-raising errors unchanged
//!
//! # Design Decisions
//! - No process-wide patching: callers opt in by wrapping their client in
//!   [`InspectedClient`], which preserves the inner call signature exactly
//! - The transport seam is a trait, so tests drive the interceptor with a
//!   programmable transport instead of a live socket

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use http::header::HeaderValue;
use http::{Method, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::context::Context;
use crate::error::InstallError;
use crate::inspect::body::{CaptureBuffer, StreamOutcome, TeeBody};
use crate::inspect::headers_to_value;
use crate::inspect::routes::RouteMatcher;
use crate::inspect::CORRELATION_HEADER;
use crate::logging::{level_for_status, Level, LogEvent, LogPipeline, LoggedError};

/// Failure raised by the underlying transport. The interceptor logs these
/// and returns them unchanged; it never swallows or replaces them.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0}")]
    Other(String),
}

/// The "issue an HTTP call" seam the interceptor decorates.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, TransportError>;
}

#[async_trait]
impl HttpTransport for Client<HttpConnector, Body> {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let response = self.request(req).await?;
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Options for one wrapped client.
#[derive(Debug, Clone, Default)]
pub struct OutboundOptions {
    /// Allow-list of path globs. A call matching none of them proceeds
    /// unmodified and unobserved. Empty list: nothing is inspected.
    pub allowed_routes: Vec<String>,
    /// Whether body inspection is active (`mode ∈ {all, outbound}`).
    pub inspect: bool,
    /// Whether to inject `x-correlation-id` even when inspection is off.
    pub propagate_correlation: bool,
}

/// Decorator over an [`HttpTransport`] adding correlation propagation and
/// traffic inspection. `request` and `get` mirror the inner transport's
/// contract; callers cannot observe the wrapping.
pub struct InspectedClient<T> {
    transport: T,
    pipeline: Arc<LogPipeline>,
    allowed: RouteMatcher,
    inspect: bool,
    propagate: bool,
}

impl InspectedClient<Client<HttpConnector, Body>> {
    /// Wrap a fresh hyper client with the given options.
    pub fn from_options(
        pipeline: Arc<LogPipeline>,
        options: &OutboundOptions,
    ) -> Result<Self, InstallError> {
        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(HttpConnector::new());
        Self::new(client, pipeline, options)
    }
}

impl<T: HttpTransport> InspectedClient<T> {
    pub fn new(
        transport: T,
        pipeline: Arc<LogPipeline>,
        options: &OutboundOptions,
    ) -> Result<Self, InstallError> {
        Ok(Self {
            transport,
            pipeline,
            allowed: RouteMatcher::compile(&options.allowed_routes)?,
            inspect: options.inspect,
            propagate: options.propagate_correlation,
        })
    }

    /// Issue a request through the wrapped transport.
    ///
    /// When a context with a correlation id is current, the outgoing
    /// `x-correlation-id` header is set to it, overwriting any value the
    /// caller put there. Calls whose path misses the allow-list are
    /// delegated untouched with no buffering and no record.
    pub async fn request(&self, mut req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let snapshot = Context::try_current().ok().map(|ctx| ctx.snapshot());
        if self.propagate {
            if let Some(correlation_id) =
                snapshot.as_ref().and_then(|s| s.correlation_id.as_deref())
            {
                if let Ok(value) = HeaderValue::from_str(correlation_id) {
                    req.headers_mut().insert(CORRELATION_HEADER, value);
                }
            }
        }

        let path = req.uri().path().to_string();
        if !self.inspect || !self.allowed.matches(&path) {
            return self.transport.send(req).await;
        }

        let started = Instant::now();
        let method = req.method().to_string();
        let url = req.uri().to_string();
        let request_headers = headers_to_value(req.headers());
        let request_capture = CaptureBuffer::new();

        let (parts, body) = req.into_parts();
        let req = Request::from_parts(
            parts,
            Body::new(TeeBody::new(body, request_capture.clone())),
        );

        let request_value = move |capture: &CaptureBuffer| {
            json!({
                "method": method,
                "url": url,
                "path": path,
                "headers": request_headers,
                "body": capture.to_value(),
            })
        };

        match self.transport.send(req).await {
            Ok(response) => {
                let status = response.status().as_u16();
                let response_headers = headers_to_value(response.headers());
                let response_capture = CaptureBuffer::new();
                let hook_capture = response_capture.clone();
                let pipeline = self.pipeline.clone();

                let (parts, body) = response.into_parts();
                let emit = move |outcome: StreamOutcome| {
                    let duration_ms = started.elapsed().as_millis();
                    let mut payload = Map::new();
                    payload.insert("request".into(), request_value(&request_capture));
                    payload.insert(
                        "response".into(),
                        json!({
                            "statusCode": status,
                            "headers": response_headers,
                            "body": hook_capture.to_value(),
                        }),
                    );
                    payload.insert("duration".into(), json!(format!("{duration_ms}ms")));

                    let message = format!(
                        "[HTTP] [OUTBOUND] [{}] [{}] [{}ms]",
                        status,
                        outcome_tag(&outcome),
                        duration_ms
                    );
                    let mut event =
                        LogEvent::new(level_for_status(status), message).with_payload(payload);
                    if let Some(snapshot) = snapshot {
                        event = event.with_context(snapshot);
                    }
                    if let StreamOutcome::Errored(error) = outcome {
                        event.level = Level::Error;
                        event = event.with_error(LoggedError::new(error));
                    }
                    pipeline.emit(event);
                };
                let body = Body::new(TeeBody::with_end_hook(body, response_capture, emit));
                Ok(Response::from_parts(parts, body))
            }
            Err(error) => {
                // Request-level transport failure: no response ever arrived.
                let duration_ms = started.elapsed().as_millis();
                let mut payload = Map::new();
                payload.insert("request".into(), request_value(&request_capture));
                payload.insert("duration".into(), json!(format!("{duration_ms}ms")));

                let mut logged = LoggedError::from_error(&error);
                if let Some(snapshot) = snapshot {
                    logged = logged.with_context(snapshot);
                }
                self.pipeline.emit(
                    LogEvent::new(
                        Level::Error,
                        format!("[HTTP] [OUTBOUND] [FAILED] [{duration_ms}ms]"),
                    )
                    .with_payload(payload)
                    .with_error(logged),
                );
                Err(error)
            }
        }
    }

    /// Issue a GET with an empty body; sugar over [`InspectedClient::request`].
    pub async fn get(&self, url: &str) -> Result<Response<Body>, TransportError> {
        url::Url::parse(url).map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let uri: Uri = url
            .parse()
            .map_err(|_| TransportError::Other(format!("invalid request url `{url}`")))?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|err| TransportError::Other(err.to_string()))?;
        self.request(req).await
    }
}

fn outcome_tag(outcome: &StreamOutcome) -> &'static str {
    match outcome {
        StreamOutcome::Completed => "COMPLETED",
        StreamOutcome::Errored(_) => "RESPONSE_ERROR",
    }
}
