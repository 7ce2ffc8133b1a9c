//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::BodyExt;
use tokio::net::TcpListener;

use wiretap::config::{LoggerConfig, ServiceConfig};
use wiretap::inspect::{HttpTransport, TransportError};
use wiretap::logging::{LogPipeline, MemorySink};

/// Pipeline capturing records in memory.
pub fn test_pipeline() -> (Arc<LogPipeline>, MemorySink) {
    let sink = MemorySink::new();
    let service = ServiceConfig {
        name: "test-service".into(),
        environment: "test".into(),
    };
    let pipeline =
        LogPipeline::with_sink(&service, &LoggerConfig::default(), Arc::new(sink.clone()))
            .unwrap();
    (Arc::new(pipeline), sink)
}

/// Serve `app` on an ephemeral port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Records are emitted from body-completion hooks, which can land a beat
/// after the client sees the last byte; poll briefly instead of sleeping.
pub async fn wait_for_records(sink: &MemorySink, count: usize) -> Vec<serde_json::Value> {
    for _ in 0..100 {
        let records = sink.records();
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {count} records, got {} after 1s: {:?}",
        sink.records().len(),
        sink.lines()
    );
}

/// One request observed by the [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// What the mock should do with the next call.
#[derive(Clone)]
pub enum MockBehavior {
    Respond { status: StatusCode, body: &'static str },
    FailTransport(&'static str),
    /// Respond OK, stream `prefix`, then fail the body mid-stream.
    StreamError { prefix: &'static str, message: &'static str },
}

/// Programmable transport standing in for a live HTTP client.
#[derive(Clone)]
pub struct MockTransport {
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    behavior: MockBehavior,
}

impl MockTransport {
    pub fn respond(status: StatusCode, body: &'static str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            behavior: MockBehavior::Respond { status, body },
        }
    }

    pub fn fail(message: &'static str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            behavior: MockBehavior::FailTransport(message),
        }
    }

    pub fn stream_error(prefix: &'static str, message: &'static str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            behavior: MockBehavior::StreamError { prefix, message },
        }
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let (parts, body) = req.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers.clone(),
            body: bytes.to_vec(),
        });
        match &self.behavior {
            MockBehavior::Respond { status, body } => Ok(Response::builder()
                .status(*status)
                .header("content-type", "application/json")
                .body(Body::from(*body))
                .unwrap()),
            MockBehavior::FailTransport(message) => Err(TransportError::Other(message.to_string())),
            MockBehavior::StreamError { prefix, message } => {
                let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
                    Ok(*prefix),
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        *message,
                    )),
                ];
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from_stream(futures_util::stream::iter(chunks)))
                    .unwrap())
            }
        }
    }
}
