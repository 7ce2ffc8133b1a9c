//! Body teeing: capture bytes in transit without altering delivery.
//!
//! # Responsibilities
//! - Forward every frame of the wrapped body untouched
//! - Append data frames to a shared, size-capped capture buffer
//! - Fire a one-shot hook when the stream ends or errors
//!
//! # Design Decisions
//! - Capture is a side channel: a full buffer stops capturing, never the
//!   stream itself
//! - Chunks are kept as produced and concatenated lazily, so capture order
//!   always mirrors wire order

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use serde_json::Value;

/// Captured bodies are cut off past this many bytes.
pub const MAX_CAPTURE_BYTES: usize = 256 * 1024;

/// How a teed stream terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Errored(String),
}

type EndHook = Box<dyn FnOnce(StreamOutcome) + Send>;

/// Ordered, size-capped chunk accumulator shared between a [`TeeBody`] and
/// the record emitter.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    chunks: Mutex<Vec<Bytes>>,
    captured: Mutex<usize>,
    truncated: AtomicBool,
}

impl CaptureBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, chunk: &Bytes) {
        let mut captured = self.captured.lock().expect("capture size poisoned");
        if *captured >= MAX_CAPTURE_BYTES {
            self.truncated.store(true, Ordering::Relaxed);
            return;
        }
        let take = chunk.len().min(MAX_CAPTURE_BYTES - *captured);
        if take < chunk.len() {
            self.truncated.store(true, Ordering::Relaxed);
        }
        *captured += take;
        self.chunks
            .lock()
            .expect("capture chunks poisoned")
            .push(chunk.slice(..take));
    }

    /// Concatenate everything captured so far.
    pub fn contents(&self) -> Bytes {
        let chunks = self.chunks.lock().expect("capture chunks poisoned");
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(total);
        for chunk in chunks.iter() {
            out.extend_from_slice(chunk);
        }
        out.freeze()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Relaxed)
    }

    /// Loggable view of the captured body: parsed JSON when the bytes are
    /// JSON, a string otherwise, null when nothing was captured.
    pub fn to_value(&self) -> Value {
        let bytes = self.contents();
        if bytes.is_empty() {
            return Value::Null;
        }
        if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
            return value;
        }
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Wraps an [`http_body::Body`], duplicating data frames into a
/// [`CaptureBuffer`] while delivering them unchanged.
pub struct TeeBody<B> {
    inner: B,
    capture: Arc<CaptureBuffer>,
    on_end: Option<EndHook>,
}

impl<B> TeeBody<B> {
    pub fn new(inner: B, capture: Arc<CaptureBuffer>) -> Self {
        Self {
            inner,
            capture,
            on_end: None,
        }
    }

    /// Like [`TeeBody::new`], additionally firing `hook` exactly once when
    /// the stream completes or errors.
    pub fn with_end_hook(
        inner: B,
        capture: Arc<CaptureBuffer>,
        hook: impl FnOnce(StreamOutcome) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            capture,
            on_end: Some(Box::new(hook)),
        }
    }
}

impl<B> Body for TeeBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.push(data);
                }
                if this.inner.is_end_stream() {
                    if let Some(hook) = this.on_end.take() {
                        hook(StreamOutcome::Completed);
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(error))) => {
                if let Some(hook) = this.on_end.take() {
                    hook(StreamOutcome::Errored(error.to_string()));
                }
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                if let Some(hook) = this.on_end.take() {
                    hook(StreamOutcome::Completed);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn delivery_is_byte_identical_and_captured() {
        let capture = CaptureBuffer::new();
        let body = axum::body::Body::from("hello world");
        let teed = TeeBody::new(body, capture.clone());
        let delivered = teed.collect().await.unwrap().to_bytes();
        assert_eq!(&delivered[..], b"hello world");
        assert_eq!(&capture.contents()[..], b"hello world");
        assert!(!capture.is_truncated());
    }

    #[tokio::test]
    async fn end_hook_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let capture = CaptureBuffer::new();
        let counter = fired.clone();
        let teed = TeeBody::with_end_hook(
            axum::body::Body::from("x"),
            capture,
            move |outcome| {
                assert_eq!(outcome, StreamOutcome::Completed);
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let _ = teed.collect().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capture_is_capped_but_delivery_is_not() {
        let capture = CaptureBuffer::new();
        let big = vec![b'a'; MAX_CAPTURE_BYTES + 100];
        let teed = TeeBody::new(axum::body::Body::from(big.clone()), capture.clone());
        let delivered = teed.collect().await.unwrap().to_bytes();
        assert_eq!(delivered.len(), big.len());
        assert_eq!(capture.contents().len(), MAX_CAPTURE_BYTES);
        assert!(capture.is_truncated());
    }

    #[test]
    fn json_bodies_log_as_structured_values() {
        let capture = CaptureBuffer::new();
        capture.push(&Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(capture.to_value(), serde_json::json!({ "a": 1 }));
    }

    #[test]
    fn empty_capture_logs_as_null() {
        let capture = CaptureBuffer::new();
        assert_eq!(capture.to_value(), Value::Null);
    }
}
