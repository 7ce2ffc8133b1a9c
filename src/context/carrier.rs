//! The context carrier and its task-local scope.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::error::NoActiveContext;

tokio::task_local! {
    static CURRENT: Context;
}

/// Metadata key under which request-scoped log tags are stored. Entries
/// placed here are folded into every record emitted within the request.
pub const LOG_TAGS_KEY: &str = "__log_tags__";

/// Ambient state for one logical request.
///
/// Cloning is cheap and yields a handle to the same underlying bag:
/// `set` through one clone is observed through all others.
#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    id: Uuid,
    bag: Mutex<Bag>,
}

#[derive(Debug, Default)]
struct Bag {
    correlation_id: Option<String>,
    metadata: HashMap<String, Value>,
}

/// Point-in-time copy of a context's identifiers, suitable for attaching
/// to an error that may be logged after the originating scope has ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub context_id: String,
    pub correlation_id: Option<String>,
}

impl Context {
    /// Create a fresh context with no correlation id.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                bag: Mutex::new(Bag::default()),
            }),
        }
    }

    /// Create a context carrying the given correlation id.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        let ctx = Self::new();
        ctx.set_correlation_id(correlation_id);
        ctx
    }

    /// Opaque identifier of this context.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.lock().correlation_id.clone()
    }

    pub fn set_correlation_id(&self, correlation_id: impl Into<String>) {
        self.lock().correlation_id = Some(correlation_id.into());
    }

    /// Fetch a metadata entry.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().metadata.get(key).cloned()
    }

    /// Store a metadata entry. Last write wins.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.lock().metadata.insert(key.into(), value);
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let bag = self.lock();
        ContextSnapshot {
            context_id: self.inner.id.to_string(),
            correlation_id: bag.correlation_id.clone(),
        }
    }

    /// Run `fut` with this context current on the task. Every `await` point
    /// inside `fut`, including calls made through the outbound interceptor,
    /// observes this context via [`Context::try_current`].
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// The context of the enclosing logical request, if any.
    pub fn try_current() -> Result<Context, NoActiveContext> {
        CURRENT.try_with(Context::clone).map_err(|_| NoActiveContext)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bag> {
        // The bag mutex is never held across an await, so poisoning can
        // only come from a panicking accessor; propagate the panic.
        self.inner.bag.lock().expect("context bag poisoned")
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
