//! Event handler registry and dispatch.
//!
//! Handlers are async closures keyed by [`EventKind`]. Dispatch runs them one
//! after another, in registration order, before the reader loop takes the
//! next message. A handler that fails, panics, or overruns its time budget
//! is logged and skipped; the remaining handlers still run.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::event::{Event, EventKind};

/// Future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

type BoxedHandler<C> = Arc<dyn Fn(C, Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Handler registry. `C` is the context handed to every handler (the
/// [`Client`](crate::Client) in practice).
pub struct Dispatcher<C> {
    handlers: RwLock<HashMap<EventKind, Vec<BoxedHandler<C>>>>,
    timeout: Duration,
}

impl<C: Clone + Send + Sync + 'static> Dispatcher<C> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Register `handler` for `kind`. It runs after all earlier registrations.
    pub fn register<F, Fut>(&self, kind: EventKind, handler: F)
    where
        F: Fn(C, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: BoxedHandler<C> = Arc::new(move |ctx, event| handler(ctx, event).boxed());
        self.handlers.write().entry(kind).or_default().push(boxed);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Run every handler registered for the event's kind.
    ///
    /// The registry lock is released before any handler runs, so handlers may
    /// register further handlers; those apply from the next event on.
    pub async fn dispatch(&self, ctx: &C, event: Event) {
        let kind = event.kind();
        let handlers = match self.handlers.read().get(&kind) {
            Some(handlers) if !handlers.is_empty() => handlers.clone(),
            _ => return,
        };
        let event = Arc::new(event);

        for (index, handler) in handlers.iter().enumerate() {
            let call = std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx.clone(), Arc::clone(&event))));
            let future = match call {
                Ok(future) => future,
                Err(_) => {
                    warn!(event = %kind, handler = index, "Handler panicked");
                    continue;
                }
            };

            match tokio::time::timeout(self.timeout, AssertUnwindSafe(future).catch_unwind()).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    warn!(event = %kind, handler = index, error = %e, "Handler failed");
                }
                Ok(Err(_)) => {
                    warn!(event = %kind, handler = index, "Handler panicked");
                }
                Err(_) => {
                    warn!(event = %kind, handler = index, timeout_ms = self.timeout.as_millis() as u64, "Handler timed out");
                }
            }
        }
        debug!(event = %kind, handlers = handlers.len(), "Dispatched");
    }
}
