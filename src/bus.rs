//! The event bus: routes events to handlers by [`EventClass`], runs each
//! delivery as an independent task on a shared, bounded worker pool, and can
//! be asked to wait for every in-flight handler invocation to finish.
//!
//! Each post fans out one task per matching handler, behind one shared
//! bounded pool for the bus's whole lifetime (rather than spinning up a
//! fresh pool per call), to avoid unbounded task spawning under deeply
//! nested `Parallel`/`Repeat` instructions. `wait=true` surfaces the first
//! handler error; `wait=false` logs and drops it. A recordable event also
//! reaches handlers registered for the `Recordable` family.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::component::ComponentHandle;
use crate::error::{SynapseError, SynapseResult};
use crate::event::{Event, EventClass, GetComponentEvent};

pub type HandlerFuture = Pin<Box<dyn Future<Output = SynapseResult<()>> + Send>>;
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Wraps a plain async closure into the [`Handler`] shape the bus expects.
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SynapseResult<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Default number of concurrently-running handler invocations across the
/// whole bus.
pub const DEFAULT_POOL_SIZE: usize = 16;

pub struct EventBus {
    handlers: RwLock<HashMap<EventClass, Vec<Handler>>>,
    pool: Arc<Semaphore>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_pool_size(DEFAULT_POOL_SIZE)
    }

    #[must_use]
    pub fn with_pool_size(pool_size: usize) -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(HashMap::new()),
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            inflight: Mutex::new(Vec::new()),
        })
    }

    pub async fn register_handler(&self, class: EventClass, handler: Handler) {
        self.handlers.write().await.entry(class).or_default().push(handler);
    }

    /// Removes one previously-registered handler for `class`. Fails if no
    /// matching handler (by pointer identity) is currently registered.
    pub async fn deregister_handler(&self, class: EventClass, handler: &Handler) -> SynapseResult<()> {
        let mut handlers = self.handlers.write().await;
        let Some(bucket) = handlers.get_mut(&class) else {
            return Err(SynapseError::logic_fault("handler was not registered"));
        };
        let position = bucket.iter().position(|h| Arc::ptr_eq(h, handler));
        match position {
            Some(index) => {
                bucket.remove(index);
                Ok(())
            }
            None => Err(SynapseError::logic_fault("handler was not registered")),
        }
    }

    async fn resolve_handlers(&self, event: &Event) -> Vec<Handler> {
        let handlers = self.handlers.read().await;
        let mut resolved = handlers.get(&event.class()).cloned().unwrap_or_default();
        if event.is_recordable() {
            if let Some(recordable) = handlers.get(&EventClass::Recordable) {
                resolved.extend(recordable.iter().cloned());
            }
        }
        resolved
    }

    /// Posts `event` to every handler registered for its class (plus the
    /// recordable family, if applicable). Each delivery runs as its own task
    /// behind the shared pool. If `wait` is true, blocks until every handler
    /// invoked for this post has returned, and propagates the first error
    /// seen. If `wait` is false, delivery continues in the background; any
    /// handler error is logged and dropped.
    pub async fn post(&self, event: Event, wait: bool) -> SynapseResult<()> {
        let handlers = self.resolve_handlers(&event).await;
        if handlers.is_empty() {
            tracing::warn!(class = ?event.class(), "post: no registered handlers");
            return Ok(());
        }

        let mut replies = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let event = event.clone();
            let pool = self.pool.clone();
            let (tx, rx) = oneshot::channel();
            let class = event.class();
            let join = tokio::spawn(async move {
                let _permit = pool.acquire_owned().await.expect("event bus pool closed");
                let result = handler(event).await;
                if let Err(ref error) = result {
                    tracing::error!(?class, %error, "event handler returned an error");
                }
                let _ = tx.send(result);
            });
            self.inflight.lock().await.push(join);
            replies.push(rx);
        }

        if wait {
            let mut first_error = None;
            for reply in replies {
                if let Ok(Err(error)) = reply.await {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
            if let Some(error) = first_error {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Blocks until every handler invocation submitted so far has finished.
    pub async fn stop(&self) {
        let handles: Vec<_> = self.inflight.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Convenience used by [`crate::component::Registry::set_variable`] to
    /// publish the write-completed notification. Fire-and-forget: callers
    /// that mutate a variable do not block on every observer.
    pub async fn publish_variable_update(
        &self,
        component: impl Into<String>,
        variable: impl Into<String>,
        value: serde_json::Value,
    ) {
        let event = Event::VariableUpdate(crate::event::VariableUpdateEvent {
            component: component.into(),
            variable: variable.into(),
            value,
        });
        let _ = self.post(event, false).await;
    }
}

/// Resolves a component by name by posting a [`GetComponentEvent`] and
/// waiting for the registered handler (normally the application's own
/// registry-backed handler) to answer.
pub async fn get_component(bus: &EventBus, name: &str) -> SynapseResult<ComponentHandle> {
    let found: Arc<std::sync::Mutex<Option<ComponentHandle>>> = Arc::new(std::sync::Mutex::new(None));
    let found_for_callback = found.clone();
    let event = Event::GetComponent(GetComponentEvent::new(name, move |component| {
        *found_for_callback.lock().unwrap() = component;
    }));
    bus.post(event, true).await?;
    let resolved = found.lock().unwrap().take();
    resolved.ok_or_else(|| SynapseError::unknown_component(name))
}
