//! Topic to handler-list registry.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::message::Topic;

/// Error a handler may return. It is logged and otherwise ignored.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&Value) -> HandlerResult + Send + Sync>;

/// Identifies a registered handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Handlers per topic, kept in registration order.
///
/// Every handler runs in isolation: an error return or a panic is logged and
/// the remaining handlers for the topic still run.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<Topic, Vec<(HandlerId, Handler)>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, topic: Topic, handler: F) -> HandlerId
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered for `topic`.
    pub fn remove(&self, topic: &Topic, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(topic);
        }
        removed
    }

    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.handlers.read().get(topic).map_or(0, Vec::len)
    }

    /// Invoke every handler for `topic` with `payload`.
    ///
    /// Returns how many handlers completed without error.
    pub fn dispatch(&self, topic: &Topic, payload: &Value) -> usize {
        // Snapshot the list so handlers may register or remove handlers.
        let handlers: Vec<(HandlerId, Handler)> = match self.handlers.read().get(topic) {
            Some(list) => list.clone(),
            None => {
                tracing::trace!(%topic, "No handlers for topic");
                return 0;
            }
        };

        let mut ok = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::warn!(%topic, handler = id.0, error = %e, "Handler failed");
                }
                Err(_) => {
                    tracing::error!(%topic, handler = id.0, "Handler panicked");
                }
            }
        }
        ok
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<&str, usize> = handlers
            .iter()
            .map(|(topic, list)| (topic.as_str(), list.len()))
            .collect();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &counts)
            .finish()
    }
}
