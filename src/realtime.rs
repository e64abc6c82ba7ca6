//! In-process change feed.
//!
//! Mutating services publish a [`ChangeEvent`] after each successful write;
//! WebSocket sessions subscribe with a resource plus a predicate and forward
//! whatever matches. A [`Subscription`] is a cancelable handle: dropping it
//! removes the subscriber, so a torn-down socket can never leak its callback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Queue depth per subscriber. A consumer this far behind is abandoned to
/// re-query on its next connect rather than allowed to stall publishers.
const SUBSCRIBER_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Cases,
    Conversations,
    Messages,
    Medications,
    Orders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// One row-level change, as pushed to subscribers and over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub resource: Resource,
    pub action: ChangeAction,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    pub fn insert(resource: Resource, entity_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            resource,
            action: ChangeAction::Insert,
            entity_id,
            payload,
        }
    }

    pub fn update(resource: Resource, entity_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            resource,
            action: ChangeAction::Update,
            entity_id,
            payload,
        }
    }

    pub fn delete(resource: Resource, entity_id: Uuid) -> Self {
        Self {
            resource,
            action: ChangeAction::Delete,
            entity_id,
            payload: serde_json::Value::Null,
        }
    }
}

type Predicate = Box<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

struct Subscriber {
    resource: Resource,
    predicate: Predicate,
    tx: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// Shared publish/subscribe registry. Cloning is cheap; all clones feed the
/// same subscriber table.
#[derive(Clone, Default)]
pub struct ChangeHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in one resource, narrowed by a predicate over the
    /// event (typically an ownership check on the payload).
    pub fn subscribe<F>(&self, resource: Resource, predicate: F) -> Subscription
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(
            id,
            Subscriber {
                resource,
                predicate: Box::new(predicate),
                tx,
            },
        );
        Subscription {
            id,
            hub: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Fan an event out to every matching subscriber. Never blocks: a full
    /// queue drops the event for that subscriber, a closed one is removed.
    pub fn publish(&self, event: &ChangeEvent) {
        let mut dead = Vec::new();
        {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            for (id, sub) in &inner.subscribers {
                if sub.resource != event.resource || !(sub.predicate)(event) {
                    continue;
                }
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = id, "change feed subscriber lagging, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }
        if !dead.is_empty() {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            for id in dead {
                inner.subscribers.remove(&id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .len()
    }
}

/// Live handle to a subscription. Receive events with [`Subscription::recv`];
/// drop the handle to cancel.
pub struct Subscription {
    id: u64,
    hub: Arc<Mutex<HubInner>>,
    rx: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut inner = self.hub.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.remove(&self.id);
    }
}
