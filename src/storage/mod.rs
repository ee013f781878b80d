use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::dates::{DateKey, MonthRange};
use crate::model::{Entry, MonthEntryCache, UserId};

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryEntryStore;
pub use sqlite::{init, SqliteEntryStore};

pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSubscription {
    pub user_id: UserId,
    pub start: DateKey,
    pub end: DateKey,
    pub generation: Generation,
}

impl RangeSubscription {
    pub fn for_month(user_id: UserId, month: MonthRange, generation: Generation) -> Self {
        Self {
            user_id,
            start: month.start(),
            end: month.end(),
            generation,
        }
    }

    pub fn covers(&self, user_id: &UserId, day: DateKey) -> bool {
        &self.user_id == user_id && self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePayload {
    Snapshot(MonthEntryCache),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub generation: Generation,
    pub payload: StorePayload,
}

/// Per-user, per-day keyed entry collection with live range subscriptions.
///
/// Subscribers receive an initial snapshot and a fresh snapshot after
/// every write inside their range, over the channel they hand in.
/// Delivery is asynchronous: events wait in the channel until the
/// subscriber drains it.
pub trait EntryStore: Send + Sync {
    fn subscribe(&self, request: RangeSubscription, sink: Sender<StoreEvent>)
        -> SubscriptionHandle;

    /// Releasing an unknown or already released handle is a no-op.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Full replace of the entry at `(user_id, entry.date)`.
    fn put(&self, user_id: &UserId, entry: &Entry) -> Result<()>;
}

struct Listener {
    request: RangeSubscription,
    sink: Sender<StoreEvent>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<SubscriptionHandle, Listener>>,
}

impl SubscriptionRegistry {
    pub fn register(
        &self,
        request: RangeSubscription,
        sink: Sender<StoreEvent>,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        tracing::debug!(
            handle = handle.0,
            user = %request.user_id,
            start = %request.start,
            end = %request.end,
            generation = request.generation,
            "registered range subscription"
        );
        self.listeners
            .lock()
            .insert(handle, Listener { request, sink });
        handle
    }

    pub fn release(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.listeners.lock().remove(&handle).is_some();
        if removed {
            tracing::debug!(handle = handle.0, "released range subscription");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, handle: SubscriptionHandle, payload: StorePayload) {
        let target = self
            .listeners
            .lock()
            .get(&handle)
            .map(|listener| (listener.request.generation, listener.sink.clone()));
        let Some((generation, sink)) = target else {
            return;
        };
        if sink.send(StoreEvent { generation, payload }).is_err() {
            self.release(handle);
        }
    }

    pub fn notify<F>(&self, user_id: &UserId, day: DateKey, mut snapshot: F)
    where
        F: FnMut(&RangeSubscription) -> StorePayload,
    {
        let targets: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, listener)| listener.request.covers(user_id, day))
            .map(|(handle, listener)| (*handle, listener.request.clone(), listener.sink.clone()))
            .collect();

        let mut disconnected = Vec::new();
        for (handle, request, sink) in targets {
            let payload = snapshot(&request);
            let event = StoreEvent {
                generation: request.generation,
                payload,
            };
            if sink.send(event).is_err() {
                disconnected.push(handle);
            }
        }
        for handle in disconnected {
            tracing::debug!(handle = handle.0, "dropping listener with closed channel");
            self.release(handle);
        }
    }
}
