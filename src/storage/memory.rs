use std::collections::BTreeMap;

use anyhow::{bail, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::{
    EntryStore, RangeSubscription, StoreEvent, StorePayload, SubscriptionHandle,
    SubscriptionRegistry,
};
use crate::dates::DateKey;
use crate::model::{Entry, MonthEntryCache, UserId};

/// In-process entry store; contents vanish with the process.
#[derive(Default)]
pub struct MemoryEntryStore {
    entries: Mutex<BTreeMap<UserId, MonthEntryCache>>,
    registry: SubscriptionRegistry,
    offline: Mutex<Option<String>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.registry.len()
    }

    pub fn entry(&self, user_id: &UserId, day: DateKey) -> Option<Entry> {
        self.entries
            .lock()
            .get(user_id)
            .and_then(|days| days.get(&day).cloned())
    }

    /// While offline every write fails and every delivery is an error.
    pub fn set_offline(&self, reason: Option<&str>) {
        *self.offline.lock() = reason.map(str::to_string);
    }

    fn snapshot_payload(&self, request: &RangeSubscription) -> StorePayload {
        if let Some(reason) = self.offline.lock().clone() {
            return StorePayload::Error(reason);
        }
        let entries = self.entries.lock();
        let snapshot = entries
            .get(&request.user_id)
            .map(|days| {
                days.range(request.start..=request.end)
                    .map(|(day, entry)| (*day, entry.clone()))
                    .collect()
            })
            .unwrap_or_default();
        StorePayload::Snapshot(snapshot)
    }
}

impl EntryStore for MemoryEntryStore {
    fn subscribe(
        &self,
        request: RangeSubscription,
        sink: Sender<StoreEvent>,
    ) -> SubscriptionHandle {
        let payload = self.snapshot_payload(&request);
        let handle = self.registry.register(request, sink);
        self.registry.emit(handle, payload);
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.registry.release(handle);
    }

    fn put(&self, user_id: &UserId, entry: &Entry) -> Result<()> {
        if let Some(reason) = self.offline.lock().clone() {
            bail!("store offline: {reason}");
        }
        self.entries
            .lock()
            .entry(user_id.clone())
            .or_default()
            .insert(entry.date, entry.clone());
        self.registry
            .notify(user_id, entry.date, |request| self.snapshot_payload(request));
        Ok(())
    }
}
