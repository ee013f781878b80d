use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use time::OffsetDateTime;

use crate::colorize::{self, PainColor};
use crate::config::NotesConfig;
use crate::dates::{DateKey, MonthRange};
use crate::journaling::DebouncedWriter;
use crate::model::{Entry, MonthEntryCache, PainLevel, UserId, UNSET_PAIN_LEVEL};
use crate::storage::{
    EntryStore, Generation, RangeSubscription, StoreEvent, StorePayload, SubscriptionHandle,
};

const INITIAL_PAIN_LEVEL: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub date: DateKey,
    /// `None` means nothing is logged for `date` yet.
    pub pain_level: Option<PainLevel>,
    pub notes: String,
}

impl SelectionState {
    fn empty(date: DateKey) -> Self {
        Self {
            date,
            pain_level: None,
            notes: String::new(),
        }
    }

    fn from_entry(entry: &Entry) -> Self {
        Self {
            date: entry.date,
            pain_level: Some(entry.pain_level),
            notes: entry.notes.clone(),
        }
    }

    pub fn pain_level_raw(&self) -> i64 {
        self.pain_level.map(i64::from).unwrap_or(UNSET_PAIN_LEVEL)
    }

    /// The entry this selection would store; `None` while the level is unset.
    pub fn to_entry(&self) -> Option<Entry> {
        self.pain_level
            .map(|level| Entry::new(self.date, level, self.notes.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    Idle,
    Synced {
        at: OffsetDateTime,
    },
    Error {
        message: String,
        at: OffsetDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: DateKey,
    pub pain_level: PainLevel,
    pub notes: String,
    pub date_name: String,
}

impl From<&Entry> for ChartPoint {
    fn from(entry: &Entry) -> Self {
        Self {
            date: entry.date,
            pain_level: entry.pain_level,
            notes: entry.notes.clone(),
            date_name: entry.date.label(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub notes_debounce: Duration,
    pub flush_on_close: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&NotesConfig::default())
    }
}

impl From<&NotesConfig> for ControllerOptions {
    fn from(config: &NotesConfig) -> Self {
        Self {
            notes_debounce: config.debounce_duration(),
            flush_on_close: config.flush_on_close,
        }
    }
}

/// Holds at most one live month subscription. Deliveries tagged with an
/// older generation are dropped, and the month cache only changes when the
/// store delivers a snapshot.
pub struct PainEntryController<S: EntryStore + ?Sized> {
    store: Arc<S>,
    user_id: Option<UserId>,
    selection: SelectionState,
    month_cache: MonthEntryCache,
    displayed_month: MonthRange,
    subscription: Option<SubscriptionHandle>,
    generation: Generation,
    cache_generation: Generation,
    events_tx: Sender<StoreEvent>,
    events_rx: Receiver<StoreEvent>,
    notes_writer: DebouncedWriter,
    flush_on_close: bool,
    reseed_on_snapshot: bool,
    status: StoreStatus,
    closed: bool,
}

impl<S: EntryStore + ?Sized> PainEntryController<S> {
    pub fn new(store: Arc<S>, options: ControllerOptions, today: DateKey) -> Self {
        let (events_tx, events_rx) = unbounded();
        let selection = SelectionState {
            date: today,
            pain_level: PainLevel::new(INITIAL_PAIN_LEVEL).ok(),
            notes: String::new(),
        };
        Self {
            store,
            user_id: None,
            selection,
            month_cache: MonthEntryCache::new(),
            displayed_month: MonthRange::containing(today),
            subscription: None,
            generation: 0,
            cache_generation: 0,
            events_tx,
            events_rx,
            notes_writer: DebouncedWriter::new(options.notes_debounce),
            flush_on_close: options.flush_on_close,
            reseed_on_snapshot: false,
            status: StoreStatus::Idle,
            closed: false,
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn month_cache(&self) -> &MonthEntryCache {
        &self.month_cache
    }

    pub fn displayed_month(&self) -> MonthRange {
        self.displayed_month
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn status(&self) -> &StoreStatus {
        &self.status
    }

    pub fn has_pending_notes(&self) -> bool {
        self.notes_writer.is_pending()
    }

    pub fn set_user(&mut self, user_id: Option<UserId>) {
        if self.closed || self.user_id == user_id {
            return;
        }
        self.settle_pending_notes();
        self.release_subscription();
        self.month_cache.clear();
        self.status = StoreStatus::Idle;
        self.user_id = user_id;
        let Some(user) = &self.user_id else {
            tracing::info!("identity cleared; form idle");
            return;
        };
        tracing::info!(user = %user, "identity available; loading month");
        self.subscribe_displayed_month();
        self.apply_selection(self.selection.date);
        self.reseed_on_snapshot = true;
    }

    pub fn select_date(&mut self, date: DateKey) {
        if self.closed {
            return;
        }
        if date == self.selection.date {
            // keep the working copy, unsaved notes included
            if !self.displayed_month.contains(date) {
                self.change_month(MonthRange::containing(date));
            }
            return;
        }
        if self.notes_writer.cancel() {
            self.persist_selection();
        }
        if !self.displayed_month.contains(date) {
            self.change_month(MonthRange::containing(date));
        }
        self.apply_selection(date);
        // the cache may still hold a previous month until the next poll
        self.reseed_on_snapshot = self.cache_generation != self.generation;
    }

    pub fn set_pain_level(&mut self, level: PainLevel) {
        if self.closed {
            return;
        }
        self.reseed_on_snapshot = false;
        self.selection.pain_level = Some(level);
        // this write carries the current notes, so a pending notes write is redundant
        self.notes_writer.cancel();
        self.persist_selection();
    }

    pub fn set_notes(&mut self, notes: impl Into<String>, now: Instant) {
        if self.closed {
            return;
        }
        self.reseed_on_snapshot = false;
        self.selection.notes = notes.into();
        if self.user_id.is_some() {
            self.notes_writer.schedule(now);
        }
    }

    pub fn change_month(&mut self, month: MonthRange) {
        if self.closed || month == self.displayed_month {
            return;
        }
        tracing::debug!(month = %month, "changing displayed month");
        self.displayed_month = month;
        self.subscribe_displayed_month();
    }

    /// Drains store deliveries and fires the notes write once due.
    /// Returns whether anything visible changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            changed |= self.apply_event(event);
        }
        if self.notes_writer.poll(now) {
            self.persist_selection();
            changed = true;
        }
        changed
    }

    pub fn flush_notes(&mut self) -> bool {
        if self.notes_writer.cancel() {
            self.persist_selection()
        } else {
            false
        }
    }

    pub fn color_for(&self, day: DateKey) -> PainColor {
        colorize::color_for(
            day,
            self.selection.date,
            self.selection.pain_level,
            &self.month_cache,
        )
    }

    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.month_cache.values().map(ChartPoint::from).collect()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.settle_pending_notes();
        self.release_subscription();
        self.closed = true;
        tracing::debug!("pain entry controller closed");
    }

    fn settle_pending_notes(&mut self) {
        if self.flush_on_close {
            self.flush_notes();
        } else if self.notes_writer.cancel() {
            tracing::debug!(date = %self.selection.date, "dropping pending notes edit");
        }
    }

    fn apply_selection(&mut self, date: DateKey) {
        self.selection = match self.month_cache.get(&date) {
            Some(entry) => SelectionState::from_entry(entry),
            None => SelectionState::empty(date),
        };
    }

    fn apply_event(&mut self, event: StoreEvent) -> bool {
        if self.subscription.is_none() || event.generation != self.generation {
            tracing::trace!(
                stale = event.generation,
                current = self.generation,
                "discarding delivery from superseded subscription"
            );
            return false;
        }
        match event.payload {
            StorePayload::Snapshot(entries) => {
                tracing::debug!(
                    month = %self.displayed_month,
                    entries = entries.len(),
                    "month snapshot received"
                );
                self.month_cache = entries;
                self.cache_generation = event.generation;
                self.status = StoreStatus::Synced {
                    at: OffsetDateTime::now_utc(),
                };
                if self.reseed_on_snapshot {
                    self.reseed_on_snapshot = false;
                    self.apply_selection(self.selection.date);
                }
            }
            StorePayload::Error(message) => {
                tracing::warn!(month = %self.displayed_month, %message, "subscription delivery failed");
                self.status = StoreStatus::Error {
                    message,
                    at: OffsetDateTime::now_utc(),
                };
            }
        }
        true
    }

    fn subscribe_displayed_month(&mut self) {
        self.release_subscription();
        let Some(user) = self.user_id.clone() else {
            return;
        };
        self.generation += 1;
        let request = RangeSubscription::for_month(user, self.displayed_month, self.generation);
        self.subscription = Some(self.store.subscribe(request, self.events_tx.clone()));
    }

    fn release_subscription(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
        }
    }

    fn persist_selection(&mut self) -> bool {
        let Some(user) = self.user_id.clone() else {
            tracing::debug!("no identity; skipping write");
            return false;
        };
        let Some(entry) = self.selection.to_entry() else {
            tracing::debug!(date = %self.selection.date, "no pain level selected; skipping write");
            return false;
        };
        match self.store.put(&user, &entry) {
            Ok(()) => {
                tracing::debug!(date = %entry.date, level = %entry.pain_level, "entry written");
                true
            }
            Err(err) => {
                tracing::error!(?err, date = %entry.date, "failed to write entry");
                self.status = StoreStatus::Error {
                    message: format!("{err:#}"),
                    at: OffsetDateTime::now_utc(),
                };
                true
            }
        }
    }
}

impl<S: EntryStore + ?Sized> Drop for PainEntryController<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEntryStore;
    use anyhow::Result;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Subscribe { handle: u64, start: String, generation: Generation },
        Unsubscribe(u64),
        Put(Entry),
    }

    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryEntryStore,
        ops: Mutex<Vec<Op>>,
    }

    impl RecordingStore {
        fn ops(&self) -> Vec<Op> {
            self.ops.lock().clone()
        }

        fn puts(&self) -> Vec<Entry> {
            self.ops()
                .into_iter()
                .filter_map(|op| match op {
                    Op::Put(entry) => Some(entry),
                    _ => None,
                })
                .collect()
        }

        fn clear_ops(&self) {
            self.ops.lock().clear();
        }
    }

    impl EntryStore for RecordingStore {
        fn subscribe(
            &self,
            request: RangeSubscription,
            sink: Sender<StoreEvent>,
        ) -> SubscriptionHandle {
            let start = request.start.to_string();
            let generation = request.generation;
            let handle = self.inner.subscribe(request, sink);
            self.ops.lock().push(Op::Subscribe {
                handle: handle.id(),
                start,
                generation,
            });
            handle
        }

        fn unsubscribe(&self, handle: SubscriptionHandle) {
            self.ops.lock().push(Op::Unsubscribe(handle.id()));
            self.inner.unsubscribe(handle);
        }

        fn put(&self, user_id: &UserId, entry: &Entry) -> Result<()> {
            self.ops.lock().push(Op::Put(entry.clone()));
            self.inner.put(user_id, entry)
        }
    }

    const WINDOW: Duration = Duration::from_millis(1000);

    fn day(raw: &str) -> DateKey {
        DateKey::parse(raw).unwrap()
    }

    fn level(raw: u8) -> PainLevel {
        PainLevel::new(raw).unwrap()
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn options() -> ControllerOptions {
        ControllerOptions {
            notes_debounce: WINDOW,
            flush_on_close: true,
        }
    }

    fn controller_at(
        today: &str,
    ) -> (Arc<RecordingStore>, PainEntryController<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        let mut controller = PainEntryController::new(store.clone(), options(), day(today));
        controller.set_user(Some(alice()));
        controller.poll(Instant::now());
        (store, controller)
    }

    #[test]
    fn idle_without_identity() {
        let store = Arc::new(RecordingStore::default());
        let mut controller = PainEntryController::new(store.clone(), options(), day("2024-05-10"));
        let now = Instant::now();
        controller.set_pain_level(level(4));
        controller.set_notes("sore", now);
        controller.change_month(MonthRange::parse("2024-06").unwrap());
        controller.poll(now + WINDOW * 2);
        controller.close();

        assert!(store.ops().is_empty());
        assert_eq!(controller.status(), &StoreStatus::Idle);
        assert_eq!(controller.selection().notes, "sore");
    }

    #[test]
    fn identity_arrival_subscribes_and_seeds_selection() -> Result<()> {
        let store = Arc::new(RecordingStore::default());
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-05-10"), level(3), "morning"))?;
        let mut controller = PainEntryController::new(store.clone(), options(), day("2024-05-10"));
        assert_eq!(controller.selection().pain_level, Some(level(5)));

        controller.set_user(Some(alice()));
        assert_eq!(controller.selection().pain_level_raw(), -1);
        assert!(controller.poll(Instant::now()));

        assert_matches!(controller.status(), StoreStatus::Synced { .. });
        assert_eq!(controller.selection().pain_level, Some(level(3)));
        assert_eq!(controller.selection().notes, "morning");
        assert_matches!(
            store.ops().as_slice(),
            [Op::Subscribe { start, generation: 1, .. }] if start == "2024-05-01"
        );
        Ok(())
    }

    #[test]
    fn select_date_loads_cached_entry_or_resets() -> Result<()> {
        let (store, mut controller) = controller_at("2024-05-10");
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-05-03"), level(8), "flare"))?;
        controller.poll(Instant::now());

        controller.select_date(day("2024-05-03"));
        assert_eq!(
            controller.selection(),
            &SelectionState {
                date: day("2024-05-03"),
                pain_level: Some(level(8)),
                notes: "flare".into(),
            }
        );

        controller.select_date(day("2024-05-04"));
        assert_eq!(controller.selection().date, day("2024-05-04"));
        assert_eq!(controller.selection().pain_level_raw(), -1);
        assert_eq!(controller.selection().notes, "");
        Ok(())
    }

    #[test]
    fn pain_level_writes_immediately_with_current_notes() {
        let (store, mut controller) = controller_at("2024-05-10");
        store.clear_ops();
        controller.set_notes("stiff back", Instant::now());
        controller.set_pain_level(level(7));

        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-05-10"), level(7), "stiff back")]
        );
        assert!(!controller.has_pending_notes());
        assert_eq!(controller.selection().pain_level, Some(level(7)));
        // cache only follows the store
        assert!(controller.month_cache().is_empty());
        controller.poll(Instant::now());
        assert_eq!(
            controller.month_cache().get(&day("2024-05-10")).map(|e| e.pain_level),
            Some(level(7))
        );
    }

    #[test]
    fn rapid_notes_collapse_into_one_trailing_write() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(2));
        store.clear_ops();

        let start = Instant::now();
        for (step, text) in ["a", "ac", "ach", "achy", "achy knee"].iter().enumerate() {
            controller.set_notes(*text, start + Duration::from_millis(step as u64 * 150));
            controller.poll(start + Duration::from_millis(step as u64 * 150));
        }
        assert!(store.puts().is_empty());

        let last = start + Duration::from_millis(600);
        controller.poll(last + WINDOW);
        controller.poll(last + WINDOW * 5);
        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-05-10"), level(2), "achy knee")]
        );
    }

    #[test]
    fn notes_for_unlogged_day_are_not_written() {
        let (store, mut controller) = controller_at("2024-05-10");
        store.clear_ops();
        assert_eq!(controller.selection().pain_level, None);
        let now = Instant::now();
        controller.set_notes("no level yet", now);
        controller.poll(now + WINDOW);
        assert!(store.puts().is_empty());
        assert!(!controller.has_pending_notes());
    }

    #[test]
    fn changing_date_flushes_notes_to_previous_day() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(4));
        store.clear_ops();
        controller.set_notes("tired", Instant::now());
        controller.select_date(day("2024-05-11"));
        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-05-10"), level(4), "tired")]
        );
    }

    #[test]
    fn month_switch_releases_before_subscribing_and_drops_stale_snapshots() -> Result<()> {
        let (store, mut controller) = controller_at("2024-05-10");
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-06-02"), level(1), "june"))?;
        store.clear_ops();

        // queued for the May subscription but not yet drained
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-05-20"), level(9), "may"))?;
        controller.change_month(MonthRange::parse("2024-06")?);

        let ops = store.ops();
        assert_matches!(
            ops.as_slice(),
            [Op::Unsubscribe(old), Op::Subscribe { handle, start, generation: 2 }]
                if old != handle && start == "2024-06-01"
        );

        controller.poll(Instant::now());
        let days: Vec<String> = controller.month_cache().keys().map(ToString::to_string).collect();
        assert_eq!(days, vec!["2024-06-02"]);
        assert_eq!(store.inner.active_subscriptions(), 1);
        Ok(())
    }

    #[test]
    fn selecting_day_in_other_month_follows_and_reseeds() -> Result<()> {
        let (store, mut controller) = controller_at("2024-05-31");
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-06-01"), level(6), "new month"))?;

        controller.select_date(day("2024-06-01"));
        assert_eq!(controller.displayed_month(), MonthRange::parse("2024-06")?);
        assert_eq!(controller.selection().pain_level, None);

        controller.poll(Instant::now());
        assert_eq!(controller.selection().pain_level, Some(level(6)));
        assert_eq!(controller.selection().notes, "new month");
        Ok(())
    }

    #[test]
    fn delivery_error_keeps_cache_and_surfaces_status() -> Result<()> {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(3));
        controller.poll(Instant::now());
        assert_eq!(controller.month_cache().len(), 1);

        store.inner.set_offline(Some("connection reset"));
        controller.change_month(MonthRange::parse("2024-04")?);
        controller.poll(Instant::now());

        assert_matches!(
            controller.status(),
            StoreStatus::Error { message, .. } if message == "connection reset"
        );
        assert_eq!(controller.month_cache().len(), 1);
        Ok(())
    }

    #[test]
    fn failed_write_is_reported_not_retried() {
        let (store, mut controller) = controller_at("2024-05-10");
        store.inner.set_offline(Some("read-only"));
        store.clear_ops();
        controller.set_pain_level(level(5));
        controller.poll(Instant::now() + WINDOW * 3);

        assert_eq!(store.puts().len(), 1);
        assert_matches!(controller.status(), StoreStatus::Error { message, .. } if message.contains("read-only"));
    }

    #[test]
    fn close_flushes_pending_notes_and_releases_subscription() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(6));
        store.clear_ops();
        controller.set_notes("before bed", Instant::now());
        controller.close();
        controller.close();

        let ops = store.ops();
        assert_matches!(
            ops.as_slice(),
            [Op::Put(entry), Op::Unsubscribe(_)] if entry.notes == "before bed"
        );
        assert_eq!(store.inner.active_subscriptions(), 0);
    }

    #[test]
    fn close_can_drop_pending_notes() {
        let store = Arc::new(RecordingStore::default());
        let mut controller = PainEntryController::new(
            store.clone(),
            ControllerOptions {
                notes_debounce: WINDOW,
                flush_on_close: false,
            },
            day("2024-05-10"),
        );
        controller.set_user(Some(alice()));
        controller.set_pain_level(level(6));
        store.clear_ops();
        controller.set_notes("lost", Instant::now());
        drop(controller);

        assert!(store.puts().is_empty());
        assert_eq!(store.inner.active_subscriptions(), 0);
    }

    #[test]
    fn chart_points_follow_cache_order_with_labels() -> Result<()> {
        let (store, mut controller) = controller_at("2024-10-15");
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-10-09"), level(4), "b"))?;
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-10-02"), level(2), "a"))?;
        controller.poll(Instant::now());

        let points = controller.chart_points();
        let labels: Vec<&str> = points.iter().map(|p| p.date_name.as_str()).collect();
        assert_eq!(labels, vec!["Oct 2", "Oct 9"]);
        let json = serde_json::to_value(&points[0])?;
        assert_eq!(
            json,
            serde_json::json!({"date": "2024-10-02", "painLevel": 2, "notes": "a", "dateName": "Oct 2"})
        );
        Ok(())
    }

    #[test]
    fn selected_day_colour_tracks_working_level() {
        let (_store, mut controller) = controller_at("2024-05-10");
        assert_eq!(controller.color_for(day("2024-05-10")), PainColor::NoData);
        controller.set_pain_level(level(0));
        assert_eq!(controller.color_for(day("2024-05-10")), PainColor::Hue(120));
        assert_eq!(controller.color_for(day("2024-05-11")), PainColor::NoData);
    }

    #[test]
    fn selecting_in_new_month_before_its_snapshot_reseeds() -> Result<()> {
        let (store, mut controller) = controller_at("2024-05-10");
        store
            .inner
            .put(&alice(), &Entry::new(day("2024-06-01"), level(6), "keep me"))?;

        controller.change_month(MonthRange::parse("2024-06")?);
        controller.select_date(day("2024-06-01"));
        controller.poll(Instant::now());
        assert_eq!(
            controller.selection(),
            &SelectionState {
                date: day("2024-06-01"),
                pain_level: Some(level(6)),
                notes: "keep me".into(),
            }
        );
        assert_eq!(controller.color_for(day("2024-06-01")), PainColor::Hue(54));

        store.clear_ops();
        controller.set_pain_level(level(7));
        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-06-01"), level(7), "keep me")]
        );
        Ok(())
    }

    #[test]
    fn reselecting_current_day_keeps_unsaved_notes() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(3));
        controller.poll(Instant::now());
        store.clear_ops();

        let now = Instant::now();
        controller.set_notes("typed", now);
        controller.select_date(day("2024-05-10"));
        assert_eq!(controller.selection().notes, "typed");
        assert!(controller.has_pending_notes());

        controller.poll(now + WINDOW);
        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-05-10"), level(3), "typed")]
        );
    }

    #[test]
    fn switching_user_settles_notes_for_previous_user() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(4));
        controller.poll(Instant::now());
        assert_eq!(controller.month_cache().len(), 1);
        store.clear_ops();
        controller.set_notes("alice's notes", Instant::now());

        let bob = UserId::new("bob").unwrap();
        controller.set_user(Some(bob.clone()));

        let ops = store.ops();
        assert_matches!(
            ops.as_slice(),
            [Op::Put(entry), Op::Unsubscribe(old), Op::Subscribe { handle, generation: 2, .. }]
                if entry.notes == "alice's notes" && old != handle
        );
        let stored = store
            .inner
            .entry(&alice(), day("2024-05-10"))
            .expect("alice's entry");
        assert_eq!(stored.notes, "alice's notes");
        assert!(store.inner.entry(&bob, day("2024-05-10")).is_none());
        assert!(controller.month_cache().is_empty());
        assert_eq!(controller.status(), &StoreStatus::Idle);
        assert!(!controller.has_pending_notes());
        assert_eq!(store.inner.active_subscriptions(), 1);

        controller.poll(Instant::now());
        assert!(controller.month_cache().is_empty());
        assert_eq!(controller.selection().pain_level, None);
        assert_matches!(controller.status(), StoreStatus::Synced { .. });
    }

    #[test]
    fn clearing_user_returns_to_idle() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(2));
        store.clear_ops();

        controller.set_user(None);
        assert_matches!(store.ops().as_slice(), [Op::Unsubscribe(_)]);
        store.clear_ops();

        let now = Instant::now();
        controller.set_pain_level(level(8));
        controller.set_notes("offline", now);
        controller.select_date(day("2024-05-12"));
        controller.change_month(MonthRange::parse("2024-07").unwrap());
        controller.poll(now + WINDOW * 2);
        controller.close();

        assert!(store.ops().is_empty());
        assert_eq!(store.inner.active_subscriptions(), 0);
        assert_eq!(controller.status(), &StoreStatus::Idle);
    }

    #[test]
    fn manual_flush_writes_pending_notes_once() {
        let (store, mut controller) = controller_at("2024-05-10");
        controller.set_pain_level(level(5));
        store.clear_ops();
        assert!(!controller.flush_notes());

        let now = Instant::now();
        controller.set_notes("saved by hand", now);
        assert!(controller.flush_notes());
        assert!(!controller.flush_notes());
        controller.poll(now + WINDOW * 2);

        assert_eq!(
            store.puts(),
            vec![Entry::new(day("2024-05-10"), level(5), "saved by hand")]
        );
    }
}
