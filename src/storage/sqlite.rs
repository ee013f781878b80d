use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use super::{
    schema, EntryStore, RangeSubscription, StoreEvent, StorePayload, SubscriptionHandle,
    SubscriptionRegistry,
};
use crate::config::StorageOptions;
use crate::dates::DateKey;
use crate::model::{Entry, MonthEntryCache, PainLevel, UserId};

/// Entry store on a local SQLite database, one row per `users/{uid}/entries/{date}`.
#[derive(Clone)]
pub struct SqliteEntryStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
    registry: Arc<SubscriptionRegistry>,
}

impl SqliteEntryStore {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.registry.len()
    }

    pub fn fetch_range(
        &self,
        user_id: &UserId,
        start: DateKey,
        end: DateKey,
    ) -> Result<MonthEntryCache> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, pain_level, notes
                 FROM entries
                 WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
                 ORDER BY date",
            )?;
            let rows = stmt
                .query_map(
                    params![user_id.as_str(), start.to_string(), end.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )?
                .collect::<Result<Vec<_>, _>>()
                .context("querying entries for range")?;

            let mut entries = MonthEntryCache::new();
            for (raw_date, raw_level, notes) in rows {
                match decode_entry(&raw_date, raw_level, notes) {
                    Ok(entry) => {
                        entries.insert(entry.date, entry);
                    }
                    Err(err) => {
                        tracing::warn!(?err, user = %user_id, date = %raw_date, "skipping malformed entry row");
                    }
                }
            }
            Ok(entries)
        })
    }

    pub fn fetch_entry(&self, user_id: &UserId, date: DateKey) -> Result<Option<Entry>> {
        self.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT date, pain_level, notes FROM entries WHERE user_id = ?1 AND date = ?2",
                    params![user_id.as_str(), date.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .context("querying entry")?;
            row.map(|(raw_date, raw_level, notes)| decode_entry(&raw_date, raw_level, notes))
                .transpose()
        })
    }

    fn upsert(&self, user_id: &UserId, entry: &Entry) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO entries (user_id, date, pain_level, notes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, date) DO UPDATE SET
                     pain_level = excluded.pain_level,
                     notes = excluded.notes,
                     updated_at = excluded.updated_at",
                params![
                    user_id.as_str(),
                    entry.date.to_string(),
                    i64::from(entry.pain_level),
                    entry.notes,
                    now
                ],
            )
            .context("upserting entry")?;
            Ok(())
        })
    }

    fn snapshot_payload(&self, request: &RangeSubscription) -> StorePayload {
        match self.fetch_range(&request.user_id, request.start, request.end) {
            Ok(entries) => StorePayload::Snapshot(entries),
            Err(err) => StorePayload::Error(format!("{err:#}")),
        }
    }
}

impl EntryStore for SqliteEntryStore {
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
        self.upsert(user_id, entry)?;
        tracing::debug!(user = %user_id, date = %entry.date, level = %entry.pain_level, "entry stored");
        self.registry
            .notify(user_id, entry.date, |request| self.snapshot_payload(request));
        Ok(())
    }
}

fn decode_entry(raw_date: &str, raw_level: i64, notes: String) -> Result<Entry> {
    let date = DateKey::parse(raw_date)?;
    let pain_level = PainLevel::try_from(raw_level)?;
    Ok(Entry {
        date,
        notes,
        pain_level,
    })
}

pub fn init(options: &StorageOptions) -> Result<SqliteEntryStore> {
    let db_path = &options.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, options)?;
    schema::apply(&conn)?;
    Ok(SqliteEntryStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(options.clone()),
        registry: Arc::new(SubscriptionRegistry::default()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
