//! In-process collaborators: row store, pub/sub hub, identity directory.
//!
//! DESIGN
//! ======
//! These mirror the hosted backend closely enough for sessions to run
//! unmodified: inserts fill in `id`/`created_at` like column defaults would,
//! updates notify matching subscribers with the full new row, and the hub
//! fans frames out with `try_send` so a slow subscriber drops messages
//! instead of stalling publishers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{BackendError, ChannelHandle, Change, Filter, Identity, PubSub, Record, RowStore};
use crate::frame::{Frame, now_ms};
use crate::state::{Profile, SessionUser};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// ROW STORE
// =============================================================================

struct Watcher {
    table: String,
    filter: Filter,
    tx: mpsc::Sender<Change>,
}

#[derive(Default)]
struct StoreInner {
    tables: HashMap<String, Vec<Record>>,
    watchers: Vec<Watcher>,
}

/// Row store kept entirely in memory.
pub struct MemoryRowStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
}

impl MemoryRowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Store whose change subscriptions buffer at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Mutex::new(StoreInner::default()), capacity: capacity.max(1) }
    }

    /// Number of rows currently in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.tables.get(table).map_or(0, Vec::len)
    }
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn notify(watchers: &mut Vec<Watcher>, table: &str, record: &Record) {
    watchers.retain(|w| !w.tx.is_closed());
    for watcher in watchers.iter() {
        if watcher.table != table || !watcher.filter.matches(record) {
            continue;
        }
        // Best-effort: a full subscriber misses this change.
        let _ = watcher
            .tx
            .try_send(Change { table: table.to_owned(), new_record: record.clone() });
    }
}

#[async_trait::async_trait]
impl RowStore for MemoryRowStore {
    async fn insert(&self, table: &str, mut record: Record) -> Result<Vec<Record>, BackendError> {
        record
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        record
            .entry("created_at")
            .or_insert_with(|| Value::from(now_ms()));

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .tables
            .entry(table.to_owned())
            .or_default()
            .push(record.clone());
        notify(&mut inner.watchers, table, &record);
        Ok(vec![record])
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<Record> = inner
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        filter.sort(&mut rows);
        Ok(rows)
    }

    async fn update(&self, table: &str, patch: Record, filter: &Filter) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let StoreInner { tables, watchers } = &mut *inner;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(());
        };
        for row in rows.iter_mut().filter(|r| filter.matches(r)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            notify(watchers, table, row);
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str, filter: Filter) -> Result<mpsc::Receiver<Change>, BackendError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.watchers.push(Watcher { table: table.to_owned(), filter, tx });
        Ok(rx)
    }
}

// =============================================================================
// PUB/SUB HUB
// =============================================================================

struct Subscriber {
    handle_id: Uuid,
    event: String,
    tx: mpsc::Sender<Frame>,
}

#[derive(Default)]
struct HubInner {
    channels: Mutex<HashMap<String, Vec<Subscriber>>>,
}

/// Process-local broadcast hub. Clones share the same channels.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
    capacity: usize,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Hub whose subscribers buffer at most `capacity` frames.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Arc::new(HubInner::default()), capacity: capacity.max(1) }
    }

    /// Live subscriptions on `channel_key`.
    pub fn subscriber_count(&self, channel_key: &str) -> usize {
        let channels = self
            .inner
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels.get(channel_key).map_or(0, Vec::len)
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PubSub for MemoryHub {
    async fn open(&self, channel_key: &str) -> Result<Arc<dyn ChannelHandle>, BackendError> {
        Ok(Arc::new(MemoryChannel {
            id: Uuid::new_v4(),
            key: channel_key.to_owned(),
            hub: self.inner.clone(),
            capacity: self.capacity,
            open: AtomicBool::new(true),
        }))
    }
}

/// A handle on one hub channel.
pub struct MemoryChannel {
    id: Uuid,
    key: String,
    hub: Arc<HubInner>,
    capacity: usize,
    open: AtomicBool,
}

impl ChannelHandle for MemoryChannel {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn publish(&self, event: &str, payload: Value) -> Result<(), BackendError> {
        if !self.is_open() {
            return Err(BackendError::ChannelClosed(self.key.clone()));
        }
        let frame = Frame::broadcast(event, payload)
            .with_channel(self.key.clone())
            .with_from(self.id);

        let mut channels = self.hub.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = channels.get_mut(&self.key) else {
            return Ok(());
        };
        subscribers.retain(|s| !s.tx.is_closed());
        for sub in subscribers.iter() {
            if sub.handle_id == self.id || !frame.matches(&sub.event) {
                continue;
            }
            // Best-effort: if a subscriber's queue is full, skip it.
            let _ = sub.tx.try_send(frame.clone());
        }
        Ok(())
    }

    fn subscribe(&self, event: &str) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if !self.is_open() {
            return rx;
        }
        let mut channels = self.hub.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(self.key.clone())
            .or_default()
            .push(Subscriber { handle_id: self.id, event: event.to_owned(), tx });
        rx
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        let mut channels = self.hub.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = channels.get_mut(&self.key) {
            subscribers.retain(|s| s.handle_id != self.id);
            if subscribers.is_empty() {
                channels.remove(&self.key);
            }
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Fixed session plus a profile directory.
#[derive(Default)]
pub struct MemoryIdentity {
    session: Option<SessionUser>,
    profiles: HashMap<Uuid, Profile>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(mut self, user: SessionUser) -> Self {
        self.session = Some(user);
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.id, profile);
        self
    }
}

#[async_trait::async_trait]
impl Identity for MemoryIdentity {
    async fn get_session(&self) -> Result<Option<SessionUser>, BackendError> {
        Ok(self.session.clone())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        self.profiles
            .get(&user_id)
            .cloned()
            .ok_or(BackendError::ProfileNotFound(user_id))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
