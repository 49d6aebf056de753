//! Collaborator contracts: row store, pub/sub channel, identity.
//!
//! ARCHITECTURE
//! ============
//! Room sessions only ever talk to these traits. `memory` provides
//! in-process implementations used by tests and the demo; `postgres`
//! provides the row store and profile directory on top of sqlx.
//!
//! DESIGN
//! ======
//! - Records are flat JSON objects, the same shape a hosted row API returns.
//! - Filters are conjunctions of equality clauses with an optional ordering.
//! - Channel publish is synchronous and best-effort; delivery is
//!   at-most-once with no ordering guarantee across senders.

pub mod memory;
pub mod postgres;

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{Profile, SessionUser};

// =============================================================================
// TYPES
// =============================================================================

/// Table holding one row per drawing room.
pub const ROOMS_TABLE: &str = "rooms";

/// One row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(Uuid),
    #[error("channel closed: {0}")]
    ChannelClosed(String),
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Change notification for a row that was inserted or updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub table: String,
    pub new_record: Record,
}

/// Ordering clause for `select`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row filter: every `eq` clause must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
    pub order: Option<Order>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order { column: column.into(), ascending });
        self
    }

    /// Whether `record` satisfies every equality clause.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.eq
            .iter()
            .all(|(column, value)| record.get(column) == Some(value))
    }

    /// Sort `records` by the ordering clause, if any.
    pub fn sort(&self, records: &mut [Record]) {
        let Some(order) = &self.order else {
            return;
        };
        records.sort_by(|a, b| {
            let ord = compare_values(a.get(&order.column), b.get(&order.column));
            if order.ascending { ord } else { ord.reverse() }
        });
    }

    /// Every column this filter references.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.eq
            .iter()
            .map(|(column, _)| column.as_str())
            .chain(self.order.iter().map(|o| o.column.as_str()))
    }
}

/// Total order over JSON scalars: missing/null first, then numbers, strings, bools.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

// =============================================================================
// ROW STORE
// =============================================================================

/// Request/response row storage with change notifications.
#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    /// Insert a record and return the stored rows.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the table is unknown or the write fails.
    async fn insert(&self, table: &str, record: Record) -> Result<Vec<Record>, BackendError>;

    /// Return every row matching `filter`, in the filter's order.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the table is unknown or the read fails.
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>, BackendError>;

    /// Merge `patch` into every row matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the table is unknown or the write fails.
    async fn update(&self, table: &str, patch: Record, filter: &Filter) -> Result<(), BackendError>;

    /// Stream changes to rows of `table` matching `filter`. The stream ends
    /// when the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the subscription cannot be established.
    async fn subscribe(&self, table: &str, filter: Filter) -> Result<mpsc::Receiver<Change>, BackendError>;
}

// =============================================================================
// PUB/SUB
// =============================================================================

/// Opens channels keyed by an arbitrary string (the room id).
#[async_trait::async_trait]
pub trait PubSub: Send + Sync {
    /// Open a new handle on `channel_key`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the channel cannot be joined.
    async fn open(&self, channel_key: &str) -> Result<Arc<dyn ChannelHandle>, BackendError>;
}

/// One participant's connection to a channel.
pub trait ChannelHandle: Send + Sync {
    /// Unique id of this handle; stamped into `Frame::from`.
    fn id(&self) -> Uuid;

    /// Whether the handle can still publish.
    fn is_open(&self) -> bool;

    /// Fan `payload` out to every other subscriber of `event`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ChannelClosed`] once the handle is closed.
    fn publish(&self, event: &str, payload: Value) -> Result<(), BackendError>;

    /// Receive frames for `event` published by other handles.
    fn subscribe(&self, event: &str) -> mpsc::Receiver<Frame>;

    /// Leave the channel. Outstanding receivers see end-of-stream.
    fn close(&self);
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Session and profile lookups.
#[async_trait::async_trait]
pub trait Identity: Send + Sync {
    /// The signed-in local user, or `None` when unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the session lookup itself fails.
    async fn get_session(&self) -> Result<Option<SessionUser>, BackendError>;

    /// A peer's profile.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ProfileNotFound`] for unknown ids.
    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, BackendError>;
}
