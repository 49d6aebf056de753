//! Room service — create, list, fetch, snapshot update, entry gate.
//!
//! DESIGN
//! ======
//! Rooms live in the `rooms` table of whatever row store the backend
//! provides. Every operation is a thin translation between `Room` and the
//! row store's flat records; ordering is always newest first.

use serde_json::{Value, json};
use uuid::Uuid;

use crate::backend::{BackendError, Filter, ROOMS_TABLE, Record, RowStore};
use crate::render::Snapshot;
use crate::state::Room;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(Uuid),
    #[error("insert returned no rows")]
    EmptyInsert,
    #[error("malformed room row: {0}")]
    InvalidRow(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn room_from_record(record: Record) -> Result<Room, RoomError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

fn rooms_from_records(records: Vec<Record>) -> Result<Vec<Room>, RoomError> {
    records.into_iter().map(room_from_record).collect()
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a new room owned by `owner`. New rooms start with no drawing.
///
/// # Errors
///
/// Returns a backend error if the insert fails.
pub async fn create_room(store: &dyn RowStore, name: &str, owner: Uuid, is_public: bool) -> Result<Room, RoomError> {
    let mut record = Record::new();
    record.insert("name".into(), json!(name));
    record.insert("owner".into(), json!(owner));
    record.insert("is_public".into(), json!(is_public));
    record.insert("drawing".into(), Value::Null);

    let rows = store.insert(ROOMS_TABLE, record).await?;
    let row = rows.into_iter().next().ok_or(RoomError::EmptyInsert)?;
    room_from_record(row)
}

/// List every room, newest first.
///
/// # Errors
///
/// Returns a backend error if the query fails.
pub async fn list_rooms(store: &dyn RowStore) -> Result<Vec<Room>, RoomError> {
    let rows = store
        .select(ROOMS_TABLE, &Filter::new().order("created_at", false))
        .await?;
    rooms_from_records(rows)
}

/// List the rooms owned by `owner`, newest first.
///
/// # Errors
///
/// Returns a backend error if the query fails.
pub async fn list_user_rooms(store: &dyn RowStore, owner: Uuid) -> Result<Vec<Room>, RoomError> {
    let filter = Filter::new()
        .eq("owner", owner.to_string())
        .order("created_at", false);
    rooms_from_records(store.select(ROOMS_TABLE, &filter).await?)
}

/// Fetch one room by id.
///
/// # Errors
///
/// Returns `NotFound` if no row matches.
pub async fn fetch_room(store: &dyn RowStore, room_id: Uuid) -> Result<Room, RoomError> {
    let rows = store
        .select(ROOMS_TABLE, &Filter::new().eq("id", room_id.to_string()))
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or(RoomError::NotFound(room_id))?;
    room_from_record(row)
}

/// Overwrite the room's persisted drawing with `snapshot`.
///
/// # Errors
///
/// Returns a backend error if the update fails.
pub async fn update_room_drawing(store: &dyn RowStore, room_id: Uuid, snapshot: &Snapshot) -> Result<(), RoomError> {
    let mut patch = Record::new();
    patch.insert("drawing".into(), Value::String(snapshot.as_str().to_owned()));
    store
        .update(ROOMS_TABLE, patch, &Filter::new().eq("id", room_id.to_string()))
        .await?;
    Ok(())
}

// =============================================================================
// ACCESS
// =============================================================================

/// A viewer may enter a public room, or any room they own.
#[must_use]
pub fn can_enter(room: &Room, viewer: Option<Uuid>) -> bool {
    room.is_public || viewer == Some(room.owner)
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
