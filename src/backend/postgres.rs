//! Postgres-backed row store and profile directory.
//!
//! DESIGN
//! ======
//! Only the `rooms` table is exposed through the generic row API. Rows
//! travel as JSONB (`to_jsonb` out, `jsonb_populate_record` in) so the
//! record shape matches the in-memory store exactly. Column names are
//! checked against a whitelist before they are spliced into SQL; values
//! are always bound.
//!
//! Change notifications ride on `LISTEN rooms_changed`. The trigger only
//! sends the row id because NOTIFY payloads are capped at 8000 bytes and a
//! canvas snapshot is far larger; the listener re-reads the row before
//! forwarding it.

use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BackendError, Change, Filter, Identity, ROOMS_TABLE, Record, RowStore};
use crate::frame::now_ms;
use crate::state::{Profile, SessionUser, UserMetadata};

pub const ROOMS_NOTIFY_CHANNEL: &str = "rooms_changed";

const ROOM_COLUMNS: &[&str] = &["id", "name", "created_at", "owner", "is_public", "drawing"];

// =============================================================================
// HELPERS
// =============================================================================

fn check_table(table: &str) -> Result<(), BackendError> {
    if table == ROOMS_TABLE {
        Ok(())
    } else {
        Err(BackendError::UnknownTable(table.to_owned()))
    }
}

fn check_column(column: &str) -> Result<&'static str, BackendError> {
    ROOM_COLUMNS
        .iter()
        .find(|c| **c == column)
        .copied()
        .ok_or_else(|| BackendError::UnknownColumn(column.to_owned()))
}

/// Append `WHERE ...` and `ORDER BY ...` for `filter` to a query over alias `r`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) -> Result<(), BackendError> {
    for (i, (column, value)) in filter.eq.iter().enumerate() {
        let column = check_column(column)?;
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        builder.push(format!("to_jsonb(r.{column}) = "));
        builder.push_bind(value.clone());
    }
    if let Some(order) = &filter.order {
        let column = check_column(&order.column)?;
        let dir = if order.ascending { "ASC" } else { "DESC" };
        builder.push(format!(" ORDER BY r.{column} {dir}"));
    }
    Ok(())
}

fn into_record(value: Value) -> Result<Record, BackendError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidRecord(serde::de::Error::custom(format!(
            "expected row object, got {other}"
        )))),
    }
}

// =============================================================================
// ROW STORE
// =============================================================================

/// Row store over the `rooms` table.
#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
    capacity: usize,
}

impl PgRowStore {
    #[must_use]
    pub fn new(pool: PgPool, capacity: usize) -> Self {
        Self { pool, capacity: capacity.max(1) }
    }
}

#[async_trait::async_trait]
impl RowStore for PgRowStore {
    async fn insert(&self, table: &str, mut record: Record) -> Result<Vec<Record>, BackendError> {
        check_table(table)?;
        for column in record.keys() {
            check_column(column)?;
        }
        record
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        record
            .entry("created_at")
            .or_insert_with(|| Value::from(now_ms()));

        let row: (Value,) = sqlx::query_as(
            "INSERT INTO rooms (id, name, created_at, owner, is_public, drawing)
             SELECT p.id, p.name, p.created_at, p.owner, COALESCE(p.is_public, false), p.drawing
             FROM jsonb_populate_record(NULL::rooms, $1) AS p
             RETURNING to_jsonb(rooms.*)",
        )
        .bind(Value::Object(record))
        .fetch_one(&self.pool)
        .await?;

        Ok(vec![into_record(row.0)?])
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        check_table(table)?;
        let mut builder = QueryBuilder::new("SELECT to_jsonb(r.*) FROM rooms r");
        push_filter(&mut builder, filter)?;

        let rows = builder
            .build_query_as::<(Value,)>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|(v,)| into_record(v)).collect()
    }

    async fn update(&self, table: &str, patch: Record, filter: &Filter) -> Result<(), BackendError> {
        check_table(table)?;
        if patch.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::new("UPDATE rooms AS r SET ");
        {
            let mut sets = builder.separated(", ");
            for column in patch.keys() {
                let column = check_column(column)?;
                sets.push(format!("{column} = p.{column}"));
            }
        }
        builder.push(" FROM jsonb_populate_record(NULL::rooms, ");
        builder.push_bind(Value::Object(patch));
        builder.push(") AS p");
        push_filter(&mut builder, &Filter { eq: filter.eq.clone(), order: None })?;

        let result = builder.build().execute(&self.pool).await?;
        debug!(rows = result.rows_affected(), "rooms updated");
        Ok(())
    }

    async fn subscribe(&self, table: &str, filter: Filter) -> Result<mpsc::Receiver<Change>, BackendError> {
        check_table(table)?;
        for column in filter.columns() {
            check_column(column)?;
        }

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(ROOMS_NOTIFY_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(self.capacity);
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    () = tx.closed() => break,
                    n = listener.recv() => n,
                };
                let notification = match notification {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "rooms change listener failed");
                        break;
                    }
                };
                let Ok(id) = Uuid::parse_str(notification.payload()) else {
                    warn!(payload = notification.payload(), "ignoring malformed rooms notification");
                    continue;
                };

                // PHASE: RE-READ CHANGED ROW
                // NOTIFY carries only the id; fetch the full row before filtering.
                let rows = match store
                    .select(ROOMS_TABLE, &Filter::new().eq("id", id.to_string()))
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, %id, "failed to load changed room");
                        continue;
                    }
                };
                for row in rows.into_iter().filter(|r| filter.matches(r)) {
                    if tx
                        .send(Change { table: ROOMS_TABLE.to_owned(), new_record: row })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

// =============================================================================
// PROFILE DIRECTORY
// =============================================================================

/// Identity backed by the `users` table. The session user is fixed at
/// construction (it comes from configuration, not from a login flow).
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
    session_user: Option<Uuid>,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: PgPool, session_user: Option<Uuid>) -> Self {
        Self { pool, session_user }
    }

    async fn fetch_metadata(&self, user_id: Uuid) -> Result<Option<UserMetadata>, BackendError> {
        let row = sqlx::query_as::<_, (String, Option<String>)>("SELECT name, color FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(name, color)| UserMetadata { user_color: color, name: Some(name) }))
    }
}

#[async_trait::async_trait]
impl Identity for PgDirectory {
    async fn get_session(&self) -> Result<Option<SessionUser>, BackendError> {
        let Some(user_id) = self.session_user else {
            return Ok(None);
        };
        let metadata = self.fetch_metadata(user_id).await?.unwrap_or_default();
        Ok(Some(SessionUser { user_id, metadata }))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        let metadata = self
            .fetch_metadata(user_id)
            .await?
            .ok_or(BackendError::ProfileNotFound(user_id))?;
        Ok(Profile { id: user_id, metadata })
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
