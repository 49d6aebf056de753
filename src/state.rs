//! Shared domain types and the backend bundle.
//!
//! DESIGN
//! ======
//! `Backend` is the bundle of collaborator handles a room session needs: the
//! row store, the pub/sub hub and the identity service. Clone is cheap; all
//! fields are `Arc`-wrapped trait objects so tests can swap in fakes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{Identity, PubSub, RowStore};
use crate::render::Snapshot;

// =============================================================================
// GEOMETRY
// =============================================================================

/// A point in surface or viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate a viewport point into the space whose top-left is `origin`.
    #[must_use]
    pub fn relative_to(self, origin: Point) -> Point {
        Point { x: self.x - origin.x, y: self.y - origin.y }
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// A shared drawing session. Mirrors the `rooms` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    /// Milliseconds since Unix epoch.
    pub created_at: i64,
    pub owner: Uuid,
    pub is_public: bool,
    /// Last persisted canvas snapshot, if anyone has drawn yet.
    #[serde(default)]
    pub drawing: Option<Snapshot>,
}

// =============================================================================
// CURSORS
// =============================================================================

/// Ephemeral pointer position of one peer. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub user_id: Uuid,
    pub x: f64,
    pub y: f64,
}

impl CursorState {
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// =============================================================================
// PEN
// =============================================================================

pub const DEFAULT_PEN_SIZE: f64 = 5.0;
pub const DEFAULT_PEN_COLOR: &str = "#000000";

/// Local stroke style. Never transmitted.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingPen {
    /// Line width in surface pixels.
    pub size: f64,
    /// CSS hex color (`#rgb`, `#rrggbb` or `#rrggbbaa`).
    pub color: String,
}

impl Default for DrawingPen {
    fn default() -> Self {
        Self { size: DEFAULT_PEN_SIZE, color: DEFAULT_PEN_COLOR.to_owned() }
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Free-form profile attributes. Only the display color is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(rename = "userColor", default, skip_serializing_if = "Option::is_none")]
    pub user_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The authenticated local user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub metadata: UserMetadata,
}

/// A peer's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub metadata: UserMetadata,
}

// =============================================================================
// BACKEND
// =============================================================================

/// Collaborator handles shared by every room session.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn RowStore>,
    pub pubsub: Arc<dyn PubSub>,
    pub identity: Arc<dyn Identity>,
}

impl Backend {
    #[must_use]
    pub fn new(store: Arc<dyn RowStore>, pubsub: Arc<dyn PubSub>, identity: Arc<dyn Identity>) -> Self {
        Self { store, pubsub, identity }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
