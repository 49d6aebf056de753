//! Room session — everything a viewer owns while a room is on screen.
//!
//! ARCHITECTURE
//! ============
//! `enter` resolves the viewer, fetches the room and applies the entry
//! gate before any drawing state exists. Past the gate it builds the
//! canvas sync (loading the stored snapshot) and, for signed-in viewers,
//! the cursor channel and the room's change subscription. Pointer events
//! fan out to both components independently.
//!
//! LIFECYCLE
//! =========
//! Every background task (subscription pumps, profile lookups, debounce
//! timers, snapshot writes) runs inside the session's `SessionScope`.
//! `leave` (or drop) cancels the scope, removes every marker and closes
//! the channel. Completion work that had not run yet never runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, Filter, ROOMS_TABLE};
use crate::frame::CURSOR_EVENT;
use crate::render::RenderTarget;
use crate::scope::SessionScope;
use crate::services::canvas::{CanvasSync, DEFAULT_QUIET_INTERVAL};
use crate::services::cursor::CursorBroadcaster;
use crate::services::room::{self, RoomError};
use crate::state::{Backend, DrawingPen, Point, Room, SessionUser};

/// Where a denied viewer is sent.
pub const ACCESS_DENIED_REDIRECT: &str = "/";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("access to room {room_id} denied")]
    AccessDenied { room_id: Uuid, redirect: &'static str },
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-session tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Debounce interval before a snapshot write.
    pub quiet_interval: Duration,
    /// Top-left of the drawing surface in client coordinates.
    pub origin: Point,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { quiet_interval: DEFAULT_QUIET_INTERVAL, origin: Point::default() }
    }
}

/// One viewer inside one room.
pub struct RoomSession {
    room: Room,
    user: Option<SessionUser>,
    scope: SessionScope,
    canvas: CanvasSync,
    cursor: CursorBroadcaster,
    closed: bool,
}

// =============================================================================
// ENTER
// =============================================================================

impl RoomSession {
    /// Enter `room_id`, drawing onto `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AccessDenied`] when the viewer may not see the
    /// room (nothing has been rendered), [`SessionError::Room`] when the room
    /// does not exist, and [`SessionError::Backend`] when the channel or
    /// change subscription cannot be opened.
    pub async fn enter(
        backend: &Backend,
        room_id: Uuid,
        target: Arc<dyn RenderTarget>,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        // PHASE: RESOLVE VIEWER
        let user = match backend.identity.get_session().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, %room_id, "session lookup failed; continuing unauthenticated");
                None
            }
        };
        let viewer = user.as_ref().map(|u| u.user_id);

        // PHASE: ENTRY GATE
        let room = room::fetch_room(backend.store.as_ref(), room_id).await?;
        if !room::can_enter(&room, viewer) {
            info!(%room_id, viewer = ?viewer, "room entry denied");
            return Err(SessionError::AccessDenied { room_id, redirect: ACCESS_DENIED_REDIRECT });
        }

        // PHASE: CANVAS
        let scope = SessionScope::new();
        let canvas = CanvasSync::new(room.id, target.clone(), backend.store.clone(), scope.clone(), options.quiet_interval);
        canvas.set_origin(options.origin);
        canvas.load(room.drawing.as_ref());

        let cursor = CursorBroadcaster::new(viewer, backend.identity.clone(), target, scope.clone());
        cursor.set_origin(options.origin);

        // PHASE: REALTIME
        // Only signed-in viewers join the channel and watch for remote writes.
        if viewer.is_some()
            && let Err(e) = connect(backend, &room, &canvas, &cursor).await
        {
            scope.cancel();
            cursor.clear();
            return Err(e.into());
        }

        info!(%room_id, authenticated = viewer.is_some(), has_drawing = room.drawing.is_some(), "entered room");
        Ok(Self { room, user, scope, canvas, cursor, closed: false })
    }
}

async fn connect(
    backend: &Backend,
    room: &Room,
    canvas: &CanvasSync,
    cursor: &CursorBroadcaster,
) -> Result<(), BackendError> {
    let key = room.id.to_string();
    let channel = backend.pubsub.open(&key).await?;
    cursor.spawn_listener(channel.subscribe(CURSOR_EVENT));
    cursor.attach_channel(channel);

    let changes = backend
        .store
        .subscribe(ROOMS_TABLE, Filter::new().eq("id", key))
        .await?;
    canvas.spawn_remote_listener(changes);
    Ok(())
}

// =============================================================================
// OPERATIONS
// =============================================================================

impl RoomSession {
    #[must_use]
    pub fn room(&self) -> &Room {
        &self.room
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn canvas(&self) -> &CanvasSync {
        &self.canvas
    }

    #[must_use]
    pub fn cursor(&self) -> &CursorBroadcaster {
        &self.cursor
    }

    /// Broadcast the cursor and extend the active stroke.
    pub fn pointer_move(&self, client: Point) {
        self.cursor.on_local_pointer_move(client);
        self.canvas.pointer_move(client);
    }

    pub fn pointer_down(&self, client: Point) {
        self.canvas.pointer_down(client);
    }

    pub fn pointer_up(&self) {
        self.canvas.pointer_up();
    }

    pub fn set_pen(&self, pen: DrawingPen) {
        self.canvas.set_pen(pen);
    }

    /// The surface moved within the viewport (scroll, resize).
    pub fn set_surface_origin(&self, origin: Point) {
        self.canvas.set_origin(origin);
        self.cursor.set_origin(origin);
    }

    /// Leave the room, abandoning all outstanding work.
    pub fn leave(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.scope.cancel();
        self.canvas.cancel_pending();
        self.cursor.clear();
        info!(room_id = %self.room.id, "left room");
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
