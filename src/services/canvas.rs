//! Canvas sync — local freehand strokes with debounced snapshot persistence.
//!
//! DESIGN
//! ======
//! Strokes are drawn on the render target immediately. Persistence is a
//! trailing debounce: every drawn segment re-arms the timer, and only when
//! the pointer has been still for a full quiet interval is the whole
//! surface encoded and written to the room row. A continuous stroke defers
//! every write until motion pauses.
//!
//! ERROR HANDLING
//! ==============
//! Writes are fire-and-forget. A failed encode or update is logged and
//! dropped; the next pause writes the full surface again anyway. Snapshots
//! that fail to decode (on load or from a remote change) leave the current
//! surface untouched.
//!
//! TRADE-OFFS
//! ==========
//! Remote snapshots replace local content outright. A peer's write that
//! lands mid-stroke wipes the in-progress stroke; the next pause persists
//! whatever is on screen. Last writer wins, nothing is merged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{Change, RowStore};
use crate::render::{Bitmap, RenderTarget, Snapshot};
use crate::scope::SessionScope;
use crate::services::room;
use crate::state::{DrawingPen, Point};
use crate::timer::Debouncer;

/// Default quiet interval before a snapshot write.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(1000);

// =============================================================================
// TYPES
// =============================================================================

/// Pointer gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Idle,
    Drawing,
}

struct CanvasState {
    gesture: Gesture,
    /// Previous pointer sample in surface coordinates.
    last_sample: Option<Point>,
    origin: Point,
    pen: DrawingPen,
    timer: Debouncer,
}

struct CanvasInner {
    room_id: Uuid,
    target: Arc<dyn RenderTarget>,
    store: Arc<dyn RowStore>,
    scope: SessionScope,
    state: Mutex<CanvasState>,
    /// Data URL of our most recent write, used to skip its change echo.
    /// Cleared once any other snapshot is applied.
    last_written: Mutex<Option<Snapshot>>,
}

/// Per-session canvas sync. Clones share state.
#[derive(Clone)]
pub struct CanvasSync {
    inner: Arc<CanvasInner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CanvasSync {
    #[must_use]
    pub fn new(
        room_id: Uuid,
        target: Arc<dyn RenderTarget>,
        store: Arc<dyn RowStore>,
        scope: SessionScope,
        quiet_interval: Duration,
    ) -> Self {
        let pen = DrawingPen::default();
        target.set_pen(&pen);
        Self {
            inner: Arc::new(CanvasInner {
                room_id,
                target,
                store,
                scope,
                state: Mutex::new(CanvasState {
                    gesture: Gesture::Idle,
                    last_sample: None,
                    origin: Point::default(),
                    pen,
                    timer: Debouncer::new(quiet_interval),
                }),
                last_written: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // LOAD
    // =========================================================================

    /// Draw the room's stored snapshot, if any.
    ///
    /// Returns `false` if a snapshot was present but could not be decoded;
    /// the surface is left blank in that case.
    pub fn load(&self, stored: Option<&Snapshot>) -> bool {
        let Some(snapshot) = stored else {
            return true;
        };
        match snapshot.decode() {
            Ok(bitmap) => {
                self.inner.target.restore(&bitmap);
                debug!(room_id = %self.inner.room_id, "stored snapshot loaded");
                true
            }
            Err(e) => {
                warn!(error = %e, room_id = %self.inner.room_id, "stored snapshot unreadable; starting blank");
                false
            }
        }
    }

    /// Replace the surface with a snapshot received from another participant.
    pub fn apply_snapshot(&self, snapshot: &Snapshot) {
        {
            let mut last_written = lock(&self.inner.last_written);
            if last_written.as_ref() == Some(snapshot) {
                return;
            }
            // Any echo of our own write that arrives after this one is newer.
            *last_written = None;
        }
        match snapshot.decode() {
            Ok(bitmap) => {
                self.inner.target.restore(&bitmap);
                debug!(room_id = %self.inner.room_id, "remote snapshot applied");
            }
            Err(e) => warn!(error = %e, room_id = %self.inner.room_id, "remote snapshot unreadable; keeping canvas"),
        }
    }

    /// Pump row changes for this room until the stream ends or the scope is cancelled.
    pub fn spawn_remote_listener(&self, mut rx: mpsc::Receiver<Change>) {
        let this = self.clone();
        self.inner.scope.spawn(async move {
            while let Some(change) = rx.recv().await {
                match change.new_record.get("drawing") {
                    Some(Value::String(url)) => this.apply_snapshot(&Snapshot::from_data_url(url.clone())),
                    _ => debug!(room_id = %this.inner.room_id, "room change without drawing"),
                }
            }
        });
    }

    // =========================================================================
    // GESTURES
    // =========================================================================

    /// Begin a stroke at `client`.
    pub fn pointer_down(&self, client: Point) {
        let mut state = lock(&self.inner.state);
        state.gesture = Gesture::Drawing;
        state.last_sample = Some(client.relative_to(state.origin));
    }

    /// Track the pointer; while drawing, stroke from the previous sample and
    /// re-arm the snapshot timer.
    pub fn pointer_move(&self, client: Point) {
        let mut state = lock(&self.inner.state);
        let current = client.relative_to(state.origin);
        let previous = state.last_sample.replace(current);
        if state.gesture != Gesture::Drawing {
            return;
        }

        self.inner
            .target
            .draw_segment(previous.unwrap_or(current), current);
        let inner = self.inner.clone();
        state
            .timer
            .arm(&self.inner.scope, move || CanvasInner::flush(&inner));
    }

    /// End the stroke. A pending write still fires on schedule.
    pub fn pointer_up(&self) {
        lock(&self.inner.state).gesture = Gesture::Idle;
    }

    #[must_use]
    pub fn gesture(&self) -> Gesture {
        lock(&self.inner.state).gesture
    }

    /// Apply `pen` to every later segment.
    pub fn set_pen(&self, pen: DrawingPen) {
        let mut state = lock(&self.inner.state);
        self.inner.target.set_pen(&pen);
        state.pen = pen;
    }

    #[must_use]
    pub fn pen(&self) -> DrawingPen {
        lock(&self.inner.state).pen.clone()
    }

    /// Top-left of the drawing surface in client coordinates.
    pub fn set_origin(&self, origin: Point) {
        lock(&self.inner.state).origin = origin;
    }

    /// Whether a snapshot write is scheduled but has not fired yet.
    #[must_use]
    pub fn is_write_pending(&self) -> bool {
        lock(&self.inner.state).timer.is_pending()
    }

    /// Drop any scheduled write.
    pub fn cancel_pending(&self) {
        lock(&self.inner.state).timer.cancel();
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

impl CanvasInner {
    /// Timer callback: capture the surface now, write it in the background.
    fn flush(inner: &Arc<Self>) {
        let bitmap = inner.target.snapshot();
        let inner = inner.clone();
        inner.scope.clone().spawn(async move {
            inner.persist(&bitmap).await;
        });
    }

    async fn persist(&self, bitmap: &Bitmap) {
        let snapshot = match Snapshot::encode(bitmap) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, room_id = %self.room_id, "snapshot encode failed; write dropped");
                return;
            }
        };
        *lock(&self.last_written) = Some(snapshot.clone());

        match room::update_room_drawing(self.store.as_ref(), self.room_id, &snapshot).await {
            Ok(()) => debug!(room_id = %self.room_id, bytes = snapshot.as_str().len(), "snapshot persisted"),
            Err(e) => warn!(error = %e, room_id = %self.room_id, "snapshot write failed; dropped"),
        }
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
