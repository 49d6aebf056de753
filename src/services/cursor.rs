//! Cursor service — broadcast the local pointer, render remote peers.
//!
//! DESIGN
//! ======
//! Cursor positions are purely ephemeral: published to room peers on every
//! eligible pointer move and never stored. Remote positions land on the
//! render target's overlay as one marker per peer.
//!
//! MARKER REGISTRY
//! ===============
//! A peer is recorded in the registry before its profile is fetched, so a
//! burst of cursor messages from a new peer triggers exactly one lookup and
//! one marker. While the lookup is in flight the registry keeps the latest
//! position seen; the marker is placed there once the profile resolves.
//! Lock order is registry first, then the render target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{ChannelHandle, Identity};
use crate::frame::{CURSOR_EVENT, Frame};
use crate::render::RenderTarget;
use crate::scope::SessionScope;
use crate::state::{CursorState, Point};

// =============================================================================
// TYPES
// =============================================================================

enum MarkerEntry {
    /// Profile lookup in flight; holds the newest position received.
    Pending { latest: Point },
    /// Marker is on the overlay.
    Ready,
}

struct CursorInner {
    local_user: Option<Uuid>,
    identity: Arc<dyn Identity>,
    target: Arc<dyn RenderTarget>,
    scope: SessionScope,
    channel: Mutex<Option<Arc<dyn ChannelHandle>>>,
    origin: Mutex<Point>,
    registry: Mutex<HashMap<Uuid, MarkerEntry>>,
}

/// Per-session cursor broadcaster and renderer. Clones share state.
#[derive(Clone)]
pub struct CursorBroadcaster {
    inner: Arc<CursorInner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CursorBroadcaster {
    /// `local_user` is `None` for unauthenticated viewers, who never publish.
    #[must_use]
    pub fn new(
        local_user: Option<Uuid>,
        identity: Arc<dyn Identity>,
        target: Arc<dyn RenderTarget>,
        scope: SessionScope,
    ) -> Self {
        Self {
            inner: Arc::new(CursorInner {
                local_user,
                identity,
                target,
                scope,
                channel: Mutex::new(None),
                origin: Mutex::new(Point::default()),
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Publish through `channel` from now on.
    pub fn attach_channel(&self, channel: Arc<dyn ChannelHandle>) {
        *lock(&self.inner.channel) = Some(channel);
    }

    /// Top-left of the drawing surface in client coordinates.
    pub fn set_origin(&self, origin: Point) {
        *lock(&self.inner.origin) = origin;
    }

    // =========================================================================
    // LOCAL
    // =========================================================================

    /// Publish the local pointer position relative to the surface origin.
    ///
    /// Returns `true` if a frame was handed to the channel. Skipped when the
    /// viewer is unauthenticated or no open channel is attached.
    pub fn on_local_pointer_move(&self, client: Point) -> bool {
        let Some(user_id) = self.inner.local_user else {
            return false;
        };
        let Some(channel) = lock(&self.inner.channel).clone() else {
            return false;
        };
        if !channel.is_open() {
            return false;
        }

        let position = client.relative_to(*lock(&self.inner.origin));
        let state = CursorState { user_id, x: position.x, y: position.y };
        let payload = match serde_json::to_value(state) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to encode cursor state");
                return false;
            }
        };
        match channel.publish(CURSOR_EVENT, payload) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "cursor publish skipped");
                false
            }
        }
    }

    // =========================================================================
    // REMOTE
    // =========================================================================

    /// Move the peer's marker, creating it on first sight.
    pub fn on_remote_cursor_message(&self, state: CursorState) {
        let position = state.position();
        {
            let mut registry = lock(&self.inner.registry);
            match registry.get_mut(&state.user_id) {
                Some(MarkerEntry::Pending { latest }) => {
                    *latest = position;
                    return;
                }
                Some(MarkerEntry::Ready) => {
                    if self.inner.target.move_marker(state.user_id, position) {
                        return;
                    }
                    // Overlay lost the marker; rebuild it.
                    registry.remove(&state.user_id);
                }
                None => {}
            }
        }
        self.create_marker(state.user_id, position);
    }

    /// Start creating a marker for `user_id` at `initial`.
    ///
    /// Idempotent: returns `false` without side effects if the peer is
    /// already registered or already has a marker on the overlay.
    pub fn create_marker(&self, user_id: Uuid, initial: Point) -> bool {
        {
            let mut registry = lock(&self.inner.registry);
            if registry.contains_key(&user_id) || self.inner.target.has_marker(user_id) {
                return false;
            }
            registry.insert(user_id, MarkerEntry::Pending { latest: initial });
        }

        let inner = self.inner.clone();
        self.inner.scope.spawn(async move {
            let color = match inner.identity.get_profile(user_id).await {
                Ok(profile) => profile.metadata.user_color,
                Err(e) => {
                    warn!(error = %e, peer_id = %user_id, "profile lookup failed; using default marker color");
                    None
                }
            };

            let mut registry = lock(&inner.registry);
            let Some(entry) = registry.get_mut(&user_id) else {
                return;
            };
            let MarkerEntry::Pending { latest } = *entry else {
                return;
            };
            inner.target.upsert_marker(user_id, latest, color.as_deref());
            *entry = MarkerEntry::Ready;
            debug!(peer_id = %user_id, color = ?color, "cursor marker created");
        });
        true
    }

    /// Pump cursor frames from `rx` until the stream ends or the scope is cancelled.
    pub fn spawn_listener(&self, mut rx: mpsc::Receiver<Frame>) {
        let this = self.clone();
        self.inner.scope.spawn(async move {
            while let Some(frame) = rx.recv().await {
                match serde_json::from_value::<CursorState>(frame.payload) {
                    Ok(state) => this.on_remote_cursor_message(state),
                    Err(e) => debug!(error = %e, "ignoring malformed cursor frame"),
                }
            }
        });
    }

    /// Number of peers registered, including those still pending.
    #[must_use]
    pub fn known_peers(&self) -> usize {
        lock(&self.inner.registry).len()
    }

    /// Forget every peer, remove all markers and close the channel.
    pub fn clear(&self) {
        let mut registry = lock(&self.inner.registry);
        registry.clear();
        self.inner.target.clear_markers();
        drop(registry);

        if let Some(channel) = lock(&self.inner.channel).take() {
            channel.close();
        }
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
