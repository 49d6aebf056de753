//! Frame — the envelope for every message on a room channel.
//!
//! ARCHITECTURE
//! ============
//! Peers never talk to each other directly. A publisher hands an event name
//! and a JSON payload to its channel handle; the channel wraps them in a
//! Frame stamped with the channel key and the publishing handle, and fans
//! the Frame out to every other subscriber of that event.
//!
//! DESIGN
//! ======
//! - The payload is opaque to the channel. Only the event name is routed on.
//! - Frames are ephemeral. Nothing here is persisted.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Event carrying a peer's pointer position.
pub const CURSOR_EVENT: &str = "cursor";

// =============================================================================
// TYPES
// =============================================================================

/// A single broadcast message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    /// Key of the channel the frame was published on (the room id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Handle id of the publisher.
    pub from: Option<Uuid>,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Create a broadcast frame for `event`.
    pub fn broadcast(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { id: Uuid::new_v4(), ts: now_ms(), channel: None, from: None, event: event.into(), payload }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: Uuid) -> Self {
        self.from = Some(from);
        self
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Whether this frame belongs to a subscription on `event`.
    #[must_use]
    pub fn matches(&self, event: &str) -> bool {
        self.event == event
    }
}

// =============================================================================
// TESTS
// =============================================================================
