//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a default so the in-memory demo runs with an empty
//! environment. Unparsable values fall back to the default.

use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::backend::memory::DEFAULT_CHANNEL_CAPACITY;
use crate::services::session::SessionOptions;
use crate::state::Point;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SNAPSHOT_QUIET_MS: u64 = 1000;
const DEFAULT_CANVAS_WIDTH: u32 = 1280;
const DEFAULT_CANVAS_HEIGHT: u32 = 720;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres URL. Required for every command that touches stored rooms.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Debounce interval before a canvas snapshot is written.
    pub snapshot_quiet_ms: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Signed-in user for the Postgres-backed identity.
    pub session_user: Option<Uuid>,
    /// Per-subscriber queue size for channels and change streams.
    pub channel_capacity: usize,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            snapshot_quiet_ms: env_parse("SNAPSHOT_QUIET_MS", DEFAULT_SNAPSHOT_QUIET_MS),
            canvas_width: env_parse("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
            canvas_height: env_parse("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
            session_user: std::env::var("SKETCHROOM_USER_ID")
                .ok()
                .and_then(|v| Uuid::parse_str(v.trim()).ok()),
            channel_capacity: env_parse("CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
        }
    }

    #[must_use]
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_quiet_ms)
    }

    /// Session options for a surface anchored at the viewport origin.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions { quiet_interval: self.quiet_interval(), origin: Point::default() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            snapshot_quiet_ms: DEFAULT_SNAPSHOT_QUIET_MS,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            session_user: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
