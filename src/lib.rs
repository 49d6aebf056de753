//! Sketchroom — collaborative whiteboard rooms with live cursors and
//! debounced canvas persistence.
//!
//! ARCHITECTURE
//! ============
//! A [`services::session::RoomSession`] owns one viewer's stay in one room.
//! It drives a [`render::RenderTarget`] from local pointer events, publishes
//! the local cursor over a [`backend::PubSub`] channel, and persists canvas
//! snapshots through a [`backend::RowStore`]. The collaborator traits have
//! in-memory and Postgres implementations under [`backend`].

pub mod backend;
pub mod config;
pub mod db;
pub mod frame;
pub mod render;
pub mod scope;
pub mod services;
pub mod state;
pub mod timer;
