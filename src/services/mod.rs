//! Room-level services.
//!
//! ARCHITECTURE
//! ============
//! `room` is plain CRUD over the row store. `cursor` and `canvas` are the
//! two independent realtime components of a room view, and `session`
//! wires them together behind the entry gate.

pub mod canvas;
pub mod cursor;
pub mod room;
pub mod session;
