//! Render targets: where strokes and peer markers end up.
//!
//! ARCHITECTURE
//! ============
//! Room-session logic never touches pixels directly. It drives a
//! [`RenderTarget`], which owns both the drawing surface (a raster bitmap)
//! and the overlay layer that holds one cursor marker per remote peer.
//! [`Board`] is the in-memory implementation; a windowed front-end would
//! provide its own.

mod bitmap;
mod board;
mod snapshot;

pub use bitmap::{Bitmap, Rgba};
pub use board::{Board, CursorMarker};
pub use snapshot::{PNG_DATA_URL_PREFIX, Snapshot, SnapshotError};

use uuid::Uuid;

use crate::state::{DrawingPen, Point};

/// Side length of the cursor glyph in pixels.
pub const MARKER_SIZE_PX: u32 = 16;

/// Directional cursor glyph drawn for every peer, filled with the peer's color.
/// Rendered mirrored on the x axis so the tip points up-left.
pub const CURSOR_GLYPH_SVG: &str = concat!(
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" fill="currentColor" viewBox="0 0 16 16">"#,
    r#"<path d="M14.082 2.182a.5.5 0 0 1 .103.557L8.528 15.467a.5.5 0 0 1-.917-.007L5.57 10.694.803 8.652a.5.5 0 0 1-.006-.916l12.728-5.657a.5.5 0 0 1 .556.103z"/>"#,
    "</svg>"
);

/// Drawing surface plus cursor overlay.
///
/// Methods take `&self`; implementations synchronize internally so a target
/// can be shared between the cursor renderer and canvas sync.
pub trait RenderTarget: Send + Sync {
    /// Whether a marker for `peer` is currently on the overlay.
    fn has_marker(&self, peer: Uuid) -> bool;

    /// Create or replace the marker for `peer`.
    fn upsert_marker(&self, peer: Uuid, position: Point, color: Option<&str>);

    /// Move an existing marker. Returns `false` if `peer` has no marker.
    fn move_marker(&self, peer: Uuid, position: Point) -> bool;

    /// Remove every marker (view unmount).
    fn clear_markers(&self);

    /// Apply stroke width and color to subsequent segments.
    fn set_pen(&self, pen: &DrawingPen);

    /// Stroke a straight segment with the current pen.
    fn draw_segment(&self, from: Point, to: Point);

    /// Copy of the full surface.
    fn snapshot(&self) -> Bitmap;

    /// Replace the surface contents with `bitmap`, anchored at the origin.
    fn restore(&self, bitmap: &Bitmap);
}
