//! In-memory render target: a bitmap surface plus a marker overlay.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use super::{Bitmap, CURSOR_GLYPH_SVG, MARKER_SIZE_PX, RenderTarget, Rgba};
use crate::state::{DEFAULT_PEN_SIZE, DrawingPen, Point};

/// One remote peer's cursor on the overlay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorMarker {
    pub user_id: Uuid,
    /// Profile color; `None` renders with the default glyph color.
    pub color: Option<String>,
    /// Absolute overlay position in pixels (left/top).
    pub position: Point,
    /// Glyph side length in pixels.
    pub size_px: u32,
}

impl CursorMarker {
    /// The cursor glyph filled with this peer's color.
    #[must_use]
    pub fn svg(&self) -> String {
        match &self.color {
            Some(color) => CURSOR_GLYPH_SVG.replacen(r#"fill="currentColor""#, &format!(r#"fill="{color}""#), 1),
            None => CURSOR_GLYPH_SVG.to_owned(),
        }
    }
}

struct BoardInner {
    bitmap: Bitmap,
    pen_color: Rgba,
    pen_size: f64,
    markers: HashMap<Uuid, CursorMarker>,
}

/// Headless whiteboard surface.
pub struct Board {
    inner: Mutex<BoardInner>,
}

impl Board {
    /// Blank surface of `width` x `height` pixels (each at least 1).
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(BoardInner {
                bitmap: Bitmap::new(width.max(1), height.max(1)),
                pen_color: Rgba::BLACK,
                pen_size: DEFAULT_PEN_SIZE,
                markers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The marker currently shown for `peer`.
    pub fn marker(&self, peer: Uuid) -> Option<CursorMarker> {
        self.lock().markers.get(&peer).cloned()
    }

    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }
}

impl RenderTarget for Board {
    fn has_marker(&self, peer: Uuid) -> bool {
        self.lock().markers.contains_key(&peer)
    }

    fn upsert_marker(&self, peer: Uuid, position: Point, color: Option<&str>) {
        self.lock().markers.insert(
            peer,
            CursorMarker { user_id: peer, color: color.map(str::to_owned), position, size_px: MARKER_SIZE_PX },
        );
    }

    fn move_marker(&self, peer: Uuid, position: Point) -> bool {
        let mut inner = self.lock();
        let Some(marker) = inner.markers.get_mut(&peer) else {
            return false;
        };
        marker.position = position;
        true
    }

    fn clear_markers(&self) {
        self.lock().markers.clear();
    }

    fn set_pen(&self, pen: &DrawingPen) {
        let mut inner = self.lock();
        // Invalid values leave the previous style in place, like a 2D context does.
        match Rgba::parse(&pen.color) {
            Some(color) => inner.pen_color = color,
            None => debug!(color = %pen.color, "ignoring unparsable pen color"),
        }
        if pen.size.is_finite() && pen.size > 0.0 {
            inner.pen_size = pen.size;
        }
    }

    fn draw_segment(&self, from: Point, to: Point) {
        let mut inner = self.lock();
        let (size, color) = (inner.pen_size, inner.pen_color);
        inner.bitmap.stroke_segment(from, to, size, color);
    }

    fn snapshot(&self) -> Bitmap {
        self.lock().bitmap.clone()
    }

    fn restore(&self, bitmap: &Bitmap) {
        self.lock().bitmap.blit(bitmap);
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
