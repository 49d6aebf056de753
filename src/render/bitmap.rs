//! RGBA raster with a minimal stroke rasterizer.
//!
//! Strokes are stamped as capsules (round caps and joins) without
//! antialiasing: a pixel is painted when its center lies within half the
//! pen width of the segment. Painting replaces the pixel outright, which
//! keeps snapshots exactly reproducible.

use std::fmt;

use crate::state::Point;

/// One RGBA pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    /// Parse a CSS hex color: `#rgb`, `#rrggbb` or `#rrggbbaa`.
    #[must_use]
    pub fn parse(css: &str) -> Option<Rgba> {
        let hex = css.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)?;
                    #[allow(clippy::cast_possible_truncation)]
                    let v = v as u8;
                    out[i] = v * 17;
                }
                Some(Rgba(out))
            }
            6 => Some(Rgba([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255])),
            8 => Some(Rgba([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, byte(&hex[6..8])?])),
            _ => None,
        }
    }
}

/// Owned RGBA8 pixel buffer, row-major, top-left origin.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    /// Fully transparent bitmap.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 4;
        Self { width, height, pixels: vec![0; len] }
    }

    /// Wrap raw RGBA8 pixels. Returns `None` if the length does not match.
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + (x as usize)) * 4)
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let i = self.offset(x, y)?;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(Rgba(px))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 4].copy_from_slice(&color.0);
        }
    }

    /// True if every pixel is transparent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Count pixels exactly equal to `color`.
    #[must_use]
    pub fn count(&self, color: Rgba) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|px| *px == color.0.as_slice())
            .count()
    }

    /// Stroke the segment `from`..`to` with round caps.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn stroke_segment(&mut self, from: Point, to: Point, width: f64, color: Rgba) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let radius = (width / 2.0).max(0.5);
        let min_x = (from.x.min(to.x) - radius).floor().max(0.0);
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0);
        let max_x = (from.x.max(to.x) + radius).ceil().min(f64::from(self.width - 1));
        let max_y = (from.y.max(to.y) + radius).ceil().min(f64::from(self.height - 1));
        if min_x > max_x || min_y > max_y {
            return;
        }

        for py in (min_y as u32)..=(max_y as u32) {
            for px in (min_x as u32)..=(max_x as u32) {
                let center = Point::new(f64::from(px) + 0.5, f64::from(py) + 0.5);
                if distance_to_segment(center, from, to) <= radius {
                    self.set_pixel(px, py, color);
                }
            }
        }
    }

    /// Replace contents with `src` anchored at the origin. Pixels outside
    /// `src` become transparent; pixels outside `self` are clipped.
    pub fn blit(&mut self, src: &Bitmap) {
        self.pixels.fill(0);
        let w = self.width.min(src.width) as usize;
        let h = self.height.min(src.height);
        for y in 0..h {
            let (Some(dst), Some(from)) = (self.offset(0, y), src.offset(0, y)) else {
                continue;
            };
            self.pixels[dst..dst + w * 4].copy_from_slice(&src.pixels[from..from + w * 4]);
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 { 0.0 } else { (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0) };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

#[cfg(test)]
#[path = "bitmap_test.rs"]
mod tests;
