//! Canvas snapshots: lossless PNG wrapped in a `data:` URL.
//!
//! The string form is what gets stored in `rooms.drawing` and what any
//! browser-style surface can display directly.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::Bitmap;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not a PNG data URL")]
    NotPngDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("png encode failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("png decode failed: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("unsupported png color type: {0}")]
    UnsupportedFormat(String),
    #[error("png frame size does not match its header")]
    SizeMismatch,
}

/// Serialized canvas contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    /// Wrap a stored data URL. Validation happens on [`Snapshot::decode`].
    #[must_use]
    pub fn from_data_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode `bitmap` as an RGBA8 PNG data URL.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if the PNG writer fails.
    pub fn encode(bitmap: &Bitmap) -> Result<Self, SnapshotError> {
        Ok(Self(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(encode_png(bitmap)?))))
    }

    /// Decode back into an RGBA8 bitmap.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the URL, base64 or PNG data is invalid.
    pub fn decode(&self) -> Result<Bitmap, SnapshotError> {
        decode_png(&self.png_bytes()?)
    }

    /// The raw PNG file carried by the data URL.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the prefix or base64 payload is invalid.
    pub fn png_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = self
            .0
            .strip_prefix(PNG_DATA_URL_PREFIX)
            .ok_or(SnapshotError::NotPngDataUrl)?;
        Ok(STANDARD.decode(payload)?)
    }
}

/// Raw PNG bytes for `bitmap`.
///
/// # Errors
///
/// Returns [`SnapshotError::Encode`] if the PNG writer fails.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, SnapshotError> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, bitmap.width(), bitmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(bitmap.pixels())?;
        writer.finish()?;
    }
    Ok(png_data)
}

/// Decode PNG bytes of any 8/16-bit color type into RGBA8.
///
/// # Errors
///
/// Returns a [`SnapshotError`] if the PNG is malformed or uses an
/// unsupported color type.
pub fn decode_png(bytes: &[u8]) -> Result<Bitmap, SnapshotError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    buf.truncate(info.buffer_size());

    let rgba = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        png::ColorType::GrayscaleAlpha => buf.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0], p[1]]).collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        other => return Err(SnapshotError::UnsupportedFormat(format!("{other:?}"))),
    };

    Bitmap::from_rgba(info.width, info.height, rgba).ok_or(SnapshotError::SizeMismatch)
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
