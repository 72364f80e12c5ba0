// ============================================================================
// Snapshot encoding / image decoding
// ============================================================================
//
// The canvas persists its pixel buffer as a portable string: PNG bytes,
// base64-encoded, behind a `data:image/png;base64,` prefix. The same string
// shape is accepted back on restore, and arbitrary image files decode
// through here for imports.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

/// Prefix of every snapshot string this module produces.
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Error type for snapshot and import codec operations.
#[derive(Debug)]
pub enum SnapshotError {
    Encode(image::ImageError),
    Decode(image::ImageError),
    Base64(base64::DecodeError),
    NotADataUri,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Encode(e) => write!(f, "PNG encode error: {}", e),
            SnapshotError::Decode(e) => write!(f, "image decode error: {}", e),
            SnapshotError::Base64(e) => write!(f, "base64 error: {}", e),
            SnapshotError::NotADataUri => write!(f, "not a PNG data URI"),
        }
    }
}

impl From<base64::DecodeError> for SnapshotError {
    fn from(e: base64::DecodeError) -> Self {
        SnapshotError::Base64(e)
    }
}

/// Serialize a pixel buffer to a PNG data URI.
pub fn encode_snapshot(img: &RgbaImage) -> Result<String, SnapshotError> {
    let mut png = Vec::new();
    PngEncoder::new(Cursor::new(&mut png))
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(SnapshotError::Encode)?;

    let mut out = String::from(DATA_URI_PREFIX);
    BASE64.encode_string(&png, &mut out);
    Ok(out)
}

/// Decode a PNG data URI back into a pixel buffer.
pub fn decode_snapshot(uri: &str) -> Result<RgbaImage, SnapshotError> {
    let payload = uri.strip_prefix(DATA_URI_PREFIX).ok_or(SnapshotError::NotADataUri)?;
    let png = BASE64.decode(payload)?;
    let img = image::load_from_memory(&png).map_err(SnapshotError::Decode)?;
    Ok(img.to_rgba8())
}

/// Decode an image file from disk (any format the `image` crate knows).
pub fn decode_file(path: &Path) -> Result<RgbaImage, SnapshotError> {
    let img = image::open(path).map_err(SnapshotError::Decode)?;
    Ok(img.to_rgba8())
}
