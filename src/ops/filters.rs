// ============================================================================
// IMAGE FILTERS — per-pixel transforms over the full grid
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

/// Convert every pixel to its luminance: `(R,G,B) -> (L,L,L)` with
/// `L = 0.3 R + 0.59 G + 0.11 B`. Alpha is untouched.
///
/// In-place and non-reversible. Re-applying is a no-op: for a gray pixel
/// the weighted sum collapses back to `L` before rounding.
pub fn grayscale(img: &mut RgbaImage) {
    let w = img.width() as usize;
    if w == 0 {
        return;
    }
    let stride = w * 4;

    // Parallel by row.
    img.as_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let r = px[0] as f32;
            let g = px[1] as f32;
            let b = px[2] as f32;
            let lum = (0.3 * r + 0.59 * g + 0.11 * b).round().clamp(0.0, 255.0) as u8;
            px[0] = lum;
            px[1] = lum;
            px[2] = lum;
        }
    });
}
