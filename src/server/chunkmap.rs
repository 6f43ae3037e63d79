//! Chunk map rendering
//!
//! Draws the pinned cells of one world as red pixels on a black bitmap. The
//! bitmap spans the bounding box of those cells, so pixel `(0, 0)` is the
//! cell at `(min_x, min_z)`.

use crate::core::types::CellCoord;
use crate::server::error::ServerError;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgb, RgbImage};

pub const PIN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Longest side a chunk map may have, in cells
pub const MAX_SIDE: u64 = 8192;

/// World id from a `<world>.png` request path
pub fn parse_world(path: &str) -> Option<i32> {
    let name = path.strip_prefix('/').unwrap_or(path);
    let digits = name.strip_suffix(".png")?;
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Bitmap of the given cells; an empty set gives a 1x1 placeholder
pub fn render_cells(cells: &[CellCoord]) -> Result<RgbImage, ServerError> {
    let Some(first) = cells.first() else {
        return Ok(RgbImage::new(1, 1));
    };

    let (mut min_x, mut max_x, mut min_z, mut max_z) = (first.x, first.x, first.z, first.z);
    for cell in cells {
        min_x = min_x.min(cell.x);
        max_x = max_x.max(cell.x);
        min_z = min_z.min(cell.z);
        max_z = max_z.max(cell.z);
    }

    let width = (i64::from(max_x) - i64::from(min_x) + 1) as u64;
    let height = (i64::from(max_z) - i64::from(min_z) + 1) as u64;
    if width > MAX_SIDE || height > MAX_SIDE {
        return Err(ServerError::MapTooLarge { width, height });
    }

    let mut image = RgbImage::new(width as u32, height as u32);
    for cell in cells {
        let px = (i64::from(cell.x) - i64::from(min_x)) as u32;
        let pz = (i64::from(cell.z) - i64::from(min_z)) as u32;
        image.put_pixel(px, pz, PIN_COLOR);
    }
    Ok(image)
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ServerError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}
