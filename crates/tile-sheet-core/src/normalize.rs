use image::imageops::FilterType;
use tracing::debug;

use crate::model::Tile;

/// Width of a `w x h` tile scaled to `target_h`, rounded to the nearest pixel
/// and never below 1.
pub fn scaled_width(w: u32, h: u32, target_h: u32) -> u32 {
    if h == 0 {
        return w.max(1);
    }
    let scaled = (w as f64 * target_h as f64 / h as f64).round();
    (scaled as u32).max(1)
}

/// Resamples every tile to `target_h` (Lanczos3).
///
/// Tiles already at the target height are left untouched. Mode, format and DPI
/// of each tile are kept; only its pixels change.
pub fn normalize_heights(tiles: Vec<Tile>, target_h: u32) -> Vec<Tile> {
    debug!(target_h, count = tiles.len(), "normalizing tile heights");
    tiles
        .into_iter()
        .map(|mut tile| {
            let (w, h) = (tile.width(), tile.height());
            if h != target_h {
                let new_w = scaled_width(w, h, target_h);
                tile.image = tile.image.resize_exact(new_w, target_h, FilterType::Lanczos3);
            }
            tile
        })
        .collect()
}
