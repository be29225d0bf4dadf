use image::RgbaImage;
use tracing::{debug, instrument};

use crate::config::{ScaleMode, SheetConfig};
use crate::error::{Result, TileSheetError};
use crate::grouping::group_into_batches;
use crate::layout::GridLayout;
use crate::model::{Batch, MetadataRecord, SheetStats, Tile};
use crate::normalize::normalize_heights;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One rendered batch: RGBA canvas plus the records that invert it.
#[derive(Debug, Clone)]
pub struct Composite {
    /// Zero-based batch index within the run.
    pub batch_index: usize,
    pub layout: GridLayout,
    pub canvas: RgbaImage,
    /// One record per tile, in placement (row-major) order.
    pub records: Vec<MetadataRecord>,
}

impl Composite {
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }
}

/// Computes statistics over a set of composites.
pub fn composite_stats(composites: &[Composite]) -> SheetStats {
    SheetStats::collect(
        composites
            .iter()
            .map(|c| (c.width(), c.height(), c.records.as_slice())),
    )
}

/// Lays out `tiles` in a near-square grid and renders them onto a transparent
/// canvas.
///
/// Tiles are copied unscaled at the top-left corner of their cell. Returns the
/// layout, the canvas and one record per tile in input order.
pub fn render_grid(tiles: &[Tile]) -> Result<(GridLayout, RgbaImage, Vec<MetadataRecord>)> {
    let sizes: Vec<(u32, u32)> = tiles.iter().map(|t| (t.width(), t.height())).collect();
    let layout = GridLayout::compute(&sizes)?;
    debug!(
        cols = layout.cols,
        rows = layout.rows,
        width = layout.width(),
        height = layout.height(),
        "grid layout"
    );

    let mut canvas = RgbaImage::new(layout.width(), layout.height());
    let mut records = Vec::with_capacity(tiles.len());
    for (tile, rect) in tiles.iter().zip(&layout.placements) {
        let rgba = tile.image.to_rgba8();
        crate::compositing::blit_rgba(&rgba, &mut canvas, rect.x, rect.y);
        records.push(MetadataRecord {
            filename: tile.filename(),
            position: [rect.x, rect.y],
            size: [rect.w, rect.h],
            original_mode: tile.mode,
            format: tile.format.clone(),
            dpi: tile.dpi.map(|(x, y)| [x, y]),
        });
    }
    debug_assert!(
        crate::metadata::validate_placements(&records, canvas.width(), canvas.height()).is_ok()
    );
    Ok((layout, canvas, records))
}

/// Shared resample height of a run in uniform-height mode: the tallest of
/// `heights`. `None` in native mode.
pub fn uniform_target_height<I>(cfg: &SheetConfig, heights: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    match cfg.scale_mode {
        ScaleMode::Native => None,
        ScaleMode::UniformHeight => heights.into_iter().max(),
    }
}

/// Renders one batch according to the configured scale mode.
///
/// In uniform-height mode tiles are resampled to `target_h`, the run-wide
/// height from [`uniform_target_height`]; without one the batch's own tallest
/// tile is used.
pub fn pack_batch(batch: Batch<Tile>, cfg: &SheetConfig, target_h: Option<u32>) -> Result<Composite> {
    if batch.is_empty() {
        return Err(TileSheetError::InvalidInput(format!(
            "batch {} is empty",
            batch.index
        )));
    }
    let tiles = match cfg.scale_mode {
        ScaleMode::Native => batch.items,
        ScaleMode::UniformHeight => {
            let target = target_h
                .or_else(|| batch.items.iter().map(Tile::height).max())
                .unwrap_or(1);
            normalize_heights(batch.items, target)
        }
    };
    let (layout, canvas, records) = render_grid(&tiles)?;
    Ok(Composite {
        batch_index: batch.index,
        layout,
        canvas,
        records,
    })
}

/// Groups `tiles` into batches and renders one composite per batch.
///
/// Notes:
/// - Validation happens before any work; `InvalidInput` for an empty tile list
///   or a zero batch size.
/// - In uniform-height mode every batch shares one target height, the tallest
///   of all `tiles`.
/// - The result is deterministic for a fixed input order and configuration.
/// - With the `parallel` feature and `cfg.parallel`, batches render concurrently;
///   output order is still batch order.
#[instrument(skip_all, fields(tiles = tiles.len()))]
pub fn pack_tiles(tiles: Vec<Tile>, cfg: &SheetConfig) -> Result<Vec<Composite>> {
    cfg.validate()?;
    if tiles.is_empty() {
        return Err(TileSheetError::InvalidInput("nothing to pack".into()));
    }
    let target_h = uniform_target_height(cfg, tiles.iter().map(Tile::height));
    let batches = group_into_batches(tiles, cfg.tiles_per_batch)?;

    #[cfg(feature = "parallel")]
    {
        if cfg.parallel {
            return batches
                .into_par_iter()
                .map(|b| pack_batch(b, cfg, target_h))
                .collect();
        }
    }

    batches.into_iter().map(|b| pack_batch(b, cfg, target_h)).collect()
}
