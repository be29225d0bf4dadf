//! Core library for packing images into grid sheets and restoring them.
//!
//! - Grouping: tiles are dealt round-robin into `ceil(n / per_batch)` batches,
//!   wide tiles first, so every sheet mixes orientations
//! - Layout: near-square grid, column width = widest tile in the column, row
//!   height = tallest tile in the row, tiles at the top-left of their cell
//! - Metadata: a JSON array of records (`filename`, `position`, `size`,
//!   `original_mode`, `format`, `dpi`) that inverts the placement
//! - Restore: crop, mode conversion, format-aware flattening, with an
//!   existence gate that skips sheets already restored
//!
//! Quick example:
//! ```ignore
//! use tile_sheet_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = SheetConfig::builder().tiles_per_batch(4).build();
//! let tiles = vec![
//!     tile_sheet_core::load_tile("a.png".as_ref())?,
//!     tile_sheet_core::load_tile("b.jpg".as_ref())?,
//! ];
//! let sheets = pack_tiles(tiles, &cfg)?;
//! for sheet in &sheets {
//!     for out in restore_composite(&sheet.canvas, &sheet.records, &cfg) {
//!         println!("{} -> {:?}", out.filename, out.result.map(|t| t.output_name));
//!     }
//! }
//! # Ok(()) }
//! ```

pub mod codec;
pub mod compositing;
pub mod config;
pub mod error;
pub mod grouping;
pub mod layout;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod restore;
pub mod store;

pub use codec::*;
pub use config::*;
pub use error::*;
pub use grouping::*;
pub use layout::*;
pub use metadata::*;
pub use model::*;
pub use naming::*;
pub use pipeline::*;
pub use restore::*;
pub use store::*;

/// Convenience prelude for common types and functions.
/// Importing `tile_sheet_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{OutputFormatPolicy, ScaleMode, SheetConfig, SheetConfigBuilder};
    pub use crate::error::{Result, TileSheetError};
    pub use crate::layout::GridLayout;
    pub use crate::model::{Batch, ColorMode, MetadataRecord, Rect, SheetStats, Tile};
    pub use crate::pipeline::{Composite, composite_stats, pack_batch, pack_tiles, render_grid};
    pub use crate::restore::{
        RecordOutcome, RestoreReport, RestoredTile, is_already_restored, restore_composite,
    };
    pub use crate::store::{PackReport, pack_files, restore_directory, restore_sheet};
}
