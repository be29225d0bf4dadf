//! Restoring tiles from a composite and its records, and the idempotency gate.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::warn;

use crate::codec::{encodable_mode, output_format};
use crate::compositing::crop_rgba;
use crate::config::SheetConfig;
use crate::error::{Result, TileSheetError};
use crate::model::{ColorMode, MetadataRecord};
use crate::naming::{check_record_filename, restored_filename};

/// A tile cut back out of a composite, ready to encode.
#[derive(Debug, Clone)]
pub struct RestoredTile {
    /// Output file name (`<stem><suffix>.<ext>`).
    pub output_name: String,
    pub format: ImageFormat,
    pub image: DynamicImage,
    pub dpi: (f64, f64),
}

/// Result for one record of a composite. Siblings are independent.
#[derive(Debug)]
pub struct RecordOutcome<T> {
    pub index: usize,
    pub filename: String,
    pub result: Result<T>,
}

/// What happened to one composite.
#[derive(Debug)]
pub enum RestoreReport {
    /// Every expected output already existed; nothing was read or written.
    AlreadyRestored { expected: usize },
    Restored { outcomes: Vec<RecordOutcome<PathBuf>> },
}

impl RestoreReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::AlreadyRestored { .. })
    }

    pub fn written(&self) -> usize {
        match self {
            Self::AlreadyRestored { .. } => 0,
            Self::Restored { outcomes } => outcomes.iter().filter(|o| o.result.is_ok()).count(),
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            Self::AlreadyRestored { .. } => 0,
            Self::Restored { outcomes } => outcomes.iter().filter(|o| o.result.is_err()).count(),
        }
    }
}

/// Output file name for `record` under the configured format policy.
pub fn output_name(record: &MetadataRecord, cfg: &SheetConfig) -> String {
    let ext = cfg.output_format.extension_for(record.format.as_deref());
    restored_filename(&record.filename, &cfg.restore_suffix, &ext)
}

/// Output file names of every record, in record order.
pub fn expected_outputs(records: &[MetadataRecord], cfg: &SheetConfig) -> Vec<String> {
    records.iter().map(|r| output_name(r, cfg)).collect()
}

/// True iff every expected output of `records` already exists in `out_dir`.
/// Checks names only, not content.
pub fn is_already_restored(records: &[MetadataRecord], out_dir: &Path, cfg: &SheetConfig) -> bool {
    expected_outputs(records, cfg)
        .iter()
        .all(|name| out_dir.join(name).exists())
}

/// Cuts one record out of `canvas` and prepares it for encoding.
///
/// The crop is converted to the record's original mode, then to the closest
/// mode the output format can encode (e.g. alpha dropped for JPEG).
pub fn restore_record(
    canvas: &RgbaImage,
    record: &MetadataRecord,
    cfg: &SheetConfig,
) -> Result<RestoredTile> {
    check_record_filename(&record.filename)?;
    let rect = record.rect();
    let crop = crop_rgba(canvas, &rect).ok_or_else(|| {
        TileSheetError::corrupt(
            record.filename.as_str(),
            format!(
                "rect {:?} is empty or outside canvas {}x{}",
                rect,
                canvas.width(),
                canvas.height()
            ),
        )
    })?;

    let output_name = output_name(record, cfg);
    let ext = cfg.output_format.extension_for(record.format.as_deref());
    let format = output_format(&ext)
        .ok_or_else(|| TileSheetError::write(&output_name, format!("no encoder for .{ext}")))?;

    let mut image = DynamicImage::ImageRgba8(crop);
    if record.original_mode != ColorMode::Rgba {
        image = record.original_mode.convert(&image);
    }
    let target = encodable_mode(ColorMode::of(&image), format);
    if target != ColorMode::of(&image) {
        image = target.convert(&image);
    }

    let dpi = record.dpi.map_or(cfg.default_dpi, |[x, y]| (x, y));
    Ok(RestoredTile {
        output_name,
        format,
        image,
        dpi,
    })
}

/// Restores every record of a composite independently.
///
/// A failing record (bad bounds, unsafe name, unsupported format) yields an
/// error outcome and does not affect its siblings.
pub fn restore_composite(
    canvas: &RgbaImage,
    records: &[MetadataRecord],
    cfg: &SheetConfig,
) -> Vec<RecordOutcome<RestoredTile>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let result = restore_record(canvas, record, cfg);
            if let Err(e) = &result {
                warn!(index, filename = %record.filename, error = %e, "record not restored");
            }
            RecordOutcome {
                index,
                filename: record.filename.clone(),
                result,
            }
        })
        .collect()
}
