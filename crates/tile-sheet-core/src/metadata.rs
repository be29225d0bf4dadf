//! Metadata codec: a pretty-printed JSON array of [`MetadataRecord`]s.
//!
//! Shape: `[{ "filename", "position": [x, y], "size": [w, h], "original_mode",
//! "format"?, "dpi"?: [x, y] }, ...]`. Array order is canvas placement order and
//! is kept as-is in both directions.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{Result, TileSheetError};
use crate::model::{MetadataRecord, Rect};
use crate::naming::check_record_filename;

/// Serializes records as pretty JSON (2-space indent, non-ASCII kept verbatim).
pub fn encode_metadata(records: &[MetadataRecord]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| TileSheetError::corrupt("<encode>", e.to_string()))
}

/// Writes pretty JSON records to `writer`.
pub fn write_metadata<W: Write>(mut writer: W, records: &[MetadataRecord]) -> Result<()> {
    let text = encode_metadata(records)?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Parses and schema-checks metadata text. `origin` names the source in errors.
pub fn decode_metadata(text: &str, origin: &str) -> Result<Vec<MetadataRecord>> {
    let records: Vec<MetadataRecord> =
        serde_json::from_str(text).map_err(|e| TileSheetError::corrupt(origin, e.to_string()))?;
    for (i, rec) in records.iter().enumerate() {
        check_record(rec).map_err(|reason| {
            TileSheetError::corrupt(origin, format!("record {i} ({}): {reason}", rec.filename))
        })?;
    }
    Ok(records)
}

/// Reads a metadata file. A missing file is `MissingArtifact`.
pub fn read_metadata(path: &Path) -> Result<Vec<MetadataRecord>> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TileSheetError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(TileSheetError::corrupt(
                path.display().to_string(),
                e.to_string(),
            ));
        }
    };
    decode_metadata(&text, &path.display().to_string())
}

fn check_record(rec: &MetadataRecord) -> std::result::Result<(), String> {
    check_record_filename(&rec.filename).map_err(|_| "filename must be a plain base name")?;
    if let Some([dx, dy]) = rec.dpi {
        if !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0) {
            return Err(format!("dpi must be positive, got [{dx}, {dy}]"));
        }
    }
    if let Some(fmt) = &rec.format {
        if fmt.contains('/') || fmt.contains('\\') {
            return Err(format!("format is not an extension: {fmt:?}"));
        }
    }
    Ok(())
}

/// Checks that every record lies inside a `width x height` canvas and that no
/// two records overlap.
pub fn validate_placements(records: &[MetadataRecord], width: u32, height: u32) -> Result<()> {
    for (i, rec) in records.iter().enumerate() {
        let r = rec.rect();
        if r.x as u64 + r.w as u64 > width as u64 || r.y as u64 + r.h as u64 > height as u64 {
            return Err(TileSheetError::corrupt(
                format!("record {i} ({})", rec.filename),
                format!("rect {r:?} exceeds canvas {width}x{height}"),
            ));
        }
    }
    let rects: Vec<Rect> = records.iter().map(MetadataRecord::rect).collect();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].overlaps(&rects[j]) {
                return Err(TileSheetError::corrupt(
                    format!("records {i} and {j}"),
                    "placements overlap",
                ));
            }
        }
    }
    Ok(())
}
