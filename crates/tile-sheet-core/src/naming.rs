//! Tile addressing and sheet numbering.
//!
//! Everything here is a pure function over names; directory listings are taken
//! by the caller (see `store::list_dir_names`) once per run.

use std::ops::Range;
use std::path::Path;

use crate::error::{Result, TileSheetError};

pub const SHEET_IMAGE_EXT: &str = "png";
pub const SHEET_METADATA_EXT: &str = "json";

/// Base name of a source path, lossily converted to UTF-8.
pub fn tile_filename(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Lowercased extension of a source path, if any.
pub fn tile_format(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Rejects record filenames that are empty or would escape the destination
/// directory.
pub fn check_record_filename(filename: &str) -> Result<()> {
    let bad = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0');
    if bad {
        return Err(TileSheetError::corrupt(
            filename,
            "filename must be a plain base name",
        ));
    }
    Ok(())
}

/// Output name of a restored tile: `<stem><suffix>.<ext>`.
///
/// `a.b.png` with suffix `s` and extension `jpg` gives `a.bs.jpg`.
pub fn restored_filename(record_filename: &str, suffix: &str, ext: &str) -> String {
    let stem = Path::new(record_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| record_filename.to_string());
    format!("{stem}{suffix}.{ext}")
}

/// Base name shared by a sheet's image and metadata: `<prefix><index>`.
pub fn sheet_base_name(prefix: &str, index: u64) -> String {
    format!("{prefix}{index}")
}

/// Parses the numeric suffix of `<prefix><digits>.png` or `<prefix><digits>.json`.
/// Anything else (other prefix, other extension, non-numeric suffix) is `None`.
pub fn parse_sheet_index(name: &str, prefix: &str) -> Option<u64> {
    let rest = name.strip_prefix(prefix)?;
    let (digits, ext) = rest.rsplit_once('.')?;
    if ext != SHEET_IMAGE_EXT && ext != SHEET_METADATA_EXT {
        return None;
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next free sheet index for a directory listing: `max(existing) + 1`, or 1.
///
/// `InvalidInput` when the highest existing index is already `u64::MAX`.
pub fn next_sheet_index<I, S>(names: I, prefix: &str) -> Result<u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match names
        .into_iter()
        .filter_map(|n| parse_sheet_index(n.as_ref(), prefix))
        .max()
    {
        None => Ok(1),
        Some(m) => m.checked_add(1).ok_or_else(index_space_exhausted),
    }
}

/// Reserves `count` consecutive indices starting at [`next_sheet_index`].
///
/// `InvalidInput` when the range would run past `u64::MAX`.
pub fn allocate_sheet_indices<I, S>(names: I, prefix: &str, count: usize) -> Result<Range<u64>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let start = next_sheet_index(names, prefix)?;
    let end = u64::try_from(count)
        .ok()
        .and_then(|c| start.checked_add(c))
        .ok_or_else(index_space_exhausted)?;
    Ok(start..end)
}

fn index_space_exhausted() -> TileSheetError {
    TileSheetError::InvalidInput("sheet index space exhausted".into())
}
