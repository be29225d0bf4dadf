//! On-disk side of packing and restoring.
//!
//! Sheets are written as `<prefix><n>.png` + `<prefix><n>.json`. Every file is
//! written to a temporary file in its destination directory and renamed into
//! place, so readers never observe a half-written artifact.

use std::cmp::Ordering;
use std::fs;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat, RgbaImage};
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use crate::codec::{encode_image, load_tile, read_dimensions};
use crate::config::SheetConfig;
use crate::error::{Result, TileSheetError};
use crate::grouping::group_into_batches;
use crate::metadata::{encode_metadata, read_metadata};
use crate::model::{Batch, MetadataRecord, SheetStats, Sized2d, Tile};
use crate::naming::{SHEET_IMAGE_EXT, SHEET_METADATA_EXT, allocate_sheet_indices, sheet_base_name};
use crate::pipeline::{Composite, pack_batch, uniform_target_height};
use crate::restore::{RecordOutcome, RestoreReport, RestoredTile, is_already_restored, restore_composite};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A source file whose size is known from its header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Sized2d for TileSource {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Paths and summary of one written sheet.
#[derive(Debug, Clone)]
pub struct SheetArtifacts {
    pub sheet_index: u64,
    pub image_path: PathBuf,
    pub metadata_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub records: Vec<MetadataRecord>,
}

/// Result of packing one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_index: usize,
    /// Number reserved for this batch, used or not.
    pub sheet_index: u64,
    pub result: Result<SheetArtifacts>,
}

/// Result of a file-level packing run, one outcome per batch in batch order.
#[derive(Debug)]
pub struct PackReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl PackReport {
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Statistics over the sheets that were written.
    pub fn stats(&self) -> SheetStats {
        SheetStats::collect(
            self.outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok())
                .map(|a| (a.width, a.height, a.records.as_slice())),
        )
    }
}

/// Restore result for one composite found in a directory.
#[derive(Debug)]
pub struct SheetRestore {
    pub image_path: PathBuf,
    pub result: Result<RestoreReport>,
}

/// File names directly inside `dir`. A missing directory lists as empty.
pub fn list_dir_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    tmp.persist(path)
        .map_err(|e| TileSheetError::write(path, e.error))?;
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TileSheetError::write(path, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| TileSheetError::write(path, e))?;
    Ok(tmp)
}

/// Writes a composite's image + metadata pair under `<dir>/<base_name>.*`.
///
/// Both files are staged first; the metadata is renamed into place before the
/// image, and removed again if the image cannot be placed. A sheet image on
/// disk therefore always has its metadata next to it.
pub fn write_composite(
    dir: &Path,
    base_name: &str,
    sheet_index: u64,
    composite: &Composite,
) -> Result<SheetArtifacts> {
    let image_path = dir.join(format!("{base_name}.{SHEET_IMAGE_EXT}"));
    let metadata_path = dir.join(format!("{base_name}.{SHEET_METADATA_EXT}"));

    let mut png = Vec::new();
    composite
        .canvas
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| TileSheetError::write(&image_path, e))?;
    let json = encode_metadata(&composite.records)?;

    let image_tmp = stage(&image_path, &png)?;
    let metadata_tmp = stage(&metadata_path, json.as_bytes())?;
    metadata_tmp
        .persist(&metadata_path)
        .map_err(|e| TileSheetError::write(&metadata_path, e.error))?;
    if let Err(e) = image_tmp.persist(&image_path) {
        let _ = fs::remove_file(&metadata_path);
        return Err(TileSheetError::write(&image_path, e.error));
    }

    Ok(SheetArtifacts {
        sheet_index,
        image_path,
        metadata_path,
        width: composite.width(),
        height: composite.height(),
        records: composite.records.clone(),
    })
}

/// Probes every path and groups the sources into batches. Nothing is written.
pub fn plan_batches(paths: &[PathBuf], cfg: &SheetConfig) -> Result<Vec<Batch<TileSource>>> {
    cfg.validate()?;
    if paths.is_empty() {
        return Err(TileSheetError::InvalidInput("no input images".into()));
    }
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let (width, height) = read_dimensions(path)?;
        sources.push(TileSource {
            path: path.clone(),
            width,
            height,
        });
    }
    group_into_batches(sources, cfg.tiles_per_batch)
}

fn load_pack_write(
    batch: &Batch<TileSource>,
    sheet_index: u64,
    target_h: Option<u32>,
    out_dir: &Path,
    cfg: &SheetConfig,
) -> Result<SheetArtifacts> {
    let tiles = batch
        .items
        .iter()
        .map(|src| load_tile(&src.path))
        .collect::<Result<Vec<Tile>>>()?;
    let composite = pack_batch(
        Batch {
            index: batch.index,
            items: tiles,
        },
        cfg,
        target_h,
    )?;
    let base = sheet_base_name(&cfg.sheet_prefix, sheet_index);
    write_composite(out_dir, &base, sheet_index, &composite)
}

fn pack_one(
    batch: Batch<TileSource>,
    sheet_index: u64,
    target_h: Option<u32>,
    out_dir: &Path,
    cfg: &SheetConfig,
) -> BatchOutcome {
    let result = load_pack_write(&batch, sheet_index, target_h, out_dir, cfg);
    match &result {
        Ok(a) => info!(
            path = %a.image_path.display(),
            tiles = a.records.len(),
            width = a.width,
            height = a.height,
            "sheet written"
        ),
        Err(e) => warn!(batch = batch.index, sheet_index, error = %e, "batch not packed"),
    }
    BatchOutcome {
        batch_index: batch.index,
        sheet_index,
        result,
    }
}

/// [`pack_files_with_progress`] without a progress callback.
pub fn pack_files(paths: &[PathBuf], out_dir: &Path, cfg: &SheetConfig) -> Result<PackReport> {
    pack_files_with_progress(paths, out_dir, cfg, |_| {})
}

/// Packs image files into sheets written to `out_dir`.
///
/// Notes:
/// - Configuration, empty input and unreadable headers fail the whole run
///   before anything is written.
/// - Sheet numbers are reserved once, up front, from the directory listing.
///   An exhausted index space is `InvalidInput`, also before any write.
/// - In uniform-height mode all sheets share one target height, the tallest
///   input header.
/// - A tile that fails to decode fails only its batch; that batch's number
///   stays unused and no partial sheet is left behind.
/// - `progress` is called once per finished batch.
#[instrument(skip_all, fields(inputs = paths.len(), out_dir = %out_dir.display()))]
pub fn pack_files_with_progress<F>(
    paths: &[PathBuf],
    out_dir: &Path,
    cfg: &SheetConfig,
    progress: F,
) -> Result<PackReport>
where
    F: Fn(&BatchOutcome) + Sync,
{
    let batches = plan_batches(paths, cfg)?;
    fs::create_dir_all(out_dir).map_err(|e| TileSheetError::write(out_dir, e))?;
    let names = list_dir_names(out_dir)?;
    let indices = allocate_sheet_indices(&names, &cfg.sheet_prefix, batches.len())?;
    let target_h = uniform_target_height(
        cfg,
        batches.iter().flat_map(|b| b.items.iter().map(|src| src.height)),
    );
    let jobs: Vec<(Batch<TileSource>, u64)> = batches.into_iter().zip(indices).collect();

    #[cfg(feature = "parallel")]
    {
        if cfg.parallel {
            let outcomes = jobs
                .into_par_iter()
                .map(|(b, idx)| {
                    let o = pack_one(b, idx, target_h, out_dir, cfg);
                    progress(&o);
                    o
                })
                .collect();
            return Ok(PackReport { outcomes });
        }
    }

    let outcomes = jobs
        .into_iter()
        .map(|(b, idx)| {
            let o = pack_one(b, idx, target_h, out_dir, cfg);
            progress(&o);
            o
        })
        .collect();
    Ok(PackReport { outcomes })
}

/// Decodes a composite image as RGBA. A missing file is `MissingArtifact`.
pub fn load_canvas(path: &Path) -> Result<RgbaImage> {
    if !path.exists() {
        return Err(TileSheetError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let img = image::ImageReader::open(path)
        .map_err(|e| decode_failure(path, ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_failure(path, ImageError::IoError(e)))?
        .decode()
        .map_err(|e| decode_failure(path, e))?;
    Ok(img.to_rgba8())
}

fn decode_failure(path: &Path, source: ImageError) -> TileSheetError {
    TileSheetError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Encodes and atomically writes one restored tile into `out_dir`.
pub fn write_restored(out_dir: &Path, tile: &RestoredTile, cfg: &SheetConfig) -> Result<PathBuf> {
    let path = out_dir.join(&tile.output_name);
    let bytes = encode_image(&tile.image, tile.format, Some(tile.dpi), cfg.jpeg_quality)
        .map_err(|reason| TileSheetError::write(&path, reason))?;
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Restores one composite into `out_dir`.
///
/// The metadata is read first. If every expected output already exists the
/// composite is skipped without decoding the image. Otherwise every record is
/// restored, overwriting outputs that are already present; per-record failures
/// are reported in the outcome list.
#[instrument(skip_all, fields(sheet = %image_path.display()))]
pub fn restore_sheet(
    image_path: &Path,
    metadata_path: &Path,
    out_dir: &Path,
    cfg: &SheetConfig,
) -> Result<RestoreReport> {
    cfg.validate()?;
    let records = read_metadata(metadata_path)?;
    if is_already_restored(&records, out_dir, cfg) {
        info!(expected = records.len(), "already restored, skipping");
        return Ok(RestoreReport::AlreadyRestored {
            expected: records.len(),
        });
    }
    let canvas = load_canvas(image_path)?;
    fs::create_dir_all(out_dir).map_err(|e| TileSheetError::write(out_dir, e))?;

    let outcomes: Vec<RecordOutcome<PathBuf>> = restore_composite(&canvas, &records, cfg)
        .into_iter()
        .map(|o| {
            let result = o.result.and_then(|tile| write_restored(out_dir, &tile, cfg));
            if let Err(e) = &result {
                warn!(index = o.index, filename = %o.filename, error = %e, "record not written");
            }
            RecordOutcome {
                index: o.index,
                filename: o.filename,
                result,
            }
        })
        .collect();

    let report = RestoreReport::Restored { outcomes };
    info!(
        written = report.written(),
        failed = report.failed(),
        "sheet restored"
    );
    Ok(report)
}

/// Metadata path paired with a composite image (same stem, `.json`).
pub fn metadata_path_for(image_path: &Path) -> PathBuf {
    image_path.with_extension(SHEET_METADATA_EXT)
}

/// Composite images (`*.png`) in `dir`, ordered by trailing sheet number, then
/// by name.
pub fn discover_sheets(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TileSheetError::MissingArtifact {
            path: dir.to_path_buf(),
        });
    }
    let mut sheets: Vec<PathBuf> = list_dir_names(dir)?
        .into_iter()
        .map(|n| dir.join(n))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(SHEET_IMAGE_EXT))
        })
        .collect();
    sheets.sort_by(|a, b| compare_sheet_paths(a, b));
    Ok(sheets)
}

fn compare_sheet_paths(a: &Path, b: &Path) -> Ordering {
    let key = |p: &Path| {
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let head = stem.trim_end_matches(|c: char| c.is_ascii_digit()).to_string();
        let num = stem[head.len()..].parse::<u64>().ok();
        (head, num, stem)
    };
    key(a).cmp(&key(b))
}

fn restore_discovered(image_path: PathBuf, out_dir: &Path, cfg: &SheetConfig) -> SheetRestore {
    let metadata_path = metadata_path_for(&image_path);
    let result = if metadata_path.exists() {
        restore_sheet(&image_path, &metadata_path, out_dir, cfg)
    } else {
        Err(TileSheetError::MissingArtifact {
            path: metadata_path,
        })
    };
    if let Err(e) = &result {
        warn!(sheet = %image_path.display(), error = %e, "sheet not restored");
    }
    SheetRestore { image_path, result }
}

/// [`restore_directory_with_progress`] without a progress callback.
pub fn restore_directory(
    sheets_dir: &Path,
    out_dir: &Path,
    cfg: &SheetConfig,
) -> Result<Vec<SheetRestore>> {
    restore_directory_with_progress(sheets_dir, out_dir, cfg, |_| {})
}

/// Restores every composite found in `sheets_dir`.
///
/// A composite with missing or corrupt metadata fails on its own; the others
/// are still processed. `progress` is called once per composite.
pub fn restore_directory_with_progress<F>(
    sheets_dir: &Path,
    out_dir: &Path,
    cfg: &SheetConfig,
    progress: F,
) -> Result<Vec<SheetRestore>>
where
    F: Fn(&SheetRestore) + Sync,
{
    cfg.validate()?;
    let sheets = discover_sheets(sheets_dir)?;

    #[cfg(feature = "parallel")]
    {
        if cfg.parallel {
            return Ok(sheets
                .into_par_iter()
                .map(|p| {
                    let r = restore_discovered(p, out_dir, cfg);
                    progress(&r);
                    r
                })
                .collect());
        }
    }

    Ok(sheets
        .into_iter()
        .map(|p| {
            let r = restore_discovered(p, out_dir, cfg);
            progress(&r);
            r
        })
        .collect())
}
