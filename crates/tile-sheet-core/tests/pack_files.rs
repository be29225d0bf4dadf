use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_sheet_core::error::TileSheetError;
use tile_sheet_core::prelude::*;
use tile_sheet_core::store::{list_dir_names, pack_files_with_progress, plan_batches, write_composite};

fn noise_png(rng: &mut StdRng, dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let mut img = RgbImage::new(w, h);
    for p in img.pixels_mut() {
        p.0 = [rng.gen_range(0..=255), rng.gen_range(0..=255), rng.gen_range(0..=255)];
    }
    let path = dir.join(name);
    DynamicImage::ImageRgb8(img).save(&path).unwrap();
    path
}

/// Valid header, truncated pixel data.
fn truncated_png(rng: &mut StdRng, dir: &Path, name: &str) -> PathBuf {
    let path = noise_png(rng, dir, name, 32, 32);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    path
}

#[test]
fn numbering_continues_after_existing_sheets() {
    let mut rng = StdRng::seed_from_u64(1);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(out.path().join("sheet3.png"), b"").unwrap();
    fs::write(out.path().join("sheet5.json"), b"[]").unwrap();

    let paths: Vec<PathBuf> = (0..4)
        .map(|i| noise_png(&mut rng, src.path(), &format!("t{i}.png"), 6, 6))
        .collect();
    let cfg = SheetConfig::builder().tiles_per_batch(2).build();
    let report = pack_files(&paths, out.path(), &cfg).unwrap();
    let numbers: Vec<u64> = report.outcomes.iter().map(|o| o.sheet_index).collect();
    assert_eq!(numbers, vec![6, 7]);
    assert!(out.path().join("sheet6.png").exists());
    assert!(out.path().join("sheet7.json").exists());

    // a second run keeps counting
    let again = pack_files(&paths[..1], out.path(), &cfg).unwrap();
    assert_eq!(again.outcomes[0].sheet_index, 8);
}

#[test]
fn decode_failure_fails_only_its_batch() {
    let mut rng = StdRng::seed_from_u64(2);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let good = noise_png(&mut rng, src.path(), "good.png", 8, 8);
    let bad = truncated_png(&mut rng, src.path(), "bad.png");

    let cfg = SheetConfig::builder().tiles_per_batch(1).build();
    let report = pack_files(&[good, bad], out.path(), &cfg).unwrap();
    assert_eq!(report.written(), 1);
    assert_eq!(report.failed(), 1);
    assert!(report.outcomes[0].result.is_ok());
    let failed = &report.outcomes[1];
    assert_eq!(failed.sheet_index, 2);
    assert!(matches!(
        failed.result,
        Err(TileSheetError::DecodeFailure { .. })
    ));

    // the reserved number stays unused and nothing partial is left behind
    let mut names = list_dir_names(out.path()).unwrap();
    names.sort();
    assert_eq!(names, vec!["sheet1.json", "sheet1.png"]);
    assert_eq!(report.stats().num_sheets, 1);
}

#[test]
fn unreadable_header_aborts_before_any_write() {
    let mut rng = StdRng::seed_from_u64(3);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let good = noise_png(&mut rng, src.path(), "good.png", 8, 8);
    let junk = src.path().join("junk.png");
    fs::write(&junk, b"definitely not an image").unwrap();

    let target = out.path().join("sheets");
    let result = pack_files(&[good, junk], &target, &SheetConfig::default());
    assert!(matches!(result, Err(TileSheetError::DecodeFailure { .. })));
    assert!(!target.exists());
}

#[test]
fn empty_input_list_is_rejected() {
    let out = tempfile::tempdir().unwrap();
    assert!(matches!(
        pack_files(&[], out.path(), &SheetConfig::default()),
        Err(TileSheetError::InvalidInput(_))
    ));
}

#[test]
fn plan_groups_header_sizes_without_writing() {
    let mut rng = StdRng::seed_from_u64(4);
    let src = tempfile::tempdir().unwrap();
    let paths = vec![
        noise_png(&mut rng, src.path(), "tall.png", 3, 9),
        noise_png(&mut rng, src.path(), "wide.png", 9, 3),
        noise_png(&mut rng, src.path(), "square.png", 5, 5),
    ];
    let batches = plan_batches(&paths, &SheetConfig::builder().tiles_per_batch(2).build()).unwrap();
    assert_eq!(batches.len(), 2);
    // wide, square, tall dealt over two batches
    assert_eq!(batches[0].items[0].path, paths[1]);
    assert_eq!(batches[1].items[0].path, paths[2]);
    assert_eq!(batches[0].items[1].path, paths[0]);
    assert_eq!((batches[0].items[1].width, batches[0].items[1].height), (3, 9));
}

#[test]
fn progress_is_reported_once_per_batch() {
    let mut rng = StdRng::seed_from_u64(5);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..7)
        .map(|i| noise_png(&mut rng, src.path(), &format!("p{i}.png"), 4, 4))
        .collect();
    let seen = Mutex::new(Vec::new());
    let cfg = SheetConfig::builder().tiles_per_batch(3).build();
    pack_files_with_progress(&paths, out.path(), &cfg, |o| {
        seen.lock().unwrap().push(o.batch_index);
    })
    .unwrap();
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn failed_image_rename_leaves_no_metadata_behind() {
    let mut rng = StdRng::seed_from_u64(6);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = noise_png(&mut rng, src.path(), "t.png", 5, 5);
    let tile = Tile::new("t.png", image::open(&path).unwrap());
    let composite = pack_tiles(vec![tile], &SheetConfig::default()).unwrap().remove(0);

    // a directory squatting on the image name makes its rename fail
    fs::create_dir(out.path().join("x.png")).unwrap();
    match write_composite(out.path(), "x", 1, &composite) {
        Err(TileSheetError::WriteFailure { path, .. }) => assert!(path.ends_with("x.png")),
        other => panic!("expected WriteFailure, got {other:?}"),
    }
    assert!(!out.path().join("x.json").exists());
    assert!(out.path().join("x.png").is_dir());
}

#[test]
fn exhausted_sheet_numbers_abort_before_any_write() {
    let mut rng = StdRng::seed_from_u64(7);
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(out.path().join(format!("sheet{}.json", u64::MAX)), b"[]").unwrap();
    let path = noise_png(&mut rng, src.path(), "t.png", 4, 4);

    assert!(matches!(
        pack_files(&[path], out.path(), &SheetConfig::default()),
        Err(TileSheetError::InvalidInput(_))
    ));
    assert_eq!(list_dir_names(out.path()).unwrap().len(), 1);
}
