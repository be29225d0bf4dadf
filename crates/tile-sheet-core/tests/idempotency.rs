use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use tile_sheet_core::prelude::*;
use tile_sheet_core::restore::expected_outputs;

fn write_inputs(dir: &Path) -> Vec<PathBuf> {
    let sizes = [(12, 8), (5, 9), (7, 7)];
    sizes
        .iter()
        .enumerate()
        .map(|(i, &(w, h))| {
            let img = RgbImage::from_pixel(w, h, Rgb([i as u8 * 40, 10, 200]));
            let p = dir.join(format!("in{i}.png"));
            DynamicImage::ImageRgb8(img).save(&p).unwrap();
            p
        })
        .collect()
}

struct Fixture {
    _src: tempfile::TempDir,
    sheets: tempfile::TempDir,
    out: tempfile::TempDir,
    cfg: SheetConfig,
}

impl Fixture {
    fn new() -> Self {
        let src = tempfile::tempdir().unwrap();
        let sheets = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cfg = SheetConfig::default();
        let paths = write_inputs(src.path());
        let report = pack_files(&paths, sheets.path(), &cfg).unwrap();
        assert_eq!(report.written(), 1);
        Fixture {
            _src: src,
            sheets,
            out,
            cfg,
        }
    }

    fn image(&self) -> PathBuf {
        self.sheets.path().join("sheet1.png")
    }

    fn metadata(&self) -> PathBuf {
        self.sheets.path().join("sheet1.json")
    }

    fn restore(&self) -> RestoreReport {
        restore_sheet(&self.image(), &self.metadata(), self.out.path(), &self.cfg).unwrap()
    }
}

#[test]
fn second_restore_is_skipped_without_writing() {
    let fx = Fixture::new();
    let first = fx.restore();
    assert!(!first.is_skipped());
    assert_eq!(first.written(), 3);

    // a sentinel would be overwritten by any write
    let marker = fx.out.path().join("in0s.png");
    fs::write(&marker, b"sentinel").unwrap();

    let second = fx.restore();
    match second {
        RestoreReport::AlreadyRestored { expected } => assert_eq!(expected, 3),
        other => panic!("expected AlreadyRestored, got {other:?}"),
    }
    assert_eq!(fs::read(&marker).unwrap(), b"sentinel");
}

#[test]
fn gate_runs_before_the_canvas_is_read() {
    let fx = Fixture::new();
    fx.restore();
    fs::remove_file(fx.image()).unwrap();
    assert!(fx.restore().is_skipped());
}

#[test]
fn partial_output_triggers_a_full_restore() {
    let fx = Fixture::new();
    fx.restore();
    let kept = fx.out.path().join("in0s.png");
    fs::write(&kept, b"stale").unwrap();
    fs::remove_file(fx.out.path().join("in1s.png")).unwrap();

    let report = fx.restore();
    assert!(!report.is_skipped());
    assert_eq!(report.written(), 3);
    // the stale output is overwritten with a real image
    let img = image::open(&kept).unwrap();
    assert_eq!((img.width(), img.height()), (12, 8));
}

#[test]
fn gate_checks_names_under_the_configured_policy() {
    let fx = Fixture::new();
    fx.restore();
    let records = tile_sheet_core::read_metadata(&fx.metadata()).unwrap();
    assert!(is_already_restored(&records, fx.out.path(), &fx.cfg));

    let as_jpg = SheetConfig::builder()
        .output_format(OutputFormatPolicy::Fixed("jpg".into()))
        .build();
    assert_eq!(
        expected_outputs(&records, &as_jpg),
        vec!["in0s.jpg", "in2s.jpg", "in1s.jpg"]
    );
    assert!(!is_already_restored(&records, fx.out.path(), &as_jpg));
}

#[test]
fn empty_metadata_counts_as_restored() {
    let out = tempfile::tempdir().unwrap();
    assert!(is_already_restored(&[], out.path(), &SheetConfig::default()));
}
