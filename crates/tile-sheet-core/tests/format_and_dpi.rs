use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tile_sheet_core::codec::{encodable_mode, encode_image, load_tile, read_dpi};
use tile_sheet_core::prelude::*;
use tile_sheet_core::store::write_restored;

fn translucent(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 128])))
}

fn close(a: (f64, f64), b: (f64, f64), tol: f64) -> bool {
    (a.0 - b.0).abs() < tol && (a.1 - b.1).abs() < tol
}

#[test]
fn rgba_to_jpeg_drops_alpha() {
    let tile = Tile::new("photo.jpg", translucent(6, 4));
    let cfg = SheetConfig::default();
    let sheets = pack_tiles(vec![tile], &cfg).unwrap();
    let restored = restore_composite(&sheets[0].canvas, &sheets[0].records, &cfg)
        .remove(0)
        .result
        .unwrap();
    assert_eq!(restored.output_name, "photos.jpg");
    assert_eq!(restored.format, ImageFormat::Jpeg);
    assert_eq!(ColorMode::of(&restored.image), ColorMode::Rgb);

    let out = tempfile::tempdir().unwrap();
    let path = write_restored(out.path(), &restored, &cfg).unwrap();
    let back = image::open(&path).unwrap();
    assert_eq!(back.color(), image::ColorType::Rgb8);
    assert_eq!((back.width(), back.height()), (6, 4));
}

#[test]
fn fixed_format_overrides_the_source_extension() {
    let cfg = SheetConfig::builder()
        .output_format(OutputFormatPolicy::Fixed("jpg".into()))
        .build();
    let tile = Tile::new("icon.png", translucent(3, 3));
    let sheets = pack_tiles(vec![tile], &cfg).unwrap();
    let restored = restore_composite(&sheets[0].canvas, &sheets[0].records, &cfg)
        .remove(0)
        .result
        .unwrap();
    assert_eq!(restored.output_name, "icons.jpg");
    assert!(!ColorMode::of(&restored.image).has_alpha());
}

#[test]
fn encodable_modes_follow_the_encoder() {
    assert_eq!(encodable_mode(ColorMode::Rgba, ImageFormat::Jpeg), ColorMode::Rgb);
    assert_eq!(encodable_mode(ColorMode::La, ImageFormat::Jpeg), ColorMode::L);
    assert_eq!(encodable_mode(ColorMode::Rgba16, ImageFormat::Jpeg), ColorMode::Rgb);
    assert_eq!(encodable_mode(ColorMode::Rgba16, ImageFormat::Png), ColorMode::Rgba16);
    assert_eq!(encodable_mode(ColorMode::Palette, ImageFormat::Png), ColorMode::Rgba);
    assert_eq!(encodable_mode(ColorMode::L16, ImageFormat::Bmp), ColorMode::L);
}

#[test]
fn png_dpi_survives_pack_and_restore() {
    let src = tempfile::tempdir().unwrap();
    let sheets = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let input = src.path().join("scan.png");
    let bytes = encode_image(&translucent(5, 5), ImageFormat::Png, Some((300.0, 300.0)), 90).unwrap();
    std::fs::write(&input, bytes).unwrap();
    let plain = src.path().join("plain.png");
    translucent(4, 4).save(&plain).unwrap();

    let loaded = load_tile(&input).unwrap();
    assert!(close(loaded.dpi.unwrap(), (300.0, 300.0), 0.01));

    let cfg = SheetConfig::default();
    let report = pack_files(&[input, plain], sheets.path(), &cfg).unwrap();
    let records = &report.outcomes[0].result.as_ref().unwrap().records;
    let scan = records.iter().find(|r| r.filename == "scan.png").unwrap();
    let [dx, dy] = scan.dpi.unwrap();
    assert!(close((dx, dy), (300.0, 300.0), 0.01));
    let plain_rec = records.iter().find(|r| r.filename == "plain.png").unwrap();
    assert_eq!(plain_rec.dpi, None);

    restore_directory(sheets.path(), out.path(), &cfg).unwrap();
    let scan_out = std::fs::read(out.path().join("scans.png")).unwrap();
    assert!(close(read_dpi(&scan_out, ImageFormat::Png).unwrap(), (300.0, 300.0), 0.01));
    // records without dpi get the configured default
    let plain_out = std::fs::read(out.path().join("plains.png")).unwrap();
    assert!(close(read_dpi(&plain_out, ImageFormat::Png).unwrap(), (72.0, 72.0), 0.05));
}

#[test]
fn jpeg_density_is_written_in_inches() {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
    let bytes = encode_image(&img, ImageFormat::Jpeg, Some((150.0, 96.0)), 85).unwrap();
    assert_eq!(read_dpi(&bytes, ImageFormat::Jpeg), Some((150.0, 96.0)));
}

#[test]
fn formats_without_density_drop_it() {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
    let bytes = encode_image(&img, ImageFormat::Bmp, Some((300.0, 300.0)), 90).unwrap();
    assert_eq!(read_dpi(&bytes, ImageFormat::Bmp), None);
}
