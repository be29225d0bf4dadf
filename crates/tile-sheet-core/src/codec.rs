//! Decoding source tiles and encoding restored tiles, with DPI carried through
//! PNG `pHYs` and JPEG JFIF density.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use tracing::debug;

use crate::error::{Result, TileSheetError};
use crate::model::{ColorMode, Tile};

const METERS_PER_INCH: f64 = 0.0254;

/// Encoder format for an output extension, if one is available.
pub fn output_format(ext: &str) -> Option<ImageFormat> {
    match ImageFormat::from_extension(ext)? {
        f @ (ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::Bmp
        | ImageFormat::Tiff
        | ImageFormat::WebP
        | ImageFormat::Gif
        | ImageFormat::Tga) => Some(f),
        _ => None,
    }
}

/// Closest mode to `mode` that `format` can encode.
///
/// Alpha-bearing modes lose their alpha channel for JPEG; encoders without
/// 16-bit support get 8-bit data.
pub fn encodable_mode(mode: ColorMode, format: ImageFormat) -> ColorMode {
    let mode = if mode == ColorMode::Palette {
        ColorMode::Rgba
    } else {
        mode
    };
    match format {
        ImageFormat::Png => mode,
        ImageFormat::Jpeg => mode.without_alpha().to_8bit(),
        ImageFormat::Tiff => match mode {
            ColorMode::La => ColorMode::Rgba,
            ColorMode::La16 => ColorMode::Rgba16,
            other => other,
        },
        ImageFormat::Gif => ColorMode::Rgba,
        ImageFormat::WebP if mode.has_alpha() => ColorMode::Rgba,
        ImageFormat::WebP => ColorMode::Rgb,
        _ => mode.to_8bit(),
    }
}

fn decode_err(path: &Path, source: ImageError) -> TileSheetError {
    TileSheetError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads only the header of `path` to get its pixel size.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    ImageReader::open(path)
        .map_err(|e| decode_err(path, ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_err(path, ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(|e| decode_err(path, e))
}

/// Fully decodes `path` into a [`Tile`], reading its DPI when the container
/// records one.
pub fn load_tile(path: &Path) -> Result<Tile> {
    let bytes = fs::read(path).map_err(|e| decode_err(path, ImageError::IoError(e)))?;
    let format = image::guess_format(&bytes).map_err(|e| decode_err(path, e))?;
    let image =
        image::load_from_memory_with_format(&bytes, format).map_err(|e| decode_err(path, e))?;
    let dpi = read_dpi(&bytes, format);
    Ok(Tile::new(path, image).with_dpi(dpi))
}

/// DPI stored in an encoded PNG or JPEG, if any.
pub fn read_dpi(bytes: &[u8], format: ImageFormat) -> Option<(f64, f64)> {
    match format {
        ImageFormat::Png => png_dpi(bytes),
        ImageFormat::Jpeg => jfif_dpi(bytes),
        _ => None,
    }
}

fn png_dpi(bytes: &[u8]) -> Option<(f64, f64)> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter if dims.xppu > 0 && dims.yppu > 0 => Some((
            dims.xppu as f64 * METERS_PER_INCH,
            dims.yppu as f64 * METERS_PER_INCH,
        )),
        _ => None,
    }
}

/// Density from the JFIF APP0 segment that must directly follow SOI.
fn jfif_dpi(bytes: &[u8]) -> Option<(f64, f64)> {
    // SOI, APP0 marker, length(2), "JFIF\0", version(2), units, xd(2), yd(2)
    if bytes.len() < 18 || bytes[0..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &bytes[6..11] != b"JFIF\0" {
        return None;
    }
    let units = bytes[13];
    let xd = u16::from_be_bytes([bytes[14], bytes[15]]) as f64;
    let yd = u16::from_be_bytes([bytes[16], bytes[17]]) as f64;
    if xd == 0.0 || yd == 0.0 {
        return None;
    }
    match units {
        1 => Some((xd, yd)),
        2 => Some((xd * 2.54, yd * 2.54)),
        _ => None,
    }
}

fn dpi_to_ppm(dpi: f64) -> u32 {
    (dpi / METERS_PER_INCH).round().max(1.0) as u32
}

fn dpi_to_u16(dpi: f64) -> u16 {
    dpi.round().clamp(1.0, u16::MAX as f64) as u16
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

/// Encodes `image` as `format`. `dpi` is written for PNG and JPEG and ignored
/// elsewhere. The caller is responsible for passing an encodable mode
/// (see [`encodable_mode`]).
pub fn encode_image(
    image: &DynamicImage,
    format: ImageFormat,
    dpi: Option<(f64, f64)>,
    jpeg_quality: u8,
) -> std::result::Result<Vec<u8>, String> {
    match format {
        ImageFormat::Png => encode_png(image, dpi),
        ImageFormat::Jpeg => {
            let mut out = Vec::new();
            let mut enc = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            if let Some((dx, dy)) = dpi {
                enc.set_pixel_density(PixelDensity {
                    density: (dpi_to_u16(dx), dpi_to_u16(dy)),
                    unit: PixelDensityUnit::Inches,
                });
            }
            image.write_with_encoder(enc).map_err(|e| e.to_string())?;
            Ok(out)
        }
        other => {
            if dpi.is_some() {
                debug!(format = ?other, "format carries no dpi; dropping it");
            }
            let mut out = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut out), other)
                .map_err(|e| e.to_string())?;
            Ok(out)
        }
    }
}

fn encode_png(image: &DynamicImage, dpi: Option<(f64, f64)>) -> std::result::Result<Vec<u8>, String> {
    use png::{BitDepth, ColorType};

    let (color, depth, data) = match image {
        DynamicImage::ImageLuma8(b) => (ColorType::Grayscale, BitDepth::Eight, b.as_raw().clone()),
        DynamicImage::ImageLumaA8(b) => {
            (ColorType::GrayscaleAlpha, BitDepth::Eight, b.as_raw().clone())
        }
        DynamicImage::ImageRgb8(b) => (ColorType::Rgb, BitDepth::Eight, b.as_raw().clone()),
        DynamicImage::ImageRgba8(b) => (ColorType::Rgba, BitDepth::Eight, b.as_raw().clone()),
        DynamicImage::ImageLuma16(b) => {
            (ColorType::Grayscale, BitDepth::Sixteen, be_bytes(b.as_raw()))
        }
        DynamicImage::ImageLumaA16(b) => {
            (ColorType::GrayscaleAlpha, BitDepth::Sixteen, be_bytes(b.as_raw()))
        }
        DynamicImage::ImageRgb16(b) => (ColorType::Rgb, BitDepth::Sixteen, be_bytes(b.as_raw())),
        DynamicImage::ImageRgba16(b) => (ColorType::Rgba, BitDepth::Sixteen, be_bytes(b.as_raw())),
        other => (ColorType::Rgba, BitDepth::Eight, other.to_rgba8().into_raw()),
    };

    let mut out = Vec::new();
    {
        let mut enc = png::Encoder::new(&mut out, image.width(), image.height());
        enc.set_color(color);
        enc.set_depth(depth);
        if let Some((dx, dy)) = dpi {
            enc.set_pixel_dims(Some(png::PixelDimensions {
                xppu: dpi_to_ppm(dx),
                yppu: dpi_to_ppm(dy),
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = enc.write_header().map_err(|e| e.to_string())?;
        writer.write_image_data(&data).map_err(|e| e.to_string())?;
        writer.finish().map_err(|e| e.to_string())?;
    }
    Ok(out)
}
