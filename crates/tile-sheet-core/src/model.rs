use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn overlaps(&self, r: &Rect) -> bool {
        let a_x2 = self.x as u64 + self.w as u64;
        let a_y2 = self.y as u64 + self.h as u64;
        let b_x2 = r.x as u64 + r.w as u64;
        let b_y2 = r.y as u64 + r.h as u64;
        !(self.x as u64 >= b_x2 || r.x as u64 >= a_x2 || self.y as u64 >= b_y2 || r.y as u64 >= a_y2)
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// Semantic pixel format of a tile, serialized with the conventional mode names
/// (`"RGB"`, `"RGBA"`, `"L"`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ColorMode {
    #[serde(rename = "L")]
    L,
    #[serde(rename = "LA")]
    La,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    /// Indexed color. Decoders expand palettes, so this only arrives through
    /// metadata; it restores as RGBA.
    #[serde(rename = "P")]
    Palette,
    #[serde(rename = "I;16")]
    L16,
    #[serde(rename = "LA;16")]
    La16,
    #[serde(rename = "RGB;16")]
    Rgb16,
    #[serde(rename = "RGBA;16")]
    Rgba16,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L => "L",
            Self::La => "LA",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Palette => "P",
            Self::L16 => "I;16",
            Self::La16 => "LA;16",
            Self::Rgb16 => "RGB;16",
            Self::Rgba16 => "RGBA;16",
        }
    }

    /// Classifies a decoded color type. Float rasters map to the 16-bit mode
    /// with the same channel layout.
    pub fn from_color_type(ct: ColorType) -> Self {
        match ct {
            ColorType::L8 => Self::L,
            ColorType::La8 => Self::La,
            ColorType::Rgb8 => Self::Rgb,
            ColorType::Rgba8 => Self::Rgba,
            ColorType::L16 => Self::L16,
            ColorType::La16 => Self::La16,
            ColorType::Rgb16 | ColorType::Rgb32F => Self::Rgb16,
            ColorType::Rgba16 | ColorType::Rgba32F => Self::Rgba16,
            _ => Self::Rgba,
        }
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self::from_color_type(image.color())
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::La | Self::Rgba | Self::Palette | Self::La16 | Self::Rgba16)
    }

    pub fn is_16bit(&self) -> bool {
        matches!(self, Self::L16 | Self::La16 | Self::Rgb16 | Self::Rgba16)
    }

    /// Same channel layout with the alpha channel dropped.
    pub fn without_alpha(&self) -> Self {
        match self {
            Self::La => Self::L,
            Self::Rgba | Self::Palette => Self::Rgb,
            Self::La16 => Self::L16,
            Self::Rgba16 => Self::Rgb16,
            other => *other,
        }
    }

    /// Same channel layout at 8 bits per channel.
    pub fn to_8bit(&self) -> Self {
        match self {
            Self::L16 => Self::L,
            Self::La16 => Self::La,
            Self::Rgb16 => Self::Rgb,
            Self::Rgba16 => Self::Rgba,
            other => *other,
        }
    }

    /// Converts `image` into this mode. Alpha is dropped, not composited.
    pub fn convert(&self, image: &DynamicImage) -> DynamicImage {
        if ColorMode::of(image) == *self && *self != Self::Palette {
            return image.clone();
        }
        match self {
            Self::L => DynamicImage::ImageLuma8(image.to_luma8()),
            Self::La => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
            Self::Rgb => DynamicImage::ImageRgb8(image.to_rgb8()),
            Self::Rgba | Self::Palette => DynamicImage::ImageRgba8(image.to_rgba8()),
            Self::L16 => DynamicImage::ImageLuma16(image.to_luma16()),
            Self::La16 => DynamicImage::ImageLumaA16(image.to_luma_alpha16()),
            Self::Rgb16 => DynamicImage::ImageRgb16(image.to_rgb16()),
            Self::Rgba16 => DynamicImage::ImageRgba16(image.to_rgba16()),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(Self::L),
            "LA" => Ok(Self::La),
            "RGB" => Ok(Self::Rgb),
            "RGBA" => Ok(Self::Rgba),
            "P" => Ok(Self::Palette),
            "I;16" => Ok(Self::L16),
            "LA;16" => Ok(Self::La16),
            "RGB;16" => Ok(Self::Rgb16),
            "RGBA;16" => Ok(Self::Rgba16),
            _ => Err(()),
        }
    }
}

/// One decoded source image.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Origin of the tile; only its base name reaches the metadata.
    pub source_path: PathBuf,
    pub image: DynamicImage,
    pub mode: ColorMode,
    /// Lowercased source extension, used as the restore format.
    pub format: Option<String>,
    pub dpi: Option<(f64, f64)>,
}

impl Tile {
    /// Builds a tile from an already decoded image; mode and format are derived
    /// from the image and the path extension.
    pub fn new(source_path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        let source_path = source_path.into();
        let format = crate::naming::tile_format(&source_path);
        Self {
            mode: ColorMode::of(&image),
            source_path,
            image,
            format,
            dpi: None,
        }
    }

    pub fn with_dpi(mut self, dpi: Option<(f64, f64)>) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn filename(&self) -> String {
        crate::naming::tile_filename(&self.source_path)
    }
}

/// Anything with a pixel size; lets grouping run on header sizes as well as
/// decoded tiles.
pub trait Sized2d {
    fn size(&self) -> (u32, u32);
}

impl Sized2d for Tile {
    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

impl Sized2d for (u32, u32) {
    fn size(&self) -> (u32, u32) {
        *self
    }
}

impl<K> Sized2d for (K, u32, u32) {
    fn size(&self) -> (u32, u32) {
        (self.1, self.2)
    }
}

/// Ordered group of items sharing one composite. Order is placement order.
#[derive(Debug, Clone)]
pub struct Batch<T = Tile> {
    /// Zero-based batch index within the run.
    pub index: usize,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Placement and format data for one tile of a composite.
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Base name of the source (no directory).
    pub filename: String,
    /// Top-left offset in canvas pixels.
    pub position: [u32; 2],
    /// Placed pixel size (after any resampling).
    pub size: [u32; 2],
    pub original_mode: ColorMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<[f64; 2]>,
}

impl MetadataRecord {
    pub fn rect(&self) -> Rect {
        Rect::new(self.position[0], self.position[1], self.size[0], self.size[1])
    }
}

/// Statistics about a set of composites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SheetStats {
    pub num_sheets: usize,
    pub num_tiles: usize,
    /// Sum of canvas width * height.
    pub total_canvas_area: u64,
    /// Sum of placed tile areas.
    pub used_tile_area: u64,
    /// used_tile_area / total_canvas_area (0.0 to 1.0).
    pub occupancy: f64,
    pub max_sheet_width: u32,
    pub max_sheet_height: u32,
}

impl SheetStats {
    /// Collects stats from `(canvas_width, canvas_height, records)` triples.
    pub fn collect<'a, I>(sheets: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32, &'a [MetadataRecord])>,
    {
        let mut num_sheets = 0;
        let mut num_tiles = 0;
        let mut total_canvas_area = 0u64;
        let mut used_tile_area = 0u64;
        let mut max_sheet_width = 0u32;
        let mut max_sheet_height = 0u32;

        for (w, h, records) in sheets {
            num_sheets += 1;
            total_canvas_area += w as u64 * h as u64;
            max_sheet_width = max_sheet_width.max(w);
            max_sheet_height = max_sheet_height.max(h);
            for rec in records {
                num_tiles += 1;
                used_tile_area += rec.rect().area();
            }
        }

        let occupancy = if total_canvas_area > 0 {
            used_tile_area as f64 / total_canvas_area as f64
        } else {
            0.0
        };

        Self {
            num_sheets,
            num_tiles,
            total_canvas_area,
            used_tile_area,
            occupancy,
            max_sheet_width,
            max_sheet_height,
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Sheets: {}, Tiles: {}, Occupancy: {:.2}%, Canvas Area: {} px², Tile Area: {} px²",
            self.num_sheets,
            self.num_tiles,
            self.occupancy * 100.0,
            self.total_canvas_area,
            self.used_tile_area,
        )
    }

    /// Transparent padding in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_canvas_area.saturating_sub(self.used_tile_area)
    }
}
