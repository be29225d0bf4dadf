use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How tiles are sized before layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Tiles are placed at their native size; restoration is pixel exact.
    Native,
    /// Every tile of a run is resampled (Lanczos3) to the run's tallest
    /// height. Only the resampled size is recoverable.
    UniformHeight,
}

impl FromStr for ScaleMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "none" => Ok(Self::Native),
            "uniform_height" | "uniform-height" | "uniform" => Ok(Self::UniformHeight),
            _ => Err(()),
        }
    }
}

/// Extension policy for restored tiles. One choice per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormatPolicy {
    /// Use the record's stored `format`, falling back to `png`.
    Original,
    /// Always write this extension (e.g. `png`).
    Fixed(String),
}

impl OutputFormatPolicy {
    /// Output extension for a record whose stored format is `record_format`.
    pub fn extension_for(&self, record_format: Option<&str>) -> String {
        match self {
            Self::Original => record_format
                .filter(|f| !f.is_empty())
                .unwrap_or("png")
                .to_ascii_lowercase(),
            Self::Fixed(ext) => ext.to_ascii_lowercase(),
        }
    }
}

impl FromStr for OutputFormatPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        match s.to_ascii_lowercase().as_str() {
            "" => Err(()),
            "original" | "source" => Ok(Self::Original),
            ext => Ok(Self::Fixed(ext.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Target number of tiles per composite.
    #[serde(default = "default_tiles_per_batch")]
    pub tiles_per_batch: usize,
    #[serde(default = "default_scale_mode")]
    pub scale_mode: ScaleMode,
    /// Composite artifacts are named `<prefix><n>.png` / `<prefix><n>.json`.
    #[serde(default = "default_sheet_prefix")]
    pub sheet_prefix: String,
    /// Marker appended to the stem of restored tiles.
    #[serde(default = "default_restore_suffix")]
    pub restore_suffix: String,
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormatPolicy,
    /// DPI written when a record carries none.
    #[serde(default = "default_dpi")]
    pub default_dpi: (f64, f64),
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Process independent batches concurrently when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            tiles_per_batch: default_tiles_per_batch(),
            scale_mode: default_scale_mode(),
            sheet_prefix: default_sheet_prefix(),
            restore_suffix: default_restore_suffix(),
            output_format: default_output_format(),
            default_dpi: default_dpi(),
            jpeg_quality: default_jpeg_quality(),
            parallel: false,
        }
    }
}

impl SheetConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns `InvalidInput` if:
    /// - `tiles_per_batch` is zero
    /// - the sheet prefix is empty or contains a path separator
    /// - the restore suffix contains a path separator
    /// - a fixed output format has no encoder
    /// - the default DPI or JPEG quality is out of range
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::TileSheetError;

        if self.tiles_per_batch == 0 {
            return Err(TileSheetError::InvalidInput(
                "tiles_per_batch must be a positive integer".into(),
            ));
        }
        if self.sheet_prefix.is_empty() {
            return Err(TileSheetError::InvalidInput(
                "sheet_prefix must not be empty".into(),
            ));
        }
        if has_separator(&self.sheet_prefix) {
            return Err(TileSheetError::InvalidInput(format!(
                "sheet_prefix contains a path separator: {:?}",
                self.sheet_prefix
            )));
        }
        if has_separator(&self.restore_suffix) {
            return Err(TileSheetError::InvalidInput(format!(
                "restore_suffix contains a path separator: {:?}",
                self.restore_suffix
            )));
        }
        if let OutputFormatPolicy::Fixed(ext) = &self.output_format {
            if crate::codec::output_format(ext).is_none() {
                return Err(TileSheetError::InvalidInput(format!(
                    "unsupported output format: {ext}"
                )));
            }
        }
        let (dx, dy) = self.default_dpi;
        if !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0) {
            return Err(TileSheetError::InvalidInput(format!(
                "default_dpi must be positive, got ({dx}, {dy})"
            )));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(TileSheetError::InvalidInput(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

fn has_separator(s: &str) -> bool {
    s.contains('/') || s.contains('\\')
}

fn default_tiles_per_batch() -> usize {
    9
}
fn default_scale_mode() -> ScaleMode {
    ScaleMode::Native
}
fn default_sheet_prefix() -> String {
    "sheet".into()
}
fn default_restore_suffix() -> String {
    "s".into()
}
fn default_output_format() -> OutputFormatPolicy {
    OutputFormatPolicy::Original
}
fn default_dpi() -> (f64, f64) {
    (72.0, 72.0)
}
fn default_jpeg_quality() -> u8 {
    90
}

/// Builder for `SheetConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SheetConfigBuilder {
    cfg: SheetConfig,
}

impl SheetConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SheetConfig::default(),
        }
    }
    pub fn tiles_per_batch(mut self, v: usize) -> Self {
        self.cfg.tiles_per_batch = v;
        self
    }
    pub fn scale_mode(mut self, v: ScaleMode) -> Self {
        self.cfg.scale_mode = v;
        self
    }
    pub fn sheet_prefix(mut self, v: impl Into<String>) -> Self {
        self.cfg.sheet_prefix = v.into();
        self
    }
    pub fn restore_suffix(mut self, v: impl Into<String>) -> Self {
        self.cfg.restore_suffix = v.into();
        self
    }
    pub fn output_format(mut self, v: OutputFormatPolicy) -> Self {
        self.cfg.output_format = v;
        self
    }
    pub fn default_dpi(mut self, x: f64, y: f64) -> Self {
        self.cfg.default_dpi = (x, y);
        self
    }
    pub fn jpeg_quality(mut self, v: u8) -> Self {
        self.cfg.jpeg_quality = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> SheetConfig {
        self.cfg
    }
}

impl SheetConfig {
    /// Create a fluent builder for `SheetConfig`.
    pub fn builder() -> SheetConfigBuilder {
        SheetConfigBuilder::new()
    }
}
