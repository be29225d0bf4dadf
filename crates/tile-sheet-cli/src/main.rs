use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tile_sheet_core::prelude::*;
use tile_sheet_core::{
    BatchOutcome, SheetRestore, metadata_path_for, plan_batches, restore_directory_with_progress,
    uniform_target_height,
};
use tile_sheet_core::normalize::scaled_width;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "tile-sheet",
    about = "Pack images into grid sheets and restore them",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack images into numbered sheets (PNG + JSON)
    Pack(PackArgs),
    /// Restore every sheet found in a directory
    Restore(RestoreArgs),
    /// Restore a single sheet
    RestoreOne(RestoreOneArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input files or directories
    #[arg(required = true, help_heading = "Input/Output")]
    inputs: Vec<PathBuf>,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file path (present keys override CLI values)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Target number of images per sheet
    #[arg(long, default_value_t = 9, help_heading = "Layout")]
    per_sheet: usize,
    /// Scale mode: native | uniform-height
    #[arg(long, default_value = "native", help_heading = "Layout")]
    mode: String,
    /// Sheet name prefix (files are <prefix><n>.png/.json)
    #[arg(long, default_value = "sheet", help_heading = "Layout")]
    prefix: String,
    /// Pack independent batches in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    parallel: bool,

    // Export
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: compute grouping and layout but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct RestoreOpts {
    /// Output directory
    #[arg(short, long, default_value = "restored", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file path (present keys override CLI values)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Output format: original | png | jpg | bmp | tiff | webp | gif | tga
    #[arg(long, default_value = "original", help_heading = "Output")]
    format: String,
    /// Marker appended to restored file stems
    #[arg(long, default_value = "s", help_heading = "Output")]
    suffix: String,
    /// JPEG quality (1..=100)
    #[arg(long, default_value_t = 90, help_heading = "Output")]
    jpeg_quality: u8,
    /// Restore sheets in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Output")]
    parallel: bool,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
}

#[derive(Parser, Debug, Clone)]
struct RestoreArgs {
    /// Directory holding sheet PNG + JSON pairs
    #[arg(help_heading = "Input/Output")]
    sheets_dir: PathBuf,
    #[command(flatten)]
    opts: RestoreOpts,
}

#[derive(Parser, Debug, Clone)]
struct RestoreOneArgs {
    /// Sheet image
    #[arg(help_heading = "Input/Output")]
    sheet: PathBuf,
    /// Metadata file (defaults to the sheet path with a .json extension)
    #[arg(long, help_heading = "Input/Output")]
    metadata: Option<PathBuf>,
    #[command(flatten)]
    opts: RestoreOpts,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let show_progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Pack(args) => run_pack(args, show_progress),
        Commands::Restore(args) => run_restore(args, show_progress),
        Commands::RestoreOne(args) => run_restore_one(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let base = SheetConfig {
        tiles_per_batch: cli.per_sheet,
        scale_mode: cli
            .mode
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown scale mode: {}", cli.mode))?,
        sheet_prefix: cli.prefix.clone(),
        parallel: cli.parallel,
        ..Default::default()
    };
    let cfg = merge_config(base, cli.config.as_deref())?;

    if cli.print_config {
        return print_config(&cfg, &cli.print_config_format);
    }
    cfg.validate()?;

    let paths = gather_inputs(&cli.inputs, &cli.include, &cli.exclude)?;
    if paths.is_empty() {
        anyhow::bail!("no input images found");
    }
    info!(count = paths.len(), "collected input images");

    if cli.dry_run {
        return run_dry(&paths, &cfg);
    }

    let bar = progress_bar(show_progress, "packing")?;
    let report = tile_sheet_core::pack_files_with_progress(&paths, &cli.out_dir, &cfg, |o| {
        tick(&bar, &batch_message(o));
    })
    .with_context(|| format!("pack into {}", cli.out_dir.display()))?;
    if let Some(b) = &bar {
        b.finish_and_clear();
    }

    for o in &report.outcomes {
        match &o.result {
            Ok(a) => info!(
                sheet = %a.image_path.display(),
                tiles = a.records.len(),
                "wrote sheet"
            ),
            Err(e) => error!(batch = o.batch_index, error = %e, "batch failed"),
        }
    }
    let stats = report.stats();
    info!("{}", stats.summary());
    if let Some(path) = &cli.export_stats {
        write_stats(path, &stats)?;
    }
    if report.failed() > 0 {
        anyhow::bail!(
            "{} of {} batches failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn run_dry(paths: &[PathBuf], cfg: &SheetConfig) -> anyhow::Result<()> {
    let batches = plan_batches(paths, cfg)?;
    let target_h = uniform_target_height(
        cfg,
        batches.iter().flat_map(|b| b.items.iter().map(|s| s.height)),
    );
    for batch in &batches {
        let sizes: Vec<(u32, u32)> = batch
            .items
            .iter()
            .map(|s| match target_h {
                Some(h) => (scaled_width(s.width, s.height, h), h),
                None => (s.width, s.height),
            })
            .collect();
        let layout = GridLayout::compute(&sizes)?;
        info!(
            batch = batch.index,
            tiles = batch.len(),
            cols = layout.cols,
            rows = layout.rows,
            width = layout.width(),
            height = layout.height(),
            "dry run"
        );
    }
    info!(sheets = batches.len(), "dry run: nothing written");
    Ok(())
}

fn run_restore(cli: &RestoreArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = restore_config(&cli.opts)?;
    if cli.opts.print_config {
        return print_config(&cfg, &cli.opts.print_config_format);
    }

    let bar = progress_bar(show_progress, "restoring")?;
    let results = restore_directory_with_progress(&cli.sheets_dir, &cli.opts.out_dir, &cfg, |r| {
        tick(&bar, &sheet_message(r));
    })
    .with_context(|| format!("restore from {}", cli.sheets_dir.display()))?;
    if let Some(b) = &bar {
        b.finish_and_clear();
    }

    let mut failed = 0usize;
    let (mut written, mut skipped) = (0usize, 0usize);
    for r in &results {
        match &r.result {
            Ok(report) => {
                if report.is_skipped() {
                    skipped += 1;
                }
                written += report.written();
                failed += report.failed();
            }
            Err(e) => {
                error!(sheet = %r.image_path.display(), error = %e, "sheet failed");
                failed += 1;
            }
        }
    }
    info!(
        sheets = results.len(),
        skipped, written, failed, "restore finished"
    );
    if failed > 0 {
        anyhow::bail!("{failed} restore failures");
    }
    Ok(())
}

fn run_restore_one(cli: &RestoreOneArgs) -> anyhow::Result<()> {
    let cfg = restore_config(&cli.opts)?;
    if cli.opts.print_config {
        return print_config(&cfg, &cli.opts.print_config_format);
    }
    let metadata = cli
        .metadata
        .clone()
        .unwrap_or_else(|| metadata_path_for(&cli.sheet));
    let report = restore_sheet(&cli.sheet, &metadata, &cli.opts.out_dir, &cfg)
        .with_context(|| format!("restore {}", cli.sheet.display()))?;
    if report.is_skipped() {
        info!("all outputs already exist, nothing to do");
    }
    if let RestoreReport::Restored { outcomes } = &report {
        for o in outcomes {
            if let Err(e) = &o.result {
                error!(filename = %o.filename, error = %e, "record failed");
            }
        }
    }
    if report.failed() > 0 {
        anyhow::bail!("{} records failed", report.failed());
    }
    Ok(())
}

fn restore_config(opts: &RestoreOpts) -> anyhow::Result<SheetConfig> {
    let base = SheetConfig {
        restore_suffix: opts.suffix.clone(),
        output_format: opts
            .format
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid output format: {:?}", opts.format))?,
        jpeg_quality: opts.jpeg_quality,
        parallel: opts.parallel,
        ..Default::default()
    };
    let cfg = merge_config(base, opts.config.as_deref())?;
    cfg.validate()?;
    Ok(cfg)
}

fn print_config(cfg: &SheetConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "yaml" => println!("{}", serde_yaml::to_string(cfg)?),
        _ => println!("{}", serde_json::to_string_pretty(cfg)?),
    }
    Ok(())
}

fn write_stats(path: &Path, stats: &SheetStats) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(path, json).with_context(|| format!("write stats {}", path.display()))?;
    info!(path = %path.display(), "exported stats");
    Ok(())
}

fn progress_bar(enabled: bool, verb: &str) -> anyhow::Result<Option<ProgressBar>> {
    if !enabled {
        return Ok(None);
    }
    let b = ProgressBar::new_spinner();
    b.set_style(ProgressStyle::with_template(&format!(
        "{{spinner:.green}} {verb} {{pos}} [{{elapsed_precise}}] {{wide_msg}}"
    ))?);
    Ok(Some(b))
}

fn tick(bar: &Option<ProgressBar>, msg: &str) {
    if let Some(b) = bar {
        b.set_message(msg.to_string());
        b.inc(1);
    }
}

fn batch_message(o: &BatchOutcome) -> String {
    match &o.result {
        Ok(a) => a
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Err(_) => format!("batch {} failed", o.batch_index),
    }
}

fn sheet_message(r: &SheetRestore) -> String {
    r.image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expands inputs in the given order; directory contents are sorted by path.
fn gather_inputs(
    inputs: &[PathBuf],
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    for path in inputs {
        if path.is_file() {
            if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_image(path) {
                list.push(path.to_path_buf());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file()
                    && !should_skip(p, inc_set.as_ref(), exc_set.as_ref())
                    && is_image(p)
                {
                    list.push(p.to_path_buf());
                }
            }
        } else {
            warn!(path = %path.display(), "input does not exist, skipping");
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob {pat:?}"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(
            ext.as_str(),
            "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif" | "tif" | "tiff" | "webp"
        )
    )
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// YAML overlay; keys that are present replace the CLI values.
#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    tiles_per_batch: Option<usize>,
    scale_mode: Option<String>,
    sheet_prefix: Option<String>,
    restore_suffix: Option<String>,
    output_format: Option<String>,
    default_dpi: Option<[f64; 2]>,
    jpeg_quality: Option<u8>,
    parallel: Option<bool>,
}

impl YamlConfig {
    fn apply(self, mut cfg: SheetConfig) -> anyhow::Result<SheetConfig> {
        if let Some(v) = self.tiles_per_batch {
            cfg.tiles_per_batch = v;
        }
        if let Some(v) = self.scale_mode {
            cfg.scale_mode = v
                .parse::<ScaleMode>()
                .map_err(|_| anyhow::anyhow!("unknown scale_mode: {v}"))?;
        }
        if let Some(v) = self.sheet_prefix {
            cfg.sheet_prefix = v;
        }
        if let Some(v) = self.restore_suffix {
            cfg.restore_suffix = v;
        }
        if let Some(v) = self.output_format {
            cfg.output_format = v
                .parse::<OutputFormatPolicy>()
                .map_err(|_| anyhow::anyhow!("invalid output_format: {v:?}"))?;
        }
        if let Some([x, y]) = self.default_dpi {
            cfg.default_dpi = (x, y);
        }
        if let Some(v) = self.jpeg_quality {
            cfg.jpeg_quality = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        Ok(cfg)
    }
}

fn merge_config(base: SheetConfig, path: Option<&Path>) -> anyhow::Result<SheetConfig> {
    let Some(path) = path else {
        return Ok(base);
    };
    let file =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let y: YamlConfig =
        serde_yaml::from_str(&file).with_context(|| format!("parse config {}", path.display()))?;
    y.apply(base)
}
