//! Cropmask CLI - tile-based crop mask prediction

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span, Level};
use tracing_subscriber::FmtSubscriber;

use cropmask_core::io::read_geotiff;
use cropmask_core::{Period, Raster, Semester, Tile};
use cropmask_pipeline::{
    feature_columns_from_header, write_outputs, GeoTiffDataset, PluginRegistry, PredictionConfig,
    SourceDataset, TileOutcome, TilePredictionPipeline, MANIFEST_NON_FEATURE_TOKENS,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cropmask")]
#[command(author, version, about = "Tile-based crop mask prediction", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction pipeline for one or more tiles
    Predict {
        /// Pipeline configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Year to predict
        #[arg(short, long)]
        year: u16,
        /// Tile indices as x,y pairs (e.g. 49,25)
        #[arg(short, long, required = true, num_args = 1..)]
        tiles: Vec<String>,
        /// Root directory of seasonal inputs
        /// (layout: <inputs>/<x>/<y>/{S1,S2}/<measurement>.tif)
        #[arg(short, long)]
        inputs: PathBuf,
    },
    /// Resolve and print the feature columns of a training-data manifest
    Columns {
        /// Training-data manifest file
        manifest: PathBuf,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    match cli.command {
        Commands::Predict {
            config,
            year,
            tiles,
            inputs,
        } => predict(&config, year, &tiles, &inputs),
        Commands::Columns { manifest } => columns(&manifest),
        Commands::Info { input } => info_cmd(&input),
    }
}

// ─── predict ────────────────────────────────────────────────────────────

fn predict(config_path: &Path, year: u16, tiles: &[String], inputs: &Path) -> Result<()> {
    let started = Instant::now();

    let config = PredictionConfig::load_from_path(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let indices: Vec<(i32, i32)> = tiles
        .iter()
        .map(|pair| parse_tile_index(pair))
        .collect::<Result<_>>()?;

    // Explicit plugin registration at process start
    let span = info_span!("cropmask", product = %config.product.name, year);
    let _guard = span.enter();

    let mut registry = PluginRegistry::new();
    registry
        .register("pred-gm-s2", TilePredictionPipeline::factory)
        .context("Failed to register prediction plugin")?;
    let plugin = registry
        .create("pred-gm-s2", &config)
        .context("Failed to construct prediction plugin")?;

    info!(tiles = indices.len(), inputs = %inputs.display(), "starting prediction");

    let bar = ProgressBar::new(indices.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} tiles {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // One synchronous pipeline invocation per tile; rayon provides the
    // across-tile parallelism and the loaded model is shared by the plugin.
    let results: Vec<(String, std::result::Result<TileOutcome, String>)> = indices
        .par_iter()
        .map(|&(x, y)| {
            let tile = Tile::new(x, y, Period::Year(year), config.grid.geobox_for_tile(x, y));
            let label = tile.to_string();
            let datasets = discover_datasets(inputs, &tile, year);

            let outcome = plugin
                .run(&tile, &datasets)
                .and_then(|outcome| match outcome {
                    TileOutcome::Completed(outputs) => {
                        write_outputs(
                            Path::new(&config.output.root),
                            &config.product.name,
                            &config.product.version,
                            &tile,
                            &outputs,
                        )?;
                        Ok(TileOutcome::Completed(outputs))
                    }
                    skipped => Ok(skipped),
                })
                .map_err(|e| e.to_string());

            bar.inc(1);
            (label, outcome)
        })
        .collect();

    bar.finish_and_clear();

    let mut completed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (label, outcome) in &results {
        match outcome {
            Ok(TileOutcome::Completed(_)) => completed += 1,
            Ok(TileOutcome::Skipped) => {
                skipped += 1;
                info!(tile = %label, "skipped (no input data)");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(tile = %label, error = %e, "tile failed");
            }
        }
    }

    info!(
        completed,
        skipped,
        failed,
        elapsed = ?started.elapsed(),
        "prediction finished"
    );

    if failed > 0 {
        bail!("{failed} of {} tiles failed", results.len());
    }
    Ok(())
}

fn parse_tile_index(pair: &str) -> Result<(i32, i32)> {
    let (x, y) = pair
        .split_once(',')
        .with_context(|| format!("Invalid tile index '{pair}', expected x,y"))?;
    Ok((
        x.trim().parse().with_context(|| format!("Invalid tile x '{x}'"))?,
        y.trim().parse().with_context(|| format!("Invalid tile y '{y}'"))?,
    ))
}

/// File-based stand-in for the dataset catalogue: seasonal composites are
/// directories of per-measurement GeoTIFFs. Absent directories simply
/// contribute no datasets, which the pipeline reports as a skipped tile.
fn discover_datasets(inputs: &Path, tile: &Tile, year: u16) -> Vec<Box<dyn SourceDataset>> {
    let tile_dir = inputs.join(tile.x_label()).join(tile.y_label());
    let seasons = [("S1", Semester::First), ("S2", Semester::Second)];

    let mut datasets: Vec<Box<dyn SourceDataset>> = Vec::new();
    for (name, half) in seasons {
        let dir = tile_dir.join(name);
        if dir.is_dir() {
            datasets.push(Box::new(GeoTiffDataset::new(
                dir,
                Period::Semester { year, half },
            )));
        }
    }
    datasets
}

// ─── columns ────────────────────────────────────────────────────────────

fn columns(manifest: &Path) -> Result<()> {
    let content = std::fs::read_to_string(manifest)
        .with_context(|| format!("Cannot read manifest {}", manifest.display()))?;
    let header = content
        .lines()
        .next()
        .context("Manifest is empty")?;

    let columns = feature_columns_from_header(header, MANIFEST_NON_FEATURE_TOKENS);
    if columns.is_empty() {
        bail!(
            "No feature columns remain after dropping {} leading tokens",
            MANIFEST_NON_FEATURE_TOKENS
        );
    }

    println!(
        "{} feature columns ({} leading tokens dropped):",
        columns.len(),
        MANIFEST_NON_FEATURE_TOKENS
    );
    for (idx, column) in columns.iter().enumerate() {
        println!("{idx:4}  {column}");
    }
    Ok(())
}

// ─── info ───────────────────────────────────────────────────────────────

fn info_cmd(input: &Path) -> Result<()> {
    let raster: Raster<f32> = read_geotiff(input)
        .with_context(|| format!("Cannot read {}", input.display()))?;

    let (rows, cols) = raster.shape();
    let gt = raster.transform();

    println!("File:       {}", input.display());
    println!("Size:       {cols} x {rows}");
    println!("Origin:     ({}, {})", gt.origin_x, gt.origin_y);
    println!("Cell size:  {}", gt.cell_size());
    match raster.crs() {
        Some(crs) => println!("CRS:        {crs}"),
        None => println!("CRS:        unknown"),
    }
    match raster.nodata() {
        Some(nd) => println!("NoData:     {nd}"),
        None => println!("NoData:     not set"),
    }
    println!("Valid:      {} cells", raster.valid_count());

    Ok(())
}
