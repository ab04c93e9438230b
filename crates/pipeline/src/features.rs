//! Feature stack assembly
//!
//! Builds the model input for one tile from the seasonal statistical
//! composites covering it. Each of the twelve source measurements is read
//! for both semesters of the tile's year, aligned onto the tile grid and
//! stacked under a season-suffixed band name (`blue_S1`, `blue_S2`, ...).
//!
//! A tile with no contributing datasets at all is a valid skip condition
//! and yields `Ok(None)`. A tile where only part of the required inputs
//! resolve is a configuration error and fails fast.

use crate::error::{PipelineError, Result};
use cropmask_core::io::read_geotiff;
use cropmask_core::{FeatureStack, GeoBox, Period, Raster, Semester, Tile};
use std::path::{Path, PathBuf};

/// Source measurements required from each seasonal composite
pub const SOURCE_MEASUREMENTS: [&str; 12] = [
    "blue",
    "green",
    "red",
    "nir",
    "swir_1",
    "swir_2",
    "red_edge_1",
    "red_edge_2",
    "red_edge_3",
    "bcdev",
    "edev",
    "sdev",
];

/// Band name suffixes for the two seasons
pub const SEASON_SUFFIXES: [&str; 2] = ["_S1", "_S2"];

/// A catalogued source dataset covering (part of) a tile.
///
/// Implementations own where the pixels come from; the assembler only
/// needs the dataset's period, its available measurements and a way to
/// read one measurement as a raster on the dataset's native grid.
pub trait SourceDataset: Send + Sync {
    /// Temporal period of the composite
    fn period(&self) -> Period;

    /// Measurement names this dataset can supply
    fn measurements(&self) -> Vec<String>;

    /// Read one measurement on the dataset's native grid
    fn read(&self, measurement: &str) -> cropmask_core::Result<Raster<f32>>;
}

/// File-backed dataset: a directory of single-band `<measurement>.tif`
/// files for one seasonal composite.
#[derive(Debug, Clone)]
pub struct GeoTiffDataset {
    period: Period,
    dir: PathBuf,
}

impl GeoTiffDataset {
    /// Create a dataset rooted at `dir` for the given period
    pub fn new(dir: impl AsRef<Path>, period: Period) -> Self {
        Self {
            period,
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl SourceDataset for GeoTiffDataset {
    fn period(&self) -> Period {
        self.period
    }

    fn measurements(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("tif") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names
    }

    fn read(&self, measurement: &str) -> cropmask_core::Result<Raster<f32>> {
        read_geotiff(self.dir.join(format!("{measurement}.tif")))
    }
}

/// Nearest-neighbour resampling of a source raster onto a tile grid.
///
/// The source CRS, when declared, must match the target grid; this
/// pipeline aligns grids, it does not reproject between reference systems.
/// Cells falling outside the source extent, and source no-data cells,
/// become NaN.
pub fn resample_nearest(src: &Raster<f32>, target: &GeoBox) -> cropmask_core::Result<Raster<f32>> {
    if let Some(crs) = src.crs() {
        if !crs.is_equivalent(target.crs()) {
            return Err(cropmask_core::Error::CrsMismatch(
                target.crs().identifier(),
                crs.identifier(),
            ));
        }
    }

    let (rows, cols) = target.shape();
    let (src_rows, src_cols) = src.shape();
    let mut out = Raster::on(target, f32::NAN);
    out.set_nodata(Some(f32::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = target.pixel_to_geo(col, row);
            let (fc, fr) = src.transform().geo_to_pixel(x, y);
            let (sc, sr) = (fc.floor(), fr.floor());
            if sc < 0.0 || sr < 0.0 || sc >= src_cols as f64 || sr >= src_rows as f64 {
                continue;
            }
            let value = src.get(sr as usize, sc as usize)?;
            if !src.is_nodata(value) {
                out.set(row, col, value)?;
            }
        }
    }

    Ok(out)
}

/// Assemble the two-season feature stack for a tile.
///
/// Returns `Ok(None)` when no dataset contributes to the tile's year; the
/// caller treats that as "tile skipped". Partial coverage (one season
/// present, or a season missing a required measurement) is fatal.
pub fn assemble(
    tile: &Tile,
    datasets: &[Box<dyn SourceDataset>],
    measurements: &[&str],
) -> Result<Option<FeatureStack>> {
    let year = tile.period().year();

    let season_datasets = |half: Semester| -> Vec<&dyn SourceDataset> {
        datasets
            .iter()
            .map(|d| d.as_ref())
            .filter(|d| d.period() == Period::Semester { year, half })
            .collect()
    };

    let seasons = [
        (season_datasets(Semester::First), SEASON_SUFFIXES[0]),
        (season_datasets(Semester::Second), SEASON_SUFFIXES[1]),
    ];

    if seasons.iter().all(|(datasets, _)| datasets.is_empty()) {
        return Ok(None);
    }
    if let Some((_, suffix)) = seasons.iter().find(|(datasets, _)| datasets.is_empty()) {
        return Err(PipelineError::FeatureSchemaMismatch(format!(
            "no datasets cover season '{suffix}' of {year} for tile {tile}"
        )));
    }

    let mut stack = FeatureStack::new(*tile.geobox());

    for (datasets, suffix) in &seasons {
        for &measurement in measurements {
            let dataset = datasets
                .iter()
                .find(|d| d.measurements().iter().any(|m| m == measurement))
                .ok_or_else(|| {
                    PipelineError::FeatureSchemaMismatch(format!(
                        "required band '{measurement}' not resolvable for season '{suffix}'"
                    ))
                })?;

            let raster = dataset.read(measurement).map_err(|e| {
                PipelineError::FeatureSchemaMismatch(format!(
                    "cannot read band '{measurement}' for season '{suffix}': {e}"
                ))
            })?;

            let aligned = resample_nearest(&raster, tile.geobox()).map_err(|e| {
                PipelineError::FeatureSchemaMismatch(format!(
                    "band '{measurement}{suffix}' does not align with the tile grid: {e}"
                ))
            })?;

            stack.insert(format!("{measurement}{suffix}"), aligned.into_array())?;
        }
    }

    Ok(Some(stack))
}
