//! Typed pipeline configuration
//!
//! Every named option the pipeline consumes is an explicit, typed field,
//! deserialized from a TOML file and validated eagerly at load time. A
//! missing or malformed key fails construction, not the tile that first
//! happens to look it up.

use crate::error::{PipelineError, Result};
use crate::postprocess::{Correction, CorrectionRule, ANCILLARY_RAINFALL, ANCILLARY_SLOPE};
use config::{Config, File};
use cropmask_core::{Crs, GeoBox, GeoTransform};
use serde::Deserialize;
use std::path::Path;

/// Main pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    pub product: ProductConfig,
    pub grid: GridConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub ancillary: AncillaryConfig,
    #[serde(default)]
    pub postprocess: PostProcessConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub output: OutputConfig,
}

/// Output product identity
#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    /// Product name, e.g. `crop_mask_eastern`
    pub name: String,
    /// Product version, e.g. `1.0.0`
    pub version: String,
}

/// The fixed tile grid predictions are produced on
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// X coordinate of the grid origin (lower-left corner)
    pub origin_x: f64,
    /// Y coordinate of the grid origin (lower-left corner)
    pub origin_y: f64,
    /// Cell size in CRS units
    pub resolution: f64,
    /// Tile width/height in pixels
    pub tile_size: usize,
    /// EPSG code of the grid CRS
    pub epsg: u32,
}

impl GridConfig {
    /// Grid definition for the tile at index (x, y).
    ///
    /// Tile indices count from the grid origin, x eastward and y northward;
    /// the returned transform is north-up (origin at the tile's upper-left
    /// corner).
    pub fn geobox_for_tile(&self, x: i32, y: i32) -> GeoBox {
        let span = self.tile_size as f64 * self.resolution;
        let origin_x = self.origin_x + x as f64 * span;
        let origin_y = self.origin_y + (y as f64 + 1.0) * span;
        GeoBox::new(
            self.tile_size,
            self.tile_size,
            GeoTransform::new(origin_x, origin_y, self.resolution, -self.resolution),
            Crs::from_epsg(self.epsg),
        )
    }
}

/// Trained model artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Serialized estimator, local path or `s3://bucket/key`
    pub path: String,
    /// Training-data manifest whose header carries the feature columns
    pub manifest_path: String,
}

/// Ancillary raster locations used by post-processing corrections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AncillaryConfig {
    /// Terrain slope layer (degrees)
    pub slope_path: Option<String>,
    /// Seasonal rainfall layer (mm)
    pub rainfall_path: Option<String>,
}

/// Post-processing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PostProcessConfig {
    /// Mode filter window radius in pixels (window = 2*radius + 1)
    #[serde(default = "default_mode_filter_radius")]
    pub mode_filter_radius: usize,
    /// Force non-crop where slope exceeds this many degrees
    pub slope_threshold: Option<f32>,
    /// Force non-crop where seasonal rainfall falls below this many mm
    pub rainfall_threshold: Option<f32>,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            mode_filter_radius: default_mode_filter_radius(),
            slope_threshold: None,
            rainfall_threshold: None,
        }
    }
}

fn default_mode_filter_radius() -> usize {
    1
}

/// Inference resource parameters
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Rows per inference chunk; bounds peak memory, never the result
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            chunk_rows: default_chunk_rows(),
        }
    }
}

fn default_chunk_rows() -> usize {
    256
}

/// Where output layers and metadata are written
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory (or prefix) of the output tree
    pub root: String,
}

impl PredictionConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Validate the configuration, failing fast on anything malformed
    pub fn validate(&self) -> Result<()> {
        if self.product.name.is_empty() {
            return Err(PipelineError::Config("product.name is empty".into()));
        }
        if self.product.version.is_empty() {
            return Err(PipelineError::Config("product.version is empty".into()));
        }
        if self.grid.resolution <= 0.0 {
            return Err(PipelineError::Config(format!(
                "grid.resolution must be positive, got {}",
                self.grid.resolution
            )));
        }
        if self.grid.tile_size == 0 {
            return Err(PipelineError::Config("grid.tile_size must be > 0".into()));
        }
        if self.model.path.is_empty() {
            return Err(PipelineError::Config("model.path is empty".into()));
        }
        if self.model.manifest_path.is_empty() {
            return Err(PipelineError::Config("model.manifest_path is empty".into()));
        }
        if self.inference.chunk_rows == 0 {
            return Err(PipelineError::Config(
                "inference.chunk_rows must be > 0".into(),
            ));
        }
        if self.postprocess.slope_threshold.is_some() && self.ancillary.slope_path.is_none() {
            return Err(PipelineError::Config(
                "postprocess.slope_threshold set but ancillary.slope_path missing".into(),
            ));
        }
        if self.postprocess.rainfall_threshold.is_some() && self.ancillary.rainfall_path.is_none() {
            return Err(PipelineError::Config(
                "postprocess.rainfall_threshold set but ancillary.rainfall_path missing".into(),
            ));
        }
        if self.output.root.is_empty() {
            return Err(PipelineError::Config("output.root is empty".into()));
        }
        Ok(())
    }

    /// The post-processing corrections this configuration enables
    pub fn corrections(&self) -> Vec<Correction> {
        let mut corrections = Vec::new();
        if let Some(threshold) = self.postprocess.slope_threshold {
            corrections.push(Correction {
                layer: ANCILLARY_SLOPE.to_string(),
                rule: CorrectionRule::ExceedsThreshold(threshold),
            });
        }
        if let Some(threshold) = self.postprocess.rainfall_threshold {
            corrections.push(Correction {
                layer: ANCILLARY_RAINFALL.to_string(),
                rule: CorrectionRule::BelowThreshold(threshold),
            });
        }
        corrections
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            product: ProductConfig {
                name: "crop_mask".to_string(),
                version: "1.0.0".to_string(),
            },
            grid: GridConfig {
                origin_x: 0.0,
                origin_y: 0.0,
                resolution: 20.0,
                tile_size: 4800,
                epsg: 6933,
            },
            model: ModelConfig {
                path: "model.json".to_string(),
                manifest_path: "training_data.txt".to_string(),
            },
            ancillary: AncillaryConfig::default(),
            postprocess: PostProcessConfig::default(),
            inference: InferenceConfig::default(),
            output: OutputConfig {
                root: "outputs".to_string(),
            },
        }
    }
}
