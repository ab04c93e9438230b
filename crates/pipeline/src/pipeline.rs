//! The composed per-tile prediction pipeline
//!
//! `TilePredictionPipeline` wires feature assembly, model inference and
//! post-processing behind the [`PredictionPlugin`] trait. The trained
//! model is loaded lazily on first use and cached for the lifetime of the
//! pipeline; it is the only state shared across tiles, and it is
//! immutable. Observability is an explicit `tracing::Span` handed in by
//! the caller, not a process-wide logger.

use crate::config::PredictionConfig;
use crate::error::{PipelineError, Result};
use crate::features::{assemble, resample_nearest, SourceDataset, SOURCE_MEASUREMENTS};
use crate::inference::{predict, InferenceParams, PredictionResult};
use crate::loader::ModelLoader;
use crate::model::TrainedModel;
use crate::plugin::PredictionPlugin;
use crate::postprocess::{
    postprocess, AncillaryLayers, OutputLayers, PostProcessParams, ANCILLARY_RAINFALL,
    ANCILLARY_SLOPE,
};
use cropmask_core::io::read_geotiff;
use cropmask_core::{FeatureStack, GeoBox, Tile};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Output measurement names, in emission order
pub const OUTPUT_MEASUREMENT_NAMES: [&str; 3] = ["mask", "prob", "filtered"];

/// Two-season geomedian crop mask prediction pipeline
pub struct TilePredictionPipeline {
    config: PredictionConfig,
    loader: ModelLoader,
    model: Mutex<Option<Arc<TrainedModel>>>,
    span: tracing::Span,
}

impl TilePredictionPipeline {
    /// Create a pipeline from validated configuration.
    ///
    /// `span` is the observability context all pipeline events are
    /// recorded under.
    pub fn new(config: PredictionConfig, span: tracing::Span) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loader: ModelLoader::new(),
            model: Mutex::new(None),
            span,
        })
    }

    /// Registry factory; events attach to the caller's current span
    pub fn factory(config: &PredictionConfig) -> Result<Box<dyn PredictionPlugin>> {
        Ok(Box::new(Self::new(
            config.clone(),
            tracing::Span::current(),
        )?))
    }

    /// The pipeline configuration
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// The trained model, loading and caching it on first use.
    ///
    /// Skipped tiles never reach this point, so a process that only sees
    /// empty tiles never fetches the artifact.
    pub fn model(&self) -> Result<Arc<TrainedModel>> {
        let mut cached = self
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = cached.as_ref() {
            return Ok(model.clone());
        }

        let _guard = self.span.enter();
        info!(
            model = %self.config.model.path,
            manifest = %self.config.model.manifest_path,
            "loading trained model"
        );
        let model = Arc::new(
            self.loader
                .load(&self.config.model.path, &self.config.model.manifest_path)?,
        );
        info!(
            columns = model.columns().len(),
            classes = model.num_classes(),
            "model ready"
        );
        *cached = Some(model.clone());
        Ok(model)
    }

    /// Read and align the ancillary layers the configured corrections need
    fn load_ancillary(&self, geobox: &GeoBox) -> Result<AncillaryLayers> {
        let mut layers = AncillaryLayers::new();

        for correction in self.config.corrections() {
            let path = match correction.layer.as_str() {
                ANCILLARY_SLOPE => self.config.ancillary.slope_path.as_deref(),
                ANCILLARY_RAINFALL => self.config.ancillary.rainfall_path.as_deref(),
                _ => None,
            }
            .ok_or_else(|| PipelineError::AncillaryDataMissing {
                layer: correction.layer.clone(),
            })?;

            let raster = read_geotiff::<f32, _>(path).map_err(|e| {
                let _guard = self.span.enter();
                tracing::error!(layer = %correction.layer, path, error = %e, "ancillary read failed");
                PipelineError::AncillaryDataMissing {
                    layer: correction.layer.clone(),
                }
            })?;
            let aligned = resample_nearest(&raster, geobox)?;
            layers.insert(correction.layer, aligned);
        }

        Ok(layers)
    }
}

impl PredictionPlugin for TilePredictionPipeline {
    fn measurements(&self) -> &'static [&'static str] {
        &OUTPUT_MEASUREMENT_NAMES
    }

    fn input_data(
        &self,
        tile: &Tile,
        datasets: &[Box<dyn SourceDataset>],
    ) -> Result<Option<FeatureStack>> {
        let _guard = self.span.enter();
        let stack = assemble(tile, datasets, &SOURCE_MEASUREMENTS)?;
        match &stack {
            Some(stack) => info!(tile = %tile, bands = stack.len(), "feature stack assembled"),
            None => info!(tile = %tile, "no input data, tile skipped"),
        }
        Ok(stack)
    }

    fn predict(&self, stack: &FeatureStack) -> Result<PredictionResult> {
        let model = self.model()?;
        let params = InferenceParams {
            chunk_rows: self.config.inference.chunk_rows,
        };
        predict(stack, &model, &params)
    }

    fn reduce(&self, tile: &Tile, prediction: PredictionResult) -> Result<OutputLayers> {
        let model = self.model()?;
        let ancillary = self.load_ancillary(&prediction.geobox)?;
        let params = PostProcessParams {
            mode_filter_radius: self.config.postprocess.mode_filter_radius,
            corrections: self.config.corrections(),
        };
        let outputs = postprocess(&prediction, &ancillary, &params, model.num_classes())?;

        let _guard = self.span.enter();
        info!(
            tile = %tile,
            valid = outputs.mask.valid_count(),
            "tile post-processed"
        );
        Ok(outputs)
    }
}
