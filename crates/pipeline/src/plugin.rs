//! Prediction plugin trait and explicit registry
//!
//! The orchestration framework drives tiles through a plugin interface.
//! Registration is explicit: a process maps string keys to factories at
//! startup, nothing is discovered implicitly.

use crate::config::PredictionConfig;
use crate::error::{PipelineError, Result};
use crate::features::SourceDataset;
use crate::inference::PredictionResult;
use crate::postprocess::OutputLayers;
use cropmask_core::{FeatureStack, Tile};
use std::collections::HashMap;

/// Result of running one tile
#[derive(Debug)]
pub enum TileOutcome {
    /// No input data covered the tile; nothing was produced
    Skipped,
    /// The tile was classified and post-processed
    Completed(OutputLayers),
}

impl TileOutcome {
    /// Whether the tile was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, TileOutcome::Skipped)
    }
}

/// A per-tile prediction pipeline as seen by the orchestration layer.
///
/// `run` composes the stages and encodes the skip semantics: when
/// `input_data` finds nothing, the tile is reported skipped and neither
/// the model nor the post-processor is touched.
pub trait PredictionPlugin: Send + Sync {
    /// Names of the output measurements this plugin produces
    fn measurements(&self) -> &'static [&'static str];

    /// Assemble the model input for a tile; `None` means "no data, skip"
    fn input_data(
        &self,
        tile: &Tile,
        datasets: &[Box<dyn SourceDataset>],
    ) -> Result<Option<FeatureStack>>;

    /// Classify an assembled feature stack
    fn predict(&self, stack: &FeatureStack) -> Result<PredictionResult>;

    /// Post-process a raw prediction into the final output layers
    fn reduce(&self, tile: &Tile, prediction: PredictionResult) -> Result<OutputLayers>;

    /// Run the full pipeline for one tile
    fn run(&self, tile: &Tile, datasets: &[Box<dyn SourceDataset>]) -> Result<TileOutcome> {
        let stack = match self.input_data(tile, datasets)? {
            Some(stack) => stack,
            None => return Ok(TileOutcome::Skipped),
        };
        let prediction = self.predict(&stack)?;
        let outputs = self.reduce(tile, prediction)?;
        Ok(TileOutcome::Completed(outputs))
    }
}

/// Factory producing a plugin from validated configuration
pub type PluginFactory = fn(&PredictionConfig) -> Result<Box<dyn PredictionPlugin>>;

/// Explicit plugin registry.
///
/// Keys are registered once at process start; duplicate registration and
/// unknown lookups both fail fast.
#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a key
    pub fn register(&mut self, key: &str, factory: PluginFactory) -> Result<()> {
        if self.factories.contains_key(key) {
            return Err(PipelineError::Config(format!(
                "plugin '{key}' is already registered"
            )));
        }
        self.factories.insert(key.to_string(), factory);
        Ok(())
    }

    /// Instantiate the plugin registered under `key`
    pub fn create(
        &self,
        key: &str,
        config: &PredictionConfig,
    ) -> Result<Box<dyn PredictionPlugin>> {
        let factory = self.factories.get(key).ok_or_else(|| {
            PipelineError::Config(format!("no plugin registered under '{key}'"))
        })?;
        factory(config)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TilePredictionPipeline;

    #[test]
    fn test_register_and_create() {
        let mut registry = PluginRegistry::new();
        registry
            .register("pred-gm-s2", TilePredictionPipeline::factory)
            .unwrap();

        let config = PredictionConfig::default();
        let plugin = registry.create("pred-gm-s2", &config).unwrap();
        assert_eq!(plugin.measurements(), ["mask", "prob", "filtered"]);
        assert_eq!(registry.keys(), vec!["pred-gm-s2"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = PluginRegistry::new();
        registry
            .register("pred-gm-s2", TilePredictionPipeline::factory)
            .unwrap();
        let result = registry.register("pred-gm-s2", TilePredictionPipeline::factory);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_key_fails() {
        let registry = PluginRegistry::new();
        let result = registry.create("nope", &PredictionConfig::default());
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
