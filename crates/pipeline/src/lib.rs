//! # Cropmask Pipeline
//!
//! The per-tile crop mask prediction pipeline:
//!
//! 1. **features**: assemble a two-season feature stack from source
//!    datasets covering a tile
//! 2. **loader** / **model**: resolve a trained classifier and the ordered
//!    feature columns it was trained on
//! 3. **inference**: reorder the stack to the trained column order and run
//!    chunked per-pixel prediction
//! 4. **postprocess**: mode-filter the raw classes and apply ancillary
//!    corrections into the final `mask` / `prob` / `filtered` layers
//!
//! [`TilePredictionPipeline`] composes the four stages behind the
//! [`PredictionPlugin`] trait; plugins are wired up explicitly through a
//! [`PluginRegistry`] at process start.

pub mod chunks;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod loader;
pub mod model;
pub mod naming;
pub mod persist;
pub mod pipeline;
pub mod plugin;
pub mod postprocess;

pub use config::PredictionConfig;
pub use error::{PipelineError, Result};
pub use features::{
    assemble, resample_nearest, GeoTiffDataset, SourceDataset, SEASON_SUFFIXES,
    SOURCE_MEASUREMENTS,
};
pub use inference::{
    predict, InferenceParams, PredictionResult, CLASS_CROP, CLASS_NODATA, CLASS_NON_CROP,
    PROB_NODATA,
};
pub use loader::{feature_columns_from_header, ModelLoader, MANIFEST_NON_FEATURE_TOKENS};
pub use model::{Classifier, DecisionTree, RandomForest, TrainedModel, TreeNode};
pub use naming::{tile_paths, TilePaths};
pub use persist::{write_outputs, MeasurementDef, OUTPUT_MEASUREMENTS};
pub use pipeline::{TilePredictionPipeline, OUTPUT_MEASUREMENT_NAMES};
pub use plugin::{PluginRegistry, PredictionPlugin, TileOutcome};
pub use postprocess::{
    mode_filter, postprocess, AncillaryLayers, Correction, CorrectionRule, OutputLayers,
    PostProcessParams, ANCILLARY_RAINFALL, ANCILLARY_SLOPE,
};
