//! Model artifact loading and feature-column resolution
//!
//! A trained model is two files: the serialized estimator and the
//! training-data manifest whose first line lists the column names in
//! training order. Either may live on the local filesystem or in object
//! storage; remote artifacts are streamed to a temporary spool file so
//! memory stays bounded regardless of artifact size.

use crate::error::{PipelineError, Result};
use crate::model::{RandomForest, TrainedModel};
use cropmask_cloud::{blocking, s3, CloudAuth, NoAuth};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

/// Leading manifest tokens that are not feature columns.
///
/// The training table starts with a row-index column and the class-label
/// column; everything after those two header tokens is a feature, in the
/// order the model was trained. This offset is part of the artifact
/// contract and pinned by tests; change it only together with the
/// training-data format.
pub const MANIFEST_NON_FEATURE_TOKENS: usize = 2;

/// Resolve the ordered feature columns from a manifest header line
pub fn feature_columns_from_header(header: &str, skip: usize) -> Vec<String> {
    header
        .split_whitespace()
        .skip(skip)
        .map(String::from)
        .collect()
}

/// Loads trained models from local or remote locations.
pub struct ModelLoader {
    auth: Box<dyn CloudAuth>,
}

impl ModelLoader {
    /// Loader using anonymous (unsigned) remote access
    pub fn new() -> Self {
        Self {
            auth: Box::new(NoAuth),
        }
    }

    /// Loader with explicit remote authentication
    pub fn with_auth(auth: Box<dyn CloudAuth>) -> Self {
        Self { auth }
    }

    /// Load the estimator and its feature columns.
    ///
    /// The estimator's thread count is forced to 1: concurrency across
    /// tiles is owned by the caller, not by the model.
    pub fn load(&self, model_path: &str, manifest_path: &str) -> Result<TrainedModel> {
        let columns = self.resolve_columns(manifest_path)?;

        let artifact = self
            .materialize(model_path)
            .map_err(PipelineError::ModelUnreachable)?;
        let mut forest: RandomForest = serde_json::from_reader(BufReader::new(artifact))
            .map_err(|e| PipelineError::ModelCorrupt(e.to_string()))?;

        forest.validate().map_err(PipelineError::ModelCorrupt)?;
        if let Some(max) = forest.max_feature_index() {
            if max >= columns.len() {
                return Err(PipelineError::ModelCorrupt(format!(
                    "estimator references feature index {max} but the manifest resolves only {} columns",
                    columns.len()
                )));
            }
        }

        forest.set_jobs(1);
        Ok(TrainedModel::new(Box::new(forest), columns))
    }

    /// Read the manifest header and resolve the feature columns
    pub fn resolve_columns(&self, manifest_path: &str) -> Result<Vec<String>> {
        let manifest = self
            .materialize(manifest_path)
            .map_err(PipelineError::ManifestUnreadable)?;

        let mut header = String::new();
        BufReader::new(manifest)
            .read_line(&mut header)
            .map_err(|e| PipelineError::ManifestUnreadable(e.to_string()))?;

        let columns = feature_columns_from_header(&header, MANIFEST_NON_FEATURE_TOKENS);
        if columns.is_empty() {
            return Err(PipelineError::ManifestUnreadable(format!(
                "no feature columns remain after dropping {MANIFEST_NON_FEATURE_TOKENS} leading tokens from '{}'",
                header.trim_end()
            )));
        }
        Ok(columns)
    }

    /// Produce a readable local file for a local path or remote location.
    ///
    /// Remote bytes are streamed into an unlinked temporary file, then the
    /// file is rewound for the caller.
    fn materialize(&self, path: &str) -> std::result::Result<File, String> {
        if s3::is_remote(path) {
            let mut spool = tempfile::tempfile().map_err(|e| e.to_string())?;
            blocking::fetch_to_writer(path, self.auth.as_ref(), &mut spool)
                .map_err(|e| e.to_string())?;
            spool
                .seek(SeekFrom::Start(0))
                .map_err(|e| e.to_string())?;
            Ok(spool)
        } else {
            File::open(path).map_err(|e| format!("{path}: {e}"))
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
