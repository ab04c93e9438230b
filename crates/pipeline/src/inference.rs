//! Per-pixel inference over a feature stack
//!
//! The engine selects exactly the model's trained columns, in the trained
//! order, from the assembled stack. Column order is the most
//! consequence-bearing invariant in the pipeline: swapping two columns
//! produces plausible-looking but wrong predictions, so a stack that
//! cannot supply the full ordered set is a hard error, and extra bands
//! are ignored rather than guessed at.
//!
//! ## Output encoding
//!
//! - class raster (`u8`): class code per pixel, `255` = no-data
//! - probability raster (`u8`): winning-class probability as an integer
//!   percentage `0..=100`, `255` = no-data
//!
//! Pixels with any non-finite input feature are excluded from inference
//! and emitted as no-data in both rasters.

use crate::chunks::RowChunks;
use crate::error::{PipelineError, Result};
use crate::model::TrainedModel;
use cropmask_core::{FeatureStack, GeoBox, Raster};
use ndarray::Array2;

/// Class code for non-crop pixels
pub const CLASS_NON_CROP: u8 = 0;
/// Class code for crop pixels
pub const CLASS_CROP: u8 = 1;
/// No-data code in the class raster
pub const CLASS_NODATA: u8 = 255;
/// No-data code in the probability raster
pub const PROB_NODATA: u8 = 255;

/// Inference resource parameters
#[derive(Debug, Clone)]
pub struct InferenceParams {
    /// Rows per chunk; bounds peak memory, never the numeric result
    pub chunk_rows: usize,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self { chunk_rows: 256 }
    }
}

/// Raw classification result on the tile grid
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Class code per pixel
    pub classes: Raster<u8>,
    /// Winning-class probability as integer percent
    pub probabilities: Raster<u8>,
    /// The grid both rasters share
    pub geobox: GeoBox,
}

/// Classify every valid pixel of the stack.
///
/// Fails with [`PipelineError::ColumnOrderMismatch`] when the stack cannot
/// supply every trained column.
pub fn predict(
    stack: &FeatureStack,
    model: &TrainedModel,
    params: &InferenceParams,
) -> Result<PredictionResult> {
    let columns = model.columns();

    let bands: Vec<&Array2<f32>> = columns
        .iter()
        .filter_map(|name| stack.band(name))
        .collect();
    if bands.len() != columns.len() {
        let missing: Vec<String> = columns
            .iter()
            .filter(|name| stack.band(name).is_none())
            .cloned()
            .collect();
        return Err(PipelineError::ColumnOrderMismatch { missing });
    }

    let geobox = *stack.geobox();
    let (rows, cols) = geobox.shape();

    let mut classes = Raster::on(&geobox, CLASS_NODATA);
    classes.set_nodata(Some(CLASS_NODATA));
    let mut probabilities = Raster::on(&geobox, PROB_NODATA);
    probabilities.set_nodata(Some(PROB_NODATA));

    let classifier = model.classifier();
    let mut features = vec![0.0f32; bands.len()];
    let mut distribution = vec![0.0f32; classifier.num_classes()];

    for chunk in RowChunks::new(rows, params.chunk_rows) {
        for row in chunk {
            for col in 0..cols {
                let mut valid = true;
                for (slot, band) in features.iter_mut().zip(&bands) {
                    let value = band[[row, col]];
                    if !value.is_finite() {
                        valid = false;
                        break;
                    }
                    *slot = value;
                }
                if !valid {
                    continue;
                }

                classifier.class_probabilities(&features, &mut distribution);

                // Argmax with ties broken to the lowest class code
                let mut best = 0usize;
                let mut best_p = distribution[0];
                for (idx, &p) in distribution.iter().enumerate().skip(1) {
                    if p > best_p {
                        best = idx;
                        best_p = p;
                    }
                }

                classes.data_mut()[[row, col]] = best as u8;
                probabilities.data_mut()[[row, col]] = (best_p * 100.0).round() as u8;
            }
        }
    }

    Ok(PredictionResult {
        classes,
        probabilities,
        geobox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classifier;
    use cropmask_core::{Crs, GeoTransform};

    /// Class 1 iff the first feature exceeds 0.5; probability mirrors it
    struct FirstFeatureStep;

    impl Classifier for FirstFeatureStep {
        fn num_classes(&self) -> usize {
            2
        }

        fn class_probabilities(&self, features: &[f32], out: &mut [f32]) {
            if features[0] > 0.5 {
                out.copy_from_slice(&[0.1, 0.9]);
            } else {
                out.copy_from_slice(&[0.9, 0.1]);
            }
        }
    }

    /// Always returns a perfectly tied distribution
    struct AlwaysTied;

    impl Classifier for AlwaysTied {
        fn num_classes(&self) -> usize {
            2
        }

        fn class_probabilities(&self, _features: &[f32], out: &mut [f32]) {
            out.copy_from_slice(&[0.5, 0.5]);
        }
    }

    fn geobox(rows: usize, cols: usize) -> GeoBox {
        GeoBox::new(
            rows,
            cols,
            GeoTransform::new(0.0, rows as f64, 1.0, -1.0),
            Crs::from_epsg(6933),
        )
    }

    fn stack_with(bands: &[(&str, Array2<f32>)]) -> FeatureStack {
        let (rows, cols) = bands[0].1.dim();
        let mut stack = FeatureStack::new(geobox(rows, cols));
        for (name, data) in bands {
            stack.insert(*name, data.clone()).unwrap();
        }
        stack
    }

    fn step_model() -> TrainedModel {
        TrainedModel::new(
            Box::new(FirstFeatureStep),
            vec!["a".to_string(), "b".to_string()],
        )
    }

    #[test]
    fn test_predict_basic() {
        let mut high = Array2::zeros((4, 4));
        high.fill(0.9);
        let stack = stack_with(&[("a", high), ("b", Array2::zeros((4, 4)))]);

        let result = predict(&stack, &step_model(), &InferenceParams::default()).unwrap();
        assert_eq!(result.classes.get(0, 0).unwrap(), CLASS_CROP);
        assert_eq!(result.probabilities.get(0, 0).unwrap(), 90);
    }

    #[test]
    fn test_columns_selected_in_trained_order() {
        // Stack carries the bands in the opposite order of the trained
        // columns; the engine must still feed "a" as feature 0.
        let mut a = Array2::zeros((2, 2));
        a.fill(0.9);
        let b = Array2::zeros((2, 2));
        let stack = stack_with(&[("b", b), ("a", a)]);

        let result = predict(&stack, &step_model(), &InferenceParams::default()).unwrap();
        // Feature 0 is band "a" (0.9) so every pixel is crop; if the
        // engine had used insertion order this would be non-crop.
        assert_eq!(result.classes.get(1, 1).unwrap(), CLASS_CROP);
    }

    #[test]
    fn test_decoy_band_never_read() {
        let mut a = Array2::zeros((3, 3));
        a.fill(0.9);
        let b = Array2::zeros((3, 3));

        let plain = stack_with(&[("a", a.clone()), ("b", b.clone())]);
        let mut decoy_band = Array2::zeros((3, 3));
        decoy_band.fill(123.0);
        let with_decoy = stack_with(&[("a", a), ("decoy", decoy_band), ("b", b)]);

        let params = InferenceParams::default();
        let model = step_model();
        let r1 = predict(&plain, &model, &params).unwrap();
        let r2 = predict(&with_decoy, &model, &params).unwrap();

        assert_eq!(r1.classes.data(), r2.classes.data());
        assert_eq!(r1.probabilities.data(), r2.probabilities.data());
    }

    #[test]
    fn test_missing_column_is_order_mismatch() {
        let stack = stack_with(&[("a", Array2::zeros((2, 2)))]);
        let result = predict(&stack, &step_model(), &InferenceParams::default());
        match result {
            Err(PipelineError::ColumnOrderMismatch { missing }) => {
                assert_eq!(missing, vec!["b".to_string()]);
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_pixel_is_nodata() {
        let mut a = Array2::zeros((3, 3));
        a.fill(0.9);
        let mut b = Array2::zeros((3, 3));
        b[[1, 2]] = f32::NAN;
        let stack = stack_with(&[("a", a), ("b", b)]);

        let result = predict(&stack, &step_model(), &InferenceParams::default()).unwrap();
        assert_eq!(result.classes.get(1, 2).unwrap(), CLASS_NODATA);
        assert_eq!(result.probabilities.get(1, 2).unwrap(), PROB_NODATA);
        // Neighbours are unaffected
        assert_eq!(result.classes.get(1, 1).unwrap(), CLASS_CROP);
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let mut a = Array2::zeros((16, 5));
        for ((r, c), v) in a.indexed_iter_mut() {
            *v = ((r * 5 + c) % 10) as f32 / 10.0;
        }
        let b = Array2::zeros((16, 5));
        let stack = stack_with(&[("a", a), ("b", b)]);
        let model = step_model();

        let whole = predict(&stack, &model, &InferenceParams { chunk_rows: 1000 }).unwrap();
        let chunked = predict(&stack, &model, &InferenceParams { chunk_rows: 3 }).unwrap();

        assert_eq!(whole.classes.data(), chunked.classes.data());
        assert_eq!(whole.probabilities.data(), chunked.probabilities.data());
    }

    #[test]
    fn test_tie_breaks_to_lowest_class() {
        let stack = stack_with(&[("a", Array2::zeros((2, 2))), ("b", Array2::zeros((2, 2)))]);
        let model = TrainedModel::new(
            Box::new(AlwaysTied),
            vec!["a".to_string(), "b".to_string()],
        );

        let result = predict(&stack, &model, &InferenceParams::default()).unwrap();
        assert_eq!(result.classes.get(0, 0).unwrap(), CLASS_NON_CROP);
        assert_eq!(result.probabilities.get(0, 0).unwrap(), 50);
    }
}
