//! Post-processing of raw classification results
//!
//! Three output layers are produced from a raw prediction:
//!
//! - `mask`: the validated class raster (codes outside the model's class
//!   set become no-data), untouched by spatial filtering
//! - `prob`: the validated probability raster (values above 100 become
//!   no-data)
//! - `filtered`: the mask after majority (mode) filtering and the
//!   configured ancillary corrections
//!
//! All of this is bit-deterministic: fixed iteration order, no
//! randomness, ties in the mode filter break to the lowest class code.

use crate::error::{PipelineError, Result};
use crate::inference::{PredictionResult, CLASS_NODATA, CLASS_NON_CROP, PROB_NODATA};
use cropmask_core::{GeoBox, Raster};
use ndarray::Zip;

/// Name of the terrain slope ancillary layer
pub const ANCILLARY_SLOPE: &str = "slope";
/// Name of the seasonal rainfall ancillary layer
pub const ANCILLARY_RAINFALL: &str = "rainfall";

/// How an ancillary layer overrides the classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionRule {
    /// Force non-crop where the layer exceeds the threshold
    /// (e.g. terrain too steep to cultivate)
    ExceedsThreshold(f32),
    /// Force non-crop where the layer falls below the threshold
    /// (e.g. rainfall too low for a crop season)
    BelowThreshold(f32),
}

impl CorrectionRule {
    /// Whether the rule fires for an ancillary value.
    ///
    /// NaN ancillary cells never trigger: with no evidence, the class is
    /// left as predicted.
    pub fn triggers(&self, value: f32) -> bool {
        match self {
            CorrectionRule::ExceedsThreshold(t) => value > *t,
            CorrectionRule::BelowThreshold(t) => value < *t,
        }
    }
}

/// A configured ancillary correction step
#[derive(Debug, Clone)]
pub struct Correction {
    /// Ancillary layer name the rule reads
    pub layer: String,
    /// Override rule
    pub rule: CorrectionRule,
}

/// Post-processing parameters
#[derive(Debug, Clone)]
pub struct PostProcessParams {
    /// Mode filter window radius in pixels (window = 2*radius + 1)
    pub mode_filter_radius: usize,
    /// Corrections applied after the mode filter, in order
    pub corrections: Vec<Correction>,
}

impl Default for PostProcessParams {
    fn default() -> Self {
        Self {
            mode_filter_radius: 1,
            corrections: Vec::new(),
        }
    }
}

/// Named ancillary rasters aligned on the tile grid
#[derive(Debug, Clone, Default)]
pub struct AncillaryLayers {
    layers: Vec<(String, Raster<f32>)>,
}

impl AncillaryLayers {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named layer
    pub fn insert(&mut self, name: impl Into<String>, raster: Raster<f32>) {
        self.layers.push((name.into(), raster));
    }

    /// Look up a layer by name
    pub fn get(&self, name: &str) -> Option<&Raster<f32>> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, raster)| raster)
    }
}

/// Final per-tile output layers
#[derive(Debug, Clone)]
pub struct OutputLayers {
    /// Validated class raster, not spatially filtered
    pub mask: Raster<u8>,
    /// Validated probability raster (integer percent)
    pub prob: Raster<u8>,
    /// Mode-filtered and ancillary-corrected class raster
    pub filtered: Raster<u8>,
    /// The grid all three layers share
    pub geobox: GeoBox,
}

/// Majority (mode) filter over the class raster.
///
/// Each valid cell takes the most frequent class within the window,
/// counting only in-bounds, valid neighbours (the centre included).
/// No-data centres stay no-data; ties break to the lowest class code.
/// A radius of 0 is the identity.
pub fn mode_filter(classes: &Raster<u8>, radius: usize) -> Raster<u8> {
    if radius == 0 {
        return classes.clone();
    }

    let (rows, cols) = classes.shape();
    let r = radius as isize;
    let mut out = classes.clone();

    for row in 0..rows {
        for col in 0..cols {
            let centre = classes.data()[[row, col]];
            if centre == CLASS_NODATA {
                continue;
            }

            let mut counts = [0u32; 256];
            for dr in -r..=r {
                for dc in -r..=r {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let v = classes.data()[[nr as usize, nc as usize]];
                    if v != CLASS_NODATA {
                        counts[v as usize] += 1;
                    }
                }
            }

            let mut winner = centre;
            let mut winner_count = 0u32;
            for (code, &count) in counts.iter().enumerate() {
                if count > winner_count {
                    winner = code as u8;
                    winner_count = count;
                }
            }
            out.data_mut()[[row, col]] = winner;
        }
    }

    out
}

/// Produce the final output layers from a raw prediction.
///
/// `num_classes` is the trained model's class count; class codes at or
/// above it are treated as invalid and become no-data in `mask`.
pub fn postprocess(
    prediction: &PredictionResult,
    ancillary: &AncillaryLayers,
    params: &PostProcessParams,
    num_classes: usize,
) -> Result<OutputLayers> {
    let geobox = prediction.geobox;

    // Validated mask/prob layers: out-of-range codes become no-data, and
    // no-data always holds in both layers or neither.
    let mut mask = prediction.classes.clone();
    let mut prob = prediction.probabilities.clone();
    Zip::from(mask.data_mut())
        .and(prob.data_mut())
        .for_each(|class, p| {
            if *class != CLASS_NODATA && (*class as usize) >= num_classes {
                *class = CLASS_NODATA;
            }
            if *p != PROB_NODATA && *p > 100 {
                *p = PROB_NODATA;
            }
            if *class == CLASS_NODATA || *p == PROB_NODATA {
                *class = CLASS_NODATA;
                *p = PROB_NODATA;
            }
        });

    let mut filtered = mode_filter(&mask, params.mode_filter_radius);

    for correction in &params.corrections {
        let layer = ancillary
            .get(&correction.layer)
            .ok_or_else(|| PipelineError::AncillaryDataMissing {
                layer: correction.layer.clone(),
            })?;
        layer.check_grid(&geobox)?;

        Zip::from(filtered.data_mut())
            .and(layer.data())
            .for_each(|class, &value| {
                if *class != CLASS_NODATA && correction.rule.triggers(value) {
                    *class = CLASS_NON_CROP;
                }
            });
    }

    Ok(OutputLayers {
        mask,
        prob,
        filtered,
        geobox,
    })
}
