//! Multi-band feature stack used as model input
//!
//! A `FeatureStack` holds named `f32` bands that all share one tile grid.
//! Insertion order is preserved; the inference engine later selects bands
//! by the trained model's column names, so lookup is by name.

use crate::error::{Error, Result};
use crate::tile::GeoBox;
use ndarray::Array2;

/// Named multi-band raster stack aligned on a single grid.
///
/// Invariant: every band has exactly the GeoBox's shape. Cells that carry
/// no valid observation are NaN.
#[derive(Debug, Clone)]
pub struct FeatureStack {
    geobox: GeoBox,
    bands: Vec<(String, Array2<f32>)>,
}

impl FeatureStack {
    /// Create an empty stack on the given grid
    pub fn new(geobox: GeoBox) -> Self {
        Self {
            geobox,
            bands: Vec::new(),
        }
    }

    /// The grid all bands share
    pub fn geobox(&self) -> &GeoBox {
        &self.geobox
    }

    /// Append a band, validating its shape against the grid
    pub fn insert(&mut self, name: impl Into<String>, data: Array2<f32>) -> Result<()> {
        let name = name.into();
        if self.band(&name).is_some() {
            return Err(Error::DuplicateBand(name));
        }
        if data.dim() != self.geobox.shape() {
            let (er, ec) = self.geobox.shape();
            let (ar, ac) = data.dim();
            return Err(Error::GridMismatch { er, ec, ar, ac });
        }
        self.bands.push((name, data));
        Ok(())
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Option<&Array2<f32>> {
        self.bands
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    /// Band names, in insertion order
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the stack has no bands
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}
