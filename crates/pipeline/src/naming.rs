//! Output path naming convention
//!
//! Output layers follow the fixed layout the persistence layer expects:
//!
//! ```text
//! <root>/<product>/<version>/<x>/<y>/<year>/
//!     <product>_<x>_<y>_<period>_<band>.tif
//!     <product>_<x>_<y>_<period>.json        (metadata sidecar)
//! ```

use crate::error::{PipelineError, Result};
use cropmask_core::Tile;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Resolved output paths for one tile
#[derive(Debug, Clone)]
pub struct TilePaths {
    /// Directory holding every file of the tile
    pub directory: PathBuf,
    /// One GeoTIFF path per output measurement, in the given order
    pub bands: Vec<(String, PathBuf)>,
    /// Metadata sidecar document
    pub metadata: PathBuf,
}

/// Build the output paths for a tile.
///
/// `measurements` must be non-empty and free of duplicates; each one maps
/// to exactly one file, so a mismatch here would leave the product
/// incompletely covered.
pub fn tile_paths(
    root: &Path,
    product: &str,
    version: &str,
    tile: &Tile,
    measurements: &[&str],
) -> Result<TilePaths> {
    if measurements.is_empty() {
        return Err(PipelineError::Config(
            "no output measurements to name".into(),
        ));
    }
    let unique: BTreeSet<&str> = measurements.iter().copied().collect();
    if unique.len() != measurements.len() {
        return Err(PipelineError::Config(format!(
            "output files cannot cover the measurement set, duplicates in {measurements:?}"
        )));
    }

    let year = tile.period().year();
    let directory = root
        .join(product)
        .join(version)
        .join(tile.x_label())
        .join(tile.y_label())
        .join(year.to_string());

    let prefix = format!(
        "{product}_{x}_{y}_{period}",
        x = tile.x_label(),
        y = tile.y_label(),
        period = tile.period().label()
    );

    let bands = measurements
        .iter()
        .map(|band| {
            (
                band.to_string(),
                directory.join(format!("{prefix}_{band}.tif")),
            )
        })
        .collect();

    let metadata = directory.join(format!("{prefix}.json"));

    Ok(TilePaths {
        directory,
        bands,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropmask_core::{Crs, GeoBox, GeoTransform, Period};

    fn tile() -> Tile {
        let geobox = GeoBox::new(
            4800,
            4800,
            GeoTransform::new(0.0, 96000.0, 20.0, -20.0),
            Crs::from_epsg(6933),
        );
        Tile::new(49, 25, Period::Year(2019), geobox)
    }

    #[test]
    fn test_layout() {
        let paths = tile_paths(
            Path::new("/data"),
            "crop_mask",
            "1.0.0",
            &tile(),
            &["mask", "prob", "filtered"],
        )
        .unwrap();

        assert_eq!(
            paths.directory,
            Path::new("/data/crop_mask/1.0.0/x049/y025/2019")
        );
        assert_eq!(
            paths.bands[0].1,
            Path::new("/data/crop_mask/1.0.0/x049/y025/2019/crop_mask_x049_y025_2019--P1Y_mask.tif")
        );
        assert_eq!(
            paths.metadata,
            Path::new("/data/crop_mask/1.0.0/x049/y025/2019/crop_mask_x049_y025_2019--P1Y.json")
        );
    }

    #[test]
    fn test_duplicate_measurements_rejected() {
        let result = tile_paths(
            Path::new("/data"),
            "crop_mask",
            "1.0.0",
            &tile(),
            &["mask", "mask"],
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_empty_measurements_rejected() {
        let result = tile_paths(Path::new("/data"), "crop_mask", "1.0.0", &tile(), &[]);
        assert!(result.is_err());
    }
}
