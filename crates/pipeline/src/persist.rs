//! Writing output layers and the per-tile metadata sidecar

use crate::error::{PipelineError, Result};
use crate::inference::{CLASS_NODATA, PROB_NODATA};
use crate::naming::{tile_paths, TilePaths};
use crate::pipeline::OUTPUT_MEASUREMENT_NAMES;
use crate::postprocess::OutputLayers;
use cropmask_core::io::write_geotiff_u8;
use cropmask_core::{GeoTransform, Raster, Tile};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Definition of one output measurement
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeasurementDef {
    pub name: &'static str,
    pub dtype: &'static str,
    pub nodata: u8,
}

/// The three measurements every tile emits
pub const OUTPUT_MEASUREMENTS: [MeasurementDef; 3] = [
    MeasurementDef {
        name: "mask",
        dtype: "uint8",
        nodata: CLASS_NODATA,
    },
    MeasurementDef {
        name: "prob",
        dtype: "uint8",
        nodata: PROB_NODATA,
    },
    MeasurementDef {
        name: "filtered",
        dtype: "uint8",
        nodata: CLASS_NODATA,
    },
];

#[derive(Serialize)]
struct TileMetadata<'a> {
    product: &'a str,
    version: &'a str,
    tile: TileIndex,
    period: String,
    epsg: u32,
    shape: (usize, usize),
    transform: GeoTransform,
    measurements: &'a [MeasurementDef],
}

#[derive(Serialize)]
struct TileIndex {
    x: i32,
    y: i32,
}

/// Write the three output GeoTIFFs and the metadata sidecar for a tile.
///
/// Returns the paths written. The caller owns directory lifecycle beyond
/// `root`; everything below it is created as needed.
pub fn write_outputs(
    root: &Path,
    product: &str,
    version: &str,
    tile: &Tile,
    outputs: &OutputLayers,
) -> Result<TilePaths> {
    let names: Vec<&str> = OUTPUT_MEASUREMENTS.iter().map(|m| m.name).collect();
    if names != OUTPUT_MEASUREMENT_NAMES {
        return Err(PipelineError::Persist(
            "output files cannot cover the measurement set".into(),
        ));
    }

    let paths = tile_paths(root, product, version, tile, &names)?;
    std::fs::create_dir_all(&paths.directory)
        .map_err(|e| PipelineError::Persist(format!("{}: {e}", paths.directory.display())))?;

    for (band, path) in &paths.bands {
        let raster: &Raster<u8> = match band.as_str() {
            "mask" => &outputs.mask,
            "prob" => &outputs.prob,
            "filtered" => &outputs.filtered,
            other => {
                return Err(PipelineError::Persist(format!(
                    "no output layer for measurement '{other}'"
                )))
            }
        };
        write_geotiff_u8(raster, path)?;
    }

    let metadata = TileMetadata {
        product,
        version,
        tile: TileIndex {
            x: tile.x(),
            y: tile.y(),
        },
        period: tile.period().label(),
        epsg: tile.geobox().crs().epsg(),
        shape: tile.geobox().shape(),
        transform: *tile.geobox().transform(),
        measurements: &OUTPUT_MEASUREMENTS,
    };
    let sidecar = File::create(&paths.metadata)
        .map_err(|e| PipelineError::Persist(format!("{}: {e}", paths.metadata.display())))?;
    serde_json::to_writer_pretty(sidecar, &metadata)
        .map_err(|e| PipelineError::Persist(e.to_string()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropmask_core::io::read_geotiff;
    use cropmask_core::{Crs, GeoBox, Period};

    #[test]
    fn test_write_outputs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let geobox = GeoBox::new(
            6,
            6,
            GeoTransform::new(0.0, 120.0, 20.0, -20.0),
            Crs::from_epsg(6933),
        );
        let tile = Tile::new(3, 7, Period::Year(2019), geobox);

        let mut mask = Raster::on(&geobox, 1u8);
        mask.set_nodata(Some(CLASS_NODATA));
        let mut prob = Raster::on(&geobox, 80u8);
        prob.set_nodata(Some(PROB_NODATA));
        let outputs = OutputLayers {
            mask: mask.clone(),
            prob,
            filtered: mask,
            geobox,
        };

        let paths = write_outputs(dir.path(), "crop_mask", "1.0.0", &tile, &outputs).unwrap();

        assert_eq!(paths.bands.len(), 3);
        for (_, path) in &paths.bands {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert!(paths.metadata.exists());

        let back: Raster<u8> = read_geotiff(&paths.bands[1].1).unwrap();
        assert_eq!(back.get(0, 0).unwrap(), 80);

        let text = std::fs::read_to_string(&paths.metadata).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["product"], "crop_mask");
        assert_eq!(parsed["period"], "2019--P1Y");
        assert_eq!(parsed["measurements"].as_array().unwrap().len(), 3);
    }
}
