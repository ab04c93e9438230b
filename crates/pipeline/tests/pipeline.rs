//! End-to-end tests of the tile prediction pipeline
//!
//! These build a small synthetic world: two seasonal composites on an
//! 8x8 tile, a single-tree forest splitting on `nir_S1`, a slope layer,
//! and a config pointing at artifacts written into a temp directory.

use cropmask_core::io::write_geotiff_f32;
use cropmask_core::{GeoBox, Period, Raster, Semester, Tile};
use cropmask_pipeline::{
    write_outputs, DecisionTree, PredictionConfig, PredictionPlugin, RandomForest, SourceDataset,
    TileOutcome, TilePredictionPipeline, TreeNode, CLASS_CROP, CLASS_NODATA, CLASS_NON_CROP,
    PROB_NODATA, SOURCE_MEASUREMENTS,
};
use ndarray::Array2;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const TILE_SIZE: usize = 8;

/// In-memory seasonal composite; `nir` carries a per-pixel pattern, every
/// other measurement is a constant.
struct SyntheticSeason {
    period: Period,
    geobox: GeoBox,
    nir: Array2<f32>,
}

impl SourceDataset for SyntheticSeason {
    fn period(&self) -> Period {
        self.period
    }

    fn measurements(&self) -> Vec<String> {
        SOURCE_MEASUREMENTS.iter().map(|s| s.to_string()).collect()
    }

    fn read(&self, measurement: &str) -> cropmask_core::Result<Raster<f32>> {
        let data = if measurement == "nir" {
            self.nir.clone()
        } else {
            Array2::from_elem(self.geobox.shape(), 0.25)
        };
        let mut raster = Raster::from_array(&self.geobox, data)?;
        raster.set_nodata(Some(f32::NAN));
        Ok(raster)
    }
}

fn test_config(dir: &Path) -> PredictionConfig {
    let mut config = PredictionConfig::default();
    config.grid.tile_size = TILE_SIZE;
    config.grid.resolution = 20.0;
    config.model.path = dir.join("model.json").to_string_lossy().into_owned();
    config.model.manifest_path = dir.join("td.txt").to_string_lossy().into_owned();
    config.output.root = dir.join("outputs").to_string_lossy().into_owned();
    config
}

fn write_model(dir: &Path) {
    // Crop wherever nir_S1 > 0.5
    let forest = RandomForest::new(
        2,
        vec![DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    distribution: vec![1.0, 0.0],
                },
                TreeNode::Leaf {
                    distribution: vec![0.0, 1.0],
                },
            ],
        }],
    );
    serde_json::to_writer(File::create(dir.join("model.json")).unwrap(), &forest).unwrap();

    let mut manifest = File::create(dir.join("td.txt")).unwrap();
    writeln!(manifest, "idx label nir_S1 nir_S2").unwrap();
}

fn tile(config: &PredictionConfig) -> Tile {
    Tile::new(0, 0, Period::Year(2019), config.grid.geobox_for_tile(0, 0))
}

/// Crop in the top half of the tile, non-crop below, one NaN pixel
fn datasets(geobox: &GeoBox) -> Vec<Box<dyn SourceDataset>> {
    let mut nir = Array2::from_elem(geobox.shape(), 0.1);
    for row in 0..TILE_SIZE / 2 {
        for col in 0..TILE_SIZE {
            nir[[row, col]] = 0.9;
        }
    }
    nir[[6, 3]] = f32::NAN;

    vec![
        Box::new(SyntheticSeason {
            period: Period::Semester {
                year: 2019,
                half: Semester::First,
            },
            geobox: *geobox,
            nir,
        }),
        Box::new(SyntheticSeason {
            period: Period::Semester {
                year: 2019,
                half: Semester::Second,
            },
            geobox: *geobox,
            nir: Array2::from_elem(geobox.shape(), 0.3),
        }),
    ]
}

fn run_pipeline(config: &PredictionConfig) -> TileOutcome {
    let pipeline =
        TilePredictionPipeline::new(config.clone(), tracing::Span::none()).unwrap();
    let tile = tile(config);
    let datasets = datasets(tile.geobox());
    pipeline.run(&tile, &datasets).unwrap()
}

#[test]
fn test_full_run_produces_expected_classes() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path());
    let config = test_config(dir.path());

    let outcome = run_pipeline(&config);
    let outputs = match outcome {
        TileOutcome::Completed(outputs) => outputs,
        TileOutcome::Skipped => panic!("tile unexpectedly skipped"),
    };

    // Top half crop, bottom half non-crop
    assert_eq!(outputs.mask.get(0, 0).unwrap(), CLASS_CROP);
    assert_eq!(outputs.mask.get(1, 5).unwrap(), CLASS_CROP);
    assert_eq!(outputs.mask.get(5, 5).unwrap(), CLASS_NON_CROP);
    assert_eq!(outputs.prob.get(0, 0).unwrap(), 100);

    // The NaN input pixel is no-data in all three layers
    assert_eq!(outputs.mask.get(6, 3).unwrap(), CLASS_NODATA);
    assert_eq!(outputs.prob.get(6, 3).unwrap(), PROB_NODATA);
    assert_eq!(outputs.filtered.get(6, 3).unwrap(), CLASS_NODATA);
}

#[test]
fn test_run_twice_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path());
    let config = test_config(dir.path());

    let first = match run_pipeline(&config) {
        TileOutcome::Completed(outputs) => outputs,
        TileOutcome::Skipped => panic!("tile unexpectedly skipped"),
    };
    let second = match run_pipeline(&config) {
        TileOutcome::Completed(outputs) => outputs,
        TileOutcome::Skipped => panic!("tile unexpectedly skipped"),
    };

    assert_eq!(first.mask.data(), second.mask.data());
    assert_eq!(first.prob.data(), second.prob.data());
    assert_eq!(first.filtered.data(), second.filtered.data());
}

#[test]
fn test_empty_dataset_set_skips_without_model() {
    let dir = tempfile::tempdir().unwrap();
    // Deliberately no model artifact on disk: the skip path must never
    // need one.
    let config = test_config(dir.path());

    let pipeline =
        TilePredictionPipeline::new(config.clone(), tracing::Span::none()).unwrap();
    let outcome = pipeline.run(&tile(&config), &[]).unwrap();
    assert!(outcome.is_skipped());
}

#[test]
fn test_slope_correction_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path());
    let mut config = test_config(dir.path());

    // Steep slope at pixel (1, 1), flat elsewhere; crop is predicted in
    // the whole top half.
    let geobox = config.grid.geobox_for_tile(0, 0);
    let mut slope = Raster::on(&geobox, 2.0f32);
    slope.set(1, 1, 48.0).unwrap();
    let slope_path = dir.path().join("slope.tif");
    write_geotiff_f32(&slope, &slope_path).unwrap();

    config.ancillary.slope_path = Some(slope_path.to_string_lossy().into_owned());
    config.postprocess.slope_threshold = Some(35.0);

    let outputs = match run_pipeline(&config) {
        TileOutcome::Completed(outputs) => outputs,
        TileOutcome::Skipped => panic!("tile unexpectedly skipped"),
    };

    assert_eq!(outputs.mask.get(1, 1).unwrap(), CLASS_CROP);
    assert_eq!(outputs.filtered.get(1, 1).unwrap(), CLASS_NON_CROP);
    assert_eq!(outputs.filtered.get(1, 4).unwrap(), CLASS_CROP);
}

#[test]
fn test_outputs_written_with_naming_convention() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path());
    let config = test_config(dir.path());

    let outputs = match run_pipeline(&config) {
        TileOutcome::Completed(outputs) => outputs,
        TileOutcome::Skipped => panic!("tile unexpectedly skipped"),
    };

    let paths = write_outputs(
        Path::new(&config.output.root),
        &config.product.name,
        &config.product.version,
        &tile(&config),
        &outputs,
    )
    .unwrap();

    let expected_dir = Path::new(&config.output.root)
        .join("crop_mask/1.0.0/x000/y000/2019");
    assert_eq!(paths.directory, expected_dir);
    assert!(expected_dir
        .join("crop_mask_x000_y000_2019--P1Y_filtered.tif")
        .exists());
    assert!(expected_dir
        .join("crop_mask_x000_y000_2019--P1Y.json")
        .exists());
}
