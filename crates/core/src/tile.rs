//! Spatial and temporal unit-of-work descriptors
//!
//! A `Tile` is one unit of work: a fixed grid extent (`GeoBox`) plus the
//! temporal period the prediction covers. Tiles are immutable once built.

use crate::crs::Crs;
use crate::raster::GeoTransform;
use serde::Serialize;
use std::fmt;

/// Half of a calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Semester {
    /// January to June
    First,
    /// July to December
    Second,
}

/// Temporal period of a tile or dataset.
///
/// Labels follow the datacube convention: `2019--P1Y` for a calendar year,
/// `2019-01--P6M` / `2019-07--P6M` for the two semesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    /// A calendar year
    Year(u16),
    /// One half of a calendar year
    Semester { year: u16, half: Semester },
}

impl Period {
    /// The calendar year this period falls in
    pub fn year(&self) -> u16 {
        match self {
            Period::Year(y) => *y,
            Period::Semester { year, .. } => *year,
        }
    }

    /// Datacube-style period label
    pub fn label(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}--P1Y"),
            Period::Semester {
                year,
                half: Semester::First,
            } => format!("{year}-01--P6M"),
            Period::Semester {
                year,
                half: Semester::Second,
            } => format!("{year}-07--P6M"),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A fixed raster grid: shape, affine transform and CRS.
///
/// Every per-tile raster (features, predictions, outputs, ancillary layers)
/// shares the tile's GeoBox; alignment against it is checked, never assumed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBox {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Crs,
}

impl GeoBox {
    /// Create a new GeoBox
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Affine transform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Coordinate reference system
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Cell size in CRS units (assumes square cells)
    pub fn resolution(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic coordinates of a pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }
}

/// One spatial/temporal unit of work
#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    x: i32,
    y: i32,
    period: Period,
    geobox: GeoBox,
}

impl Tile {
    /// Create a new tile
    pub fn new(x: i32, y: i32, period: Period, geobox: GeoBox) -> Self {
        Self {
            x,
            y,
            period,
            geobox,
        }
    }

    /// Tile grid X index
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Tile grid Y index
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Temporal period
    pub fn period(&self) -> &Period {
        &self.period
    }

    /// Grid definition
    pub fn geobox(&self) -> &GeoBox {
        &self.geobox
    }

    /// Zero-padded X label, e.g. `x049`
    pub fn x_label(&self) -> String {
        format!("x{:03}", self.x)
    }

    /// Zero-padded Y label, e.g. `y025`
    pub fn y_label(&self) -> String {
        format!("y{:03}", self.y)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x_label(), self.y_label(), self.period)
    }
}
