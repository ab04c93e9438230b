//! Main Raster type

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use crate::tile::GeoBox;
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major (row, col) order with
/// associated geographic metadata. Within the pipeline a raster is either a
/// source measurement read from a dataset (`f32`) or a classification output
/// layer (`u8`).
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a raster filled with a value, georeferenced on a tile grid
    pub fn on(geobox: &GeoBox, value: T) -> Self {
        Self {
            data: Array2::from_elem(geobox.shape(), value),
            transform: *geobox.transform(),
            crs: Some(*geobox.crs()),
            nodata: None,
        }
    }

    /// Create a raster from an existing array and a tile grid.
    ///
    /// Fails if the array shape does not match the grid.
    pub fn from_array(geobox: &GeoBox, data: Array2<T>) -> Result<Self> {
        if data.dim() != geobox.shape() {
            let (er, ec) = geobox.shape();
            let (ar, ac) = data.dim();
            return Err(Error::GridMismatch { er, ec, ar, ac });
        }
        Ok(Self {
            data,
            transform: *geobox.transform(),
            crs: Some(*geobox.crs()),
            nodata: None,
        })
    }

    /// Create a raster from raw parts (used by the GeoTIFF reader, where
    /// the CRS may not be recoverable from the file)
    pub fn from_parts(data: Array2<T>, transform: GeoTransform, crs: Option<Crs>) -> Self {
        Self {
            data,
            transform,
            crs,
            nodata: None,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS, if known
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Check if a value is no-data for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check that this raster lies on the given tile grid.
    ///
    /// Shape must match exactly; the CRS must match when the raster
    /// declares one.
    pub fn check_grid(&self, geobox: &GeoBox) -> Result<()> {
        if self.shape() != geobox.shape() {
            let (er, ec) = geobox.shape();
            let (ar, ac) = self.shape();
            return Err(Error::GridMismatch { er, ec, ar, ac });
        }
        if let Some(crs) = &self.crs {
            if !crs.is_equivalent(geobox.crs()) {
                return Err(Error::CrsMismatch(
                    geobox.crs().identifier(),
                    crs.identifier(),
                ));
            }
        }
        Ok(())
    }

    /// Count of valid (non-no-data) cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geobox(rows: usize, cols: usize) -> GeoBox {
        GeoBox::new(
            rows,
            cols,
            GeoTransform::new(0.0, rows as f64, 1.0, -1.0),
            Crs::from_epsg(6933),
        )
    }

    #[test]
    fn test_raster_on_geobox() {
        let gb = geobox(10, 20);
        let raster: Raster<f32> = Raster::on(&gb, 0.0);
        assert_eq!(raster.shape(), (10, 20));
        assert_eq!(raster.crs(), Some(&Crs::from_epsg(6933)));
        assert!(raster.check_grid(&gb).is_ok());
    }

    #[test]
    fn test_raster_access() {
        let gb = geobox(10, 10);
        let mut raster: Raster<f32> = Raster::on(&gb, 0.0);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_from_array_shape_check() {
        let gb = geobox(4, 4);
        let bad = Array2::<f32>::zeros((3, 4));
        assert!(matches!(
            Raster::from_array(&gb, bad),
            Err(Error::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_check_grid_crs_mismatch() {
        let gb = geobox(4, 4);
        let mut raster: Raster<f32> = Raster::on(&gb, 0.0);
        raster.set_crs(Some(Crs::wgs84()));
        assert!(matches!(
            raster.check_grid(&gb),
            Err(Error::CrsMismatch(_, _))
        ));
    }

    #[test]
    fn test_valid_count() {
        let gb = geobox(3, 3);
        let mut raster: Raster<u8> = Raster::on(&gb, 1);
        raster.set_nodata(Some(255));
        raster.set(0, 0, 255).unwrap();
        assert_eq!(raster.valid_count(), 8);
    }
}
