//! I/O for reading and writing geospatial data

mod geotiff;

pub use geotiff::{read_geotiff, write_geotiff_f32, write_geotiff_u8};
