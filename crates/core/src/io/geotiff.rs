//! Native GeoTIFF reading and writing
//!
//! Uses the `tiff` crate directly. Only the metadata this pipeline relies
//! on is handled: the affine transform (pixel scale + tiepoint tags), the
//! EPSG code from the GeoKey directory, and the GDAL no-data tag. Anything
//! richer belongs to the persistence collaborator that post-hosts the
//! outputs.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

// These four geo tags (33550, 33922, 34735, 42113) have canonical named
// variants in the `tiff` crate's `Tag` enum. The decoder normalizes known
// tag numbers to those variants when parsing the IFD, so reads must look
// them up via the named variants rather than `Tag::Unknown(n)`.
const GEOKEY_MODEL_TYPE: u16 = 1024;
const GEOKEY_RASTER_TYPE: u16 = 1025;
const GEOKEY_PROJECTED_CRS: u16 = 3072;

/// Read a single-band GeoTIFF into a raster.
///
/// The file must carry pixel scale and tiepoint tags; a raster without a
/// geotransform cannot be aligned onto a tile grid and is rejected. The
/// CRS is taken from the projected-CRS GeoKey when present.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Geotiff(format!("decode error: {e}")))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Geotiff(format!("cannot read dimensions: {e}")))?;
    let rows = height as usize;
    let cols = width as usize;

    let image = decoder
        .read_image()
        .map_err(|e| Error::Geotiff(format!("cannot read image data: {e}")))?;

    let data: Vec<T> = match image {
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let transform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata::<T>(&mut decoder);

    let array = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Geotiff(e.to_string()))?;
    let mut raster = Raster::from_parts(array, transform, crs);
    raster.set_nodata(nodata);
    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Geotiff("missing pixel scale tag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Geotiff("missing tiepoint tag".into()))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::Geotiff("malformed georeferencing tags".into()));
    }

    // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;
    // Entries of four shorts: (key id, tag location, count, value)
    for entry in keys.chunks_exact(4).skip(1) {
        if entry[0] == GEOKEY_PROJECTED_CRS && entry[1] == 0 {
            return Some(Crs::from_epsg(entry[3] as u32));
        }
    }
    None
}

fn read_nodata<T: RasterElement>(
    decoder: &mut Decoder<impl std::io::Read + std::io::Seek>,
) -> Option<T> {
    let text = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()?;
    let value: f64 = text.trim().trim_end_matches('\0').parse().ok()?;
    num_traits::cast(value)
}

/// Write a `u8` raster (class or probability layer) as a GeoTIFF
pub fn write_geotiff_u8<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Geotiff(format!("encoder error: {e}")))?;

    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<Gray8>(cols as u32, rows as u32)
        .map_err(|e| Error::Geotiff(format!("cannot create image: {e}")))?;

    write_geo_tags(&mut image, raster.transform(), raster.crs(), raster.nodata())?;

    let data: Vec<u8> = raster.data().iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| Error::Geotiff(format!("cannot write image data: {e}")))
}

/// Write an `f32` raster as a GeoTIFF
pub fn write_geotiff_f32<P: AsRef<Path>>(raster: &Raster<f32>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Geotiff(format!("encoder error: {e}")))?;

    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Geotiff(format!("cannot create image: {e}")))?;

    write_geo_tags(&mut image, raster.transform(), raster.crs(), raster.nodata())?;

    let data: Vec<f32> = raster.data().iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| Error::Geotiff(format!("cannot write image data: {e}")))
}

fn write_geo_tags<C, W, T>(
    image: &mut tiff::encoder::ImageEncoder<'_, W, C, tiff::encoder::TiffKindStandard>,
    transform: &GeoTransform,
    crs: Option<&Crs>,
    nodata: Option<T>,
) -> Result<()>
where
    C: tiff::encoder::colortype::ColorType,
    W: std::io::Write + std::io::Seek,
    T: RasterElement + std::fmt::Display,
{
    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Geotiff(format!("cannot write scale tag: {e}")))?;

    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Geotiff(format!("cannot write tiepoint tag: {e}")))?;

    // Minimal GeoKey directory: projected model, pixel-is-area, EPSG code
    let epsg = crs.map(|c| c.epsg() as u16).unwrap_or(0);
    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 2, // version 1.1.0, key count patched below
        GEOKEY_MODEL_TYPE, 0, 1, 1,
        GEOKEY_RASTER_TYPE, 0, 1, 1,
    ];
    if epsg != 0 {
        geokeys[3] = 3;
        geokeys.extend_from_slice(&[GEOKEY_PROJECTED_CRS, 0, 1, epsg]);
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(|e| Error::Geotiff(format!("cannot write geokey tag: {e}")))?;

    if let Some(nd) = nodata {
        let text = format!("{nd}");
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| Error::Geotiff(format!("cannot write nodata tag: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::GeoBox;
    use approx::assert_relative_eq;

    fn geobox(rows: usize, cols: usize) -> GeoBox {
        GeoBox::new(
            rows,
            cols,
            GeoTransform::new(300.0, 800.0, 10.0, -10.0),
            Crs::from_epsg(6933),
        )
    }

    #[test]
    fn test_u8_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");

        let gb = geobox(6, 5);
        let mut raster: Raster<u8> = Raster::on(&gb, 1);
        raster.set_nodata(Some(255));
        raster.set(2, 3, 255).unwrap();

        write_geotiff_u8(&raster, &path).unwrap();
        let back: Raster<u8> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (6, 5));
        assert_eq!(back.get(2, 3).unwrap(), 255);
        assert_eq!(back.get(0, 0).unwrap(), 1);
        assert_eq!(back.nodata(), Some(255));
        assert_eq!(back.crs(), Some(&Crs::from_epsg(6933)));
        assert_relative_eq!(back.transform().origin_x, 300.0);
        assert_relative_eq!(back.transform().origin_y, 800.0);
        assert_relative_eq!(back.transform().pixel_height, -10.0);
    }

    #[test]
    fn test_f32_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slope.tif");

        let gb = geobox(4, 4);
        let mut raster: Raster<f32> = Raster::on(&gb, 12.5);
        raster.set(1, 1, 40.0).unwrap();

        write_geotiff_f32(&raster, &path).unwrap();
        let back: Raster<f32> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (4, 4));
        assert_relative_eq!(back.get(1, 1).unwrap(), 40.0);
        assert_relative_eq!(back.get(0, 0).unwrap(), 12.5);
    }

    #[test]
    fn test_read_missing_file() {
        let result: Result<Raster<u8>> = read_geotiff("/nonexistent/file.tif");
        assert!(result.is_err());
    }
}
