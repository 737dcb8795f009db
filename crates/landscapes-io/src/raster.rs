// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoTIFF elevation rasters
//!
//! Only the first band is read. Georeferencing comes from the
//! `ModelPixelScale` + `ModelTiepoint` pair, or from an axis-aligned
//! `ModelTransformation` matrix when the pair is missing.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use landscapes_model::{BoundingBox, HeightField};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::{FormatError, Result};

/// Pixel-to-model mapping of a north-up raster
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    /// Pixel size, negative Y for top-to-bottom rows
    pub resolution: [f64; 2],
    /// Model coordinate of the outer corner of pixel (0, 0)
    pub origin: [f64; 2],
}

impl GeoTransform {
    /// Bounding box of a `width` x `height` raster
    pub fn bbox(&self, width: usize, height: usize) -> BoundingBox {
        let [ox, oy] = self.origin;
        BoundingBox::new(
            ox,
            oy,
            ox + width as f64 * self.resolution[0],
            oy + height as f64 * self.resolution[1],
        )
    }
}

/// Read the first band of a GeoTIFF file
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<HeightField> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let field = decode_geotiff(BufReader::new(file))?;
    log::info!(
        "read {}x{} raster from {} (cell size {})",
        field.width(),
        field.height(),
        path.display(),
        field.cell_size()
    );
    Ok(field)
}

/// Decode the first band of a GeoTIFF stream into a height field
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<HeightField> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let transform = geo_transform(&mut decoder)?;

    let samples = match decoder.read_image()? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::I16(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::U16(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::I32(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::U32(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::U8(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::I8(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::U64(data) => data.iter().map(|&v| v as f32).collect(),
        DecodingResult::I64(data) => data.iter().map(|&v| v as f32).collect(),
    };
    let samples = first_band(samples, width, height)?;

    Ok(HeightField::from_raster(
        width,
        height,
        samples,
        transform.resolution,
        transform.origin,
        transform.bbox(width, height),
    )?)
}

/// Georeferencing of the current image
pub fn geo_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = f64_tag(decoder, Tag::ModelTiepointTag)?;

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(FormatError::raster(format!(
                "malformed georeference: {} scale and {} tiepoint values",
                scale.len(),
                tiepoint.len()
            )));
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        return Ok(GeoTransform {
            resolution: [sx, -sy],
            origin: [x - i * sx, y + j * sy],
        });
    }

    if let Some(matrix) = f64_tag(decoder, Tag::ModelTransformationTag)? {
        if matrix.len() < 16 {
            return Err(FormatError::raster(format!(
                "model transformation has {} values, expected 16",
                matrix.len()
            )));
        }
        if matrix[1] != 0.0 || matrix[4] != 0.0 {
            return Err(FormatError::raster("rotated rasters are not supported"));
        }
        return Ok(GeoTransform {
            resolution: [matrix[0], matrix[5]],
            origin: [matrix[3], matrix[7]],
        });
    }

    Err(FormatError::raster("raster is not georeferenced"))
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

/// Keep the first sample of each pixel of interleaved data
fn first_band(samples: Vec<f32>, width: usize, height: usize) -> Result<Vec<f32>> {
    let pixels = width * height;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(FormatError::raster(format!(
            "{} samples do not fill a {}x{} raster",
            samples.len(),
            width,
            height
        )));
    }

    let per_pixel = samples.len() / pixels;
    if per_pixel == 1 {
        return Ok(samples);
    }
    log::debug!("raster has {} samples per pixel, keeping the first", per_pixel);
    Ok(samples.into_iter().step_by(per_pixel).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    /// 3x2 raster, rows top-to-bottom: [1 2 3] over [4 5 6]
    fn encode(tags: Vec<(Tag, Vec<f64>)>) -> Cursor<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(3, 2).unwrap();
            for (tag, values) in tags {
                image.encoder().write_tag(tag, &values[..]).unwrap();
            }
            image
                .write_data(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])
                .unwrap();
        }
        buffer.set_position(0);
        buffer
    }

    #[test]
    fn test_pixel_scale_and_tiepoint() {
        let tiff = encode(vec![
            (Tag::ModelPixelScaleTag, vec![2.0, 2.0, 0.0]),
            (Tag::ModelTiepointTag, vec![0.0, 0.0, 0.0, 1000.0, 5000.0, 0.0]),
        ]);
        let field = decode_geotiff(tiff).unwrap();

        assert_eq!((field.width(), field.height()), (3, 2));
        assert_eq!(field.resolution(), [2.0, -2.0]);
        assert_eq!(field.origin(), [1000.0, 5000.0]);
        assert_eq!(field.bbox().to_array(), [1000.0, 4996.0, 1006.0, 5000.0]);
        assert_relative_eq!(field.cell_size(), 2.0);

        // Bottom row first after the flip
        assert_eq!(field.sample(0, 0), 4.0);
        assert_eq!(field.sample(2, 1), 3.0);
    }

    #[test]
    fn test_tiepoint_off_the_corner() {
        let tiff = encode(vec![
            (Tag::ModelPixelScaleTag, vec![1.0, 1.0, 0.0]),
            (Tag::ModelTiepointTag, vec![1.0, 1.0, 0.0, 10.0, 20.0, 0.0]),
        ]);
        let field = decode_geotiff(tiff).unwrap();
        assert_eq!(field.origin(), [9.0, 21.0]);
    }

    #[test]
    fn test_transformation_matrix() {
        let matrix = [
            0.5, 0.0, 0.0, 300.0, //
            0.0, -0.5, 0.0, 700.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let tiff = encode(vec![(Tag::ModelTransformationTag, matrix.to_vec())]);
        let field = decode_geotiff(tiff).unwrap();
        assert_eq!(field.resolution(), [0.5, -0.5]);
        assert_eq!(field.bbox().to_array(), [300.0, 699.0, 301.5, 700.0]);
    }

    #[test]
    fn test_missing_georeference() {
        let tiff = encode(vec![]);
        assert!(matches!(decode_geotiff(tiff), Err(FormatError::Raster(_))));
    }

    #[test]
    fn test_first_band_of_interleaved() {
        let samples = vec![1.0, 9.0, 2.0, 9.0, 3.0, 9.0, 4.0, 9.0];
        assert_eq!(first_band(samples, 2, 2).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(first_band(vec![1.0; 5], 2, 2).is_err());
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        let tiff = encode(vec![
            (Tag::ModelPixelScaleTag, vec![1.0, 1.0, 0.0]),
            (Tag::ModelTiepointTag, vec![0.0, 0.0, 0.0, 0.0, 2.0, 0.0]),
        ]);
        std::fs::write(&path, tiff.into_inner()).unwrap();
        assert_eq!(read_geotiff(&path).unwrap().samples().len(), 6);
    }
}
