// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Regular elevation grids
//!
//! A [`HeightField`] always stores its rows bottom-to-top: row index grows
//! with geographic Y. Rasters stored top-to-bottom (negative Y resolution)
//! are flipped once, in [`HeightField::from_raster`], so nothing downstream
//! has to care about the source row order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned planar bounding box `[min_x, min_y, max_x, max_y]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box from its corners, normalising swapped coordinates
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Extent along X
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along Y
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// As the `[min_x, min_y, max_x, max_y]` array used by raster metadata
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// Regular grid of elevation samples
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    /// Per-pixel resolution as reported by the source (Y sign = row order)
    resolution: [f64; 2],
    /// Geographic offset of the source raster (upper-left for north-up rasters)
    origin: [f64; 2],
    bbox: BoundingBox,
    /// Row-major samples, rows ordered bottom-to-top
    samples: Vec<f32>,
}

impl HeightField {
    /// Create a height field from samples already ordered bottom-to-top
    ///
    /// The grid is anchored at the local origin with square cells of
    /// `cell_size` meters.
    pub fn new(width: usize, height: usize, samples: Vec<f32>, cell_size: f64) -> Result<Self> {
        let bbox = BoundingBox::new(
            0.0,
            0.0,
            width as f64 * cell_size,
            height as f64 * cell_size,
        );
        Self::from_raster(
            width,
            height,
            samples,
            [cell_size, cell_size],
            [0.0, 0.0],
            bbox,
        )
    }

    /// Create a height field from decoded raster data
    ///
    /// A negative Y resolution means the raster stores its rows
    /// top-to-bottom; the rows are flipped into bottom-to-top order here.
    pub fn from_raster(
        width: usize,
        height: usize,
        samples: Vec<f32>,
        resolution: [f64; 2],
        origin: [f64; 2],
        bbox: BoundingBox,
    ) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(Error::invalid_input(format!(
                "height field must be at least 2x2 samples, got {}x{}",
                width, height
            )));
        }

        let expected = width.checked_mul(height).ok_or_else(|| {
            Error::invalid_input(format!("height field {}x{} overflows", width, height))
        })?;
        if samples.len() != expected {
            return Err(Error::invalid_input(format!(
                "sample count {} does not match {}x{} = {}",
                samples.len(),
                width,
                height,
                expected
            )));
        }

        let cell = resolution[0];
        if !cell.is_finite() || cell == 0.0 || !resolution[1].is_finite() || resolution[1] == 0.0 {
            return Err(Error::invalid_input(format!(
                "invalid raster resolution ({}, {})",
                resolution[0], resolution[1]
            )));
        }

        let samples = if resolution[1] < 0.0 {
            flip_rows(&samples, width, height)
        } else {
            samples
        };

        Ok(Self {
            width,
            height,
            resolution,
            origin,
            bbox,
            samples,
        })
    }

    /// Number of samples per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Source resolution, Y sign preserved
    pub fn resolution(&self) -> [f64; 2] {
        self.resolution
    }

    /// Ground distance between neighbouring samples along X
    pub fn cell_size(&self) -> f64 {
        self.resolution[0].abs()
    }

    /// Geographic offset of the source raster
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    /// Geographic bounding box of the raster
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// All samples, bottom-to-top rows
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at grid column `x` and row `y` (row 0 = southern edge)
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> f32 {
        self.samples[self.width * y + x]
    }

    /// Triangle count of the full-resolution grid triangulation
    pub fn full_triangle_count(&self) -> usize {
        2 * (self.width - 1) * (self.height - 1)
    }
}

/// Reverse the row order of a row-major grid
pub fn flip_rows(samples: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut flipped = Vec::with_capacity(samples.len());
    for row in samples.chunks_exact(width).rev().take(height) {
        flipped.extend_from_slice(row);
    }
    flipped
}
