// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core traits at the seams between pipeline stages

use crate::Result;

/// Ground elevation lookup
///
/// Answers "what is the terrain height below this planar point?". The
/// terrain is assumed to be single-valued; an implementation returns the
/// nearest surface below a point high above the terrain.
///
/// # Example
///
/// ```ignore
/// use landscapes_model::ElevationProvider;
///
/// fn base_of(ground: &dyn ElevationProvider, ring: &[[f64; 2]]) -> Result<f64> {
///     let mut min = f64::INFINITY;
///     for p in ring {
///         min = min.min(ground.elevation_at(p[0], p[1])?);
///     }
///     Ok(min)
/// }
/// ```
pub trait ElevationProvider: Send + Sync {
    /// Elevation of the surface below `(x, y)`
    ///
    /// # Returns
    /// The surface height, or `Error::NoIntersection` when the point lies
    /// outside the surface's coverage
    fn elevation_at(&self, x: f64, y: f64) -> Result<f64>;
}

impl<T: ElevationProvider + ?Sized> ElevationProvider for &T {
    fn elevation_at(&self, x: f64, y: f64) -> Result<f64> {
        (**self).elevation_at(x, y)
    }
}

/// Map projection from geographic to planar coordinates
///
/// Implementations are pure functions of their input.
pub trait Projection: Send + Sync {
    /// Project a longitude/latitude pair (degrees) to planar meters
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64)>;
}

/// Projection for data that is already planar
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarProjection;

impl Projection for PlanarProjection {
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        Ok((x, y))
    }
}
