// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Map projections into the local planar frame
//!
//! [`Utm`] delegates to `proj4rs` with a PROJ.4 definition of the zone on
//! the GRS80 ellipsoid. [`LocalFrame`] shifts any projection so that a
//! reference point becomes the origin, which keeps vertex coordinates small.

use std::fmt;

use proj4rs::proj::Proj;

use crate::{Error, Projection, Result};

/// UTM zone of the default building projection (EPSG:25833)
pub const DEFAULT_UTM_ZONE: u8 = 33;

const GEOGRAPHIC: &str = "+proj=longlat +ellps=GRS80 +no_defs";

/// Universal Transverse Mercator on the GRS80 ellipsoid
pub struct Utm {
    zone: u8,
    north: bool,
    geographic: Proj,
    projected: Proj,
}

impl Utm {
    /// Create a projection for `zone` (1-60) in the given hemisphere
    pub fn new(zone: u8, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::invalid_input(format!(
                "UTM zone must be in 1..=60, got {}",
                zone
            )));
        }

        let geographic = Proj::from_proj_string(GEOGRAPHIC)
            .map_err(|e| Error::invalid_input(format!("geographic CRS: {}", e)))?;
        let projected = Proj::from_proj_string(&Self::definition(zone, north))
            .map_err(|e| Error::invalid_input(format!("UTM zone {}: {}", zone, e)))?;

        Ok(Self {
            zone,
            north,
            geographic,
            projected,
        })
    }

    /// PROJ.4 definition of a zone, e.g. `+proj=utm +zone=33 +ellps=GRS80 +units=m +no_defs`
    pub fn definition(zone: u8, north: bool) -> String {
        let hemisphere = if north { "" } else { " +south" };
        format!(
            "+proj=utm +zone={}{} +ellps=GRS80 +units=m +no_defs",
            zone, hemisphere
        )
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_north(&self) -> bool {
        self.north
    }
}

impl fmt::Debug for Utm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utm")
            .field("zone", &self.zone)
            .field("north", &self.north)
            .finish()
    }
}

impl Projection for Utm {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return Err(Error::invalid_input(format!(
                "invalid geographic coordinate ({}, {})",
                lon, lat
            )));
        }

        // Geographic input is in radians
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.geographic, &self.projected, &mut point).map_err(
            |e| Error::invalid_input(format!("projecting ({}, {}): {}", lon, lat, e)),
        )?;

        Ok((point.0, point.1))
    }
}

/// Projection followed by a shift that puts `origin` at (0, 0)
#[derive(Clone, Copy, Debug)]
pub struct LocalFrame<P> {
    projection: P,
    origin: [f64; 2],
}

impl<P: Projection> LocalFrame<P> {
    /// Create a frame; `origin` is in projected coordinates
    pub fn new(projection: P, origin: [f64; 2]) -> Self {
        Self { projection, origin }
    }

    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    /// Projected coordinates to local ones
    #[inline]
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.origin[0], y - self.origin[1])
    }

    /// Local coordinates back to projected ones
    #[inline]
    pub fn to_world(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.origin[0], y + self.origin[1])
    }
}

impl<P: Projection> Projection for LocalFrame<P> {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let (x, y) = self.projection.project(lon, lat)?;
        Ok(self.to_local(x, y))
    }
}
