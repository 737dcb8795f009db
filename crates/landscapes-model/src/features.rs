// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vector inputs: building footprints and paths

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Meters per storey when a building only reports its level count
pub const DEFAULT_STOREY_HEIGHT: f64 = 3.0;

/// Building height when neither height nor levels are known
pub const DEFAULT_BUILDING_HEIGHT: f64 = 3.0;

/// Relative area below which a ring counts as flat
const ZERO_AREA_TOLERANCE: f64 = 1e-12;

/// Whether an open ring encloses no area
///
/// The shoelace area is compared against the squared extent of the ring,
/// so the test behaves the same in degrees and in meters.
pub fn ring_has_zero_area(ring: &[[f64; 2]]) -> bool {
    let n = ring.len();
    if n < 3 {
        return true;
    }

    // Relative to the first vertex to keep projected coordinates small
    let o = ring[0];
    let mut area2 = 0.0;
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for i in 0..n {
        let p = ring[i];
        let q = ring[(i + 1) % n];
        area2 += (p[0] - o[0]) * (q[1] - o[1]) - (q[0] - o[0]) * (p[1] - o[1]);
        for k in 0..2 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    let extent = (max[0] - min[0]).max(max[1] - min[1]);

    area2.abs() <= ZERO_AREA_TOLERANCE * extent * extent
}

/// Height-related attributes of a building feature
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeightAttributes {
    /// Explicit height in meters
    pub height: Option<f64>,
    /// Number of storeys
    pub levels: Option<f64>,
}

impl HeightAttributes {
    /// Resolve the building height
    ///
    /// An explicit height wins, then `levels * storey_height`, then the
    /// default. Zero, negative and non-finite values count as missing.
    pub fn resolve(&self, storey_height: f64, default_height: f64) -> f64 {
        let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
        if let Some(height) = usable(self.height) {
            return height;
        }
        if let Some(levels) = usable(self.levels) {
            return levels * storey_height;
        }
        default_height
    }
}

/// Closed outer ring of a building with its height
///
/// The ring is stored explicitly closed: the last point repeats the first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Position of the feature in its input batch
    pub index: usize,
    /// Closed ring in source coordinates
    pub ring: Vec<[f64; 2]>,
    /// Building height in meters
    pub height: f64,
}

impl Footprint {
    /// Create a footprint, normalising the ring
    ///
    /// Consecutive duplicate points are dropped and the ring is closed if
    /// the source left it open. Fewer than three distinct vertices or a
    /// non-finite coordinate is rejected.
    pub fn new(index: usize, ring: Vec<[f64; 2]>, height: f64) -> Result<Self> {
        if !height.is_finite() || height < 0.0 {
            return Err(Error::invalid_input(format!(
                "feature {}: invalid building height {}",
                index, height
            )));
        }
        if let Some(p) = ring.iter().find(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(Error::invalid_input(format!(
                "feature {}: non-finite coordinate ({}, {})",
                index, p[0], p[1]
            )));
        }

        let mut normalized: Vec<[f64; 2]> = Vec::with_capacity(ring.len() + 1);
        for p in ring {
            if normalized.last() != Some(&p) {
                normalized.push(p);
            }
        }
        // Drop the closing point (if any) to count distinct vertices
        while normalized.len() > 1 && normalized.first() == normalized.last() {
            normalized.pop();
        }
        if normalized.len() < 3 {
            return Err(Error::invalid_input(format!(
                "feature {}: footprint needs at least 3 distinct vertices, got {}",
                index,
                normalized.len()
            )));
        }
        if ring_has_zero_area(&normalized) {
            return Err(Error::invalid_input(format!(
                "feature {}: footprint encloses no area",
                index
            )));
        }
        normalized.push(normalized[0]);

        Ok(Self {
            index,
            ring: normalized,
            height,
        })
    }

    /// Number of distinct ring vertices (closing point excluded)
    pub fn vertex_count(&self) -> usize {
        self.ring.len() - 1
    }

    /// Ring without the closing duplicate
    pub fn open_ring(&self) -> &[[f64; 2]] {
        &self.ring[..self.ring.len() - 1]
    }
}

/// Ordered polyline in traversal order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Points as [x, y, z]; z is 0 for planar input
    pub points: Vec<[f64; 3]>,
    /// Whether the source carried elevations
    pub has_elevation: bool,
}

impl Path {
    /// Create a path from planar points
    pub fn from_2d(points: impl IntoIterator<Item = [f64; 2]>) -> Self {
        Self {
            points: points.into_iter().map(|p| [p[0], p[1], 0.0]).collect(),
            has_elevation: false,
        }
    }

    /// Create a path from 3D points
    pub fn from_3d(points: Vec<[f64; 3]>) -> Self {
        Self {
            points,
            has_elevation: true,
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the path has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shift every point in the plane; elevations are untouched
    pub fn translate_planar(&mut self, dx: f64, dy: f64) {
        for p in &mut self.points {
            p[0] += dx;
            p[1] += dy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_resolution_order() {
        let explicit = HeightAttributes {
            height: Some(12.5),
            levels: Some(2.0),
        };
        assert_eq!(explicit.resolve(3.0, 3.0), 12.5);

        let levels = HeightAttributes {
            height: None,
            levels: Some(4.0),
        };
        assert_eq!(levels.resolve(3.0, 3.0), 12.0);

        let zero_height = HeightAttributes {
            height: Some(0.0),
            levels: Some(2.0),
        };
        assert_eq!(zero_height.resolve(3.0, 3.0), 6.0);

        assert_eq!(HeightAttributes::default().resolve(3.0, 3.0), 3.0);
    }

    #[test]
    fn test_footprint_closes_open_ring() {
        let fp = Footprint::new(0, vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]], 6.0)
            .unwrap();
        assert_eq!(fp.ring.len(), 5);
        assert_eq!(fp.ring.first(), fp.ring.last());
        assert_eq!(fp.vertex_count(), 4);
        assert_eq!(fp.open_ring().len(), 4);
    }

    #[test]
    fn test_footprint_keeps_closed_ring() {
        let ring = vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]];
        let fp = Footprint::new(3, ring.clone(), 6.0).unwrap();
        assert_eq!(fp.ring, ring);
        assert_eq!(fp.index, 3);
    }

    #[test]
    fn test_footprint_drops_repeated_points() {
        let ring = vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 0.0],
            [0.0, 0.0],
        ];
        let fp = Footprint::new(0, ring, 3.0).unwrap();
        assert_eq!(fp.vertex_count(), 3);
    }

    #[test]
    fn test_degenerate_footprint_rejected() {
        let err = Footprint::new(5, vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]], 3.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("feature 5"));
    }

    #[test]
    fn test_collinear_footprint_rejected() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.0]];
        let err = Footprint::new(7, ring, 3.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("feature 7"));

        // A thin sliver in geographic degrees still has area
        let sliver = vec![[13.4, 52.5], [13.4001, 52.5], [13.4001, 52.50001]];
        assert!(Footprint::new(0, sliver, 3.0).is_ok());
    }

    #[test]
    fn test_zero_area_ring() {
        assert!(ring_has_zero_area(&[[0.0, 0.0], [1.0, 1.0], [3.0, 3.0]]));
        assert!(ring_has_zero_area(&[[0.0, 0.0], [1.0, 1.0]]));
        assert!(ring_has_zero_area(&[
            [500_000.0, 5_800_000.0],
            [500_001.0, 5_800_000.0],
            [500_002.0, 5_800_000.0]
        ]));
        assert!(!ring_has_zero_area(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]));
    }

    #[test]
    fn test_path_translation() {
        let mut path = Path::from_2d(vec![[10.0, 20.0], [11.0, 21.0]]);
        path.translate_planar(-10.0, -20.0);
        assert_eq!(path.points, vec![[0.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        assert!(!path.has_elevation);
        assert_eq!(path.len(), 2);
    }
}
