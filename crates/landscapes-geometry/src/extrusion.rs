// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building extrusion draped on terrain
//!
//! Every footprint becomes a prism standing on a flat base at the lowest
//! ground elevation found under its ring vertices. Walls are two triangles
//! per ring edge facing outward, the roof is the ear-clipped ring lifted to
//! `base + height`. Triangles own fresh vertices so buildings can be
//! appended to a shared buffer with a running index offset.

use crate::triangulation::{is_counter_clockwise, triangulate_ccw};
use crate::{
    ring_has_zero_area, ElevationProvider, Error, Footprint, HeightAttributes, Mesh, Point2,
    Projection, Result, DEFAULT_BUILDING_HEIGHT, DEFAULT_STOREY_HEIGHT,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Extrusion parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtrudeOptions {
    /// Meters per storey for features that only report levels
    pub storey_height: f64,
    /// Height of features without height or levels
    pub default_height: f64,
    /// Extrude footprints on the rayon pool (ignored without the `parallel` feature)
    pub parallel: bool,
}

impl Default for ExtrudeOptions {
    fn default() -> Self {
        Self {
            storey_height: DEFAULT_STOREY_HEIGHT,
            default_height: DEFAULT_BUILDING_HEIGHT,
            parallel: true,
        }
    }
}

impl ExtrudeOptions {
    pub fn with_storey_height(mut self, storey_height: f64) -> Self {
        self.storey_height = storey_height;
        self
    }

    pub fn with_default_height(mut self, default_height: f64) -> Self {
        self.default_height = default_height;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Building height for a feature's attributes
    pub fn resolve_height(&self, attributes: &HeightAttributes) -> f64 {
        attributes.resolve(self.storey_height, self.default_height)
    }
}

/// Outcome of a batch extrusion
#[derive(Clone, Debug, Default)]
pub struct BuildingBatch {
    /// All successfully extruded buildings, in input order
    pub mesh: Mesh,
    /// Number of buildings in `mesh`
    pub built: usize,
    /// Per-feature failures, in input order
    pub diagnostics: Vec<Error>,
}

/// Drapes footprints onto a ground surface
pub struct BuildingExtruder<'a> {
    ground: &'a dyn ElevationProvider,
    projection: Option<&'a dyn Projection>,
    options: ExtrudeOptions,
}

impl<'a> BuildingExtruder<'a> {
    /// Create an extruder over footprints already in the ground's frame
    pub fn new(ground: &'a dyn ElevationProvider, options: ExtrudeOptions) -> Self {
        Self {
            ground,
            projection: None,
            options,
        }
    }

    /// Convert footprint coordinates with `projection` before querying the ground
    pub fn with_projection(mut self, projection: &'a dyn Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn options(&self) -> &ExtrudeOptions {
        &self.options
    }

    /// Extrude a single footprint
    ///
    /// # Returns
    /// A mesh of `2 * N` wall triangles and `N - 2` roof triangles (fewer if
    /// ear clipping drops collinear vertices), or `GroundQueryFailed` naming
    /// the first ring vertex without ground below it.
    pub fn extrude(&self, footprint: &Footprint) -> Result<Mesh> {
        let ring = self.local_ring(footprint)?;
        let n = ring.len();

        let mut base = f64::INFINITY;
        for p in &ring {
            let z = self
                .ground
                .elevation_at(p.x, p.y)
                .map_err(|_| Error::GroundQueryFailed {
                    feature: footprint.index,
                    x: p.x,
                    y: p.y,
                })?;
            base = base.min(z);
        }
        let top = base + footprint.height;

        let roof = triangulate_ccw(&ring)?;
        let mut mesh = Mesh::with_capacity(3 * (2 * n + roof.len()), 2 * n + roof.len());
        let mut push = |corners: [[f64; 3]; 3]| {
            let a = mesh.push_vertex(corners[0]);
            let b = mesh.push_vertex(corners[1]);
            let c = mesh.push_vertex(corners[2]);
            mesh.push_triangle([a, b, c]);
        };

        // Walls face right of each edge for CCW rings, left for CW rings
        let ccw = is_counter_clockwise(&ring);
        for i in 0..n {
            let (p, q) = if ccw {
                (ring[i], ring[(i + 1) % n])
            } else {
                (ring[(i + 1) % n], ring[i])
            };
            let (gp, gq) = ([p.x, p.y, base], [q.x, q.y, base]);
            let (rp, rq) = ([p.x, p.y, top], [q.x, q.y, top]);
            push([gp, gq, rq]);
            push([gp, rq, rp]);
        }

        for [a, b, c] in roof {
            push([
                [ring[a].x, ring[a].y, top],
                [ring[b].x, ring[b].y, top],
                [ring[c].x, ring[c].y, top],
            ]);
        }

        Ok(mesh)
    }

    /// Extrude every footprint, isolating per-feature failures
    ///
    /// Geometry may be generated in parallel; accumulation into the shared
    /// buffer is a single sequential pass in input order, so output is
    /// deterministic.
    pub fn extrude_all(&self, footprints: &[Footprint]) -> BuildingBatch {
        let results = self.extrude_each(footprints);

        let mut batch = BuildingBatch::default();
        for result in results {
            match result {
                Ok(mesh) => {
                    batch.mesh.merge(&mesh);
                    batch.built += 1;
                }
                Err(err) => {
                    log::warn!("skipping building: {}", err);
                    batch.diagnostics.push(err);
                }
            }
        }

        log::info!(
            "extruded {} of {} buildings ({} triangles)",
            batch.built,
            footprints.len(),
            batch.mesh.triangle_count()
        );
        batch
    }

    #[cfg(feature = "parallel")]
    fn extrude_each(&self, footprints: &[Footprint]) -> Vec<Result<Mesh>> {
        if self.options.parallel {
            footprints.par_iter().map(|f| self.extrude(f)).collect()
        } else {
            footprints.iter().map(|f| self.extrude(f)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn extrude_each(&self, footprints: &[Footprint]) -> Vec<Result<Mesh>> {
        footprints.iter().map(|f| self.extrude(f)).collect()
    }

    fn local_ring(&self, footprint: &Footprint) -> Result<Vec<Point2<f64>>> {
        let ring = footprint
            .open_ring()
            .iter()
            .map(|p| match self.projection {
                Some(projection) => projection.project(p[0], p[1]).map(|(x, y)| [x, y]),
                None => Ok(*p),
            })
            .collect::<Result<Vec<_>>>()?;

        // A projection can collapse a ring that was valid in its source frame
        if ring_has_zero_area(&ring) {
            return Err(Error::invalid_input(format!(
                "feature {}: footprint encloses no area",
                footprint.index
            )));
        }

        Ok(ring.into_iter().map(|p| Point2::new(p[0], p[1])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signed_area2;
    use approx::assert_relative_eq;

    /// Ground at a constant height over a square region
    struct Plateau {
        z: f64,
        extent: f64,
    }

    impl ElevationProvider for Plateau {
        fn elevation_at(&self, x: f64, y: f64) -> Result<f64> {
            if x.abs() <= self.extent && y.abs() <= self.extent {
                Ok(self.z)
            } else {
                Err(Error::no_intersection(x, y))
            }
        }
    }

    /// Ground rising to the east
    struct Ramp;

    impl ElevationProvider for Ramp {
        fn elevation_at(&self, x: f64, _y: f64) -> Result<f64> {
            Ok(x)
        }
    }

    struct Shift(f64);

    impl Projection for Shift {
        fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
            Ok((lon + self.0, lat))
        }
    }

    fn square(index: usize, height: f64) -> Footprint {
        Footprint::new(
            index,
            vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]],
            height,
        )
        .unwrap()
    }

    /// Outward check: wall normals point away from the ring centroid
    fn assert_walls_face_out(mesh: &Mesh, center: [f64; 2]) {
        for t in 0..mesh.triangle_count() {
            let [a, b, c] = mesh.triangle_corners(t);
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            if n[2].abs() > 1e-9 {
                continue;
            }
            let mid = [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0];
            let out = [mid[0] - center[0], mid[1] - center[1]];
            assert!(n[0] * out[0] + n[1] * out[1] > 0.0, "triangle {} faces in", t);
        }
    }

    #[test]
    fn test_square_on_flat_ground() {
        let ground = Plateau { z: 0.0, extent: 10.0 };
        let extruder = BuildingExtruder::new(&ground, ExtrudeOptions::default());
        let mesh = extruder.extrude(&square(0, 6.0)).unwrap();

        assert_eq!(mesh.triangle_count(), 10);
        assert_eq!(mesh.vertex_count(), 30);

        let walls = (0..8).map(|t| mesh.triangle_corners(t));
        for corners in walls {
            assert!(corners.iter().any(|p| p[2] == 0.0));
            assert!(corners.iter().any(|p| p[2] == 6.0));
        }
        for t in 8..10 {
            let [a, b, c] = mesh.triangle_corners(t);
            assert!([a, b, c].iter().all(|p| p[2] == 6.0));
            assert!(signed_area2([a[0], a[1]], [b[0], b[1]], [c[0], c[1]]) > 0.0);
        }
        assert_walls_face_out(&mesh, [1.0, 1.0]);
    }

    #[test]
    fn test_clockwise_ring_still_faces_out() {
        let ground = Plateau { z: 3.0, extent: 10.0 };
        let ring = vec![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0]];
        let footprint = Footprint::new(0, ring, 4.0).unwrap();
        let mesh = BuildingExtruder::new(&ground, ExtrudeOptions::default())
            .extrude(&footprint)
            .unwrap();
        assert_eq!(mesh.triangle_count(), 10);
        assert_walls_face_out(&mesh, [1.0, 1.0]);
        let roof = mesh.triangle_corners(9);
        assert_relative_eq!(roof[0][2], 7.0);
    }

    #[test]
    fn test_base_is_lowest_ring_vertex() {
        let footprint = Footprint::new(
            0,
            vec![[5.0, 0.0], [9.0, 0.0], [9.0, 3.0], [5.0, 3.0]],
            10.0,
        )
        .unwrap();
        let mesh = BuildingExtruder::new(&Ramp, ExtrudeOptions::default())
            .extrude(&footprint)
            .unwrap();
        let min_z = mesh.vertices().map(|p| p[2]).fold(f64::INFINITY, f64::min);
        let max_z = mesh.vertices().map(|p| p[2]).fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(min_z, 5.0);
        assert_relative_eq!(max_z, 15.0);
    }

    #[test]
    fn test_concave_footprint_counts() {
        let ring = vec![
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 1.0],
            [1.0, 1.0],
            [1.0, 4.0],
            [0.0, 4.0],
            [0.0, 0.0],
        ];
        let footprint = Footprint::new(0, ring, 3.0).unwrap();
        let ground = Plateau { z: 0.0, extent: 10.0 };
        let mesh = BuildingExtruder::new(&ground, ExtrudeOptions::default())
            .extrude(&footprint)
            .unwrap();
        // 6 edges * 2 walls + 4 roof triangles
        assert_eq!(mesh.triangle_count(), 16);
    }

    #[test]
    fn test_outside_terrain_fails_with_location() {
        let ground = Plateau { z: 0.0, extent: 1.0 };
        let err = BuildingExtruder::new(&ground, ExtrudeOptions::default())
            .extrude(&square(4, 3.0))
            .unwrap_err();
        assert_eq!(
            err,
            Error::GroundQueryFailed {
                feature: 4,
                x: 2.0,
                y: 0.0
            }
        );
    }

    #[test]
    fn test_batch_skips_failures_and_keeps_order() {
        let ground = Plateau { z: 0.0, extent: 5.0 };
        let far = Footprint::new(
            1,
            vec![[100.0, 100.0], [102.0, 100.0], [102.0, 102.0]],
            3.0,
        )
        .unwrap();
        let footprints = vec![square(0, 6.0), far, square(2, 9.0)];

        for parallel in [true, false] {
            let options = ExtrudeOptions::default().with_parallel(parallel);
            let batch = BuildingExtruder::new(&ground, options).extrude_all(&footprints);

            assert_eq!(batch.built, 2);
            assert_eq!(batch.mesh.triangle_count(), 20);
            assert!(batch.mesh.validate().is_ok());
            assert_eq!(batch.diagnostics.len(), 1);
            assert!(matches!(
                batch.diagnostics[0],
                Error::GroundQueryFailed { feature: 1, .. }
            ));
            // Second building's roof sits at 9 and comes last
            let last = batch.mesh.triangle_corners(19);
            assert_relative_eq!(last[0][2], 9.0);
        }
    }

    #[test]
    fn test_projection_applied_before_ground_query() {
        let ground = Plateau { z: 0.0, extent: 3.0 };
        let shift = Shift(-10.0);
        let footprint = Footprint::new(
            0,
            vec![[10.0, 0.0], [12.0, 0.0], [12.0, 2.0], [10.0, 2.0]],
            3.0,
        )
        .unwrap();

        let plain = BuildingExtruder::new(&ground, ExtrudeOptions::default());
        assert!(plain.extrude(&footprint).is_err());

        let projected = BuildingExtruder::new(&ground, ExtrudeOptions::default())
            .with_projection(&shift);
        let mesh = projected.extrude(&footprint).unwrap();
        let bounds = mesh.planar_bounds().unwrap();
        assert_eq!(bounds.to_array(), [0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_ring_collapsed_by_projection_rejected() {
        struct OntoAxis;

        impl Projection for OntoAxis {
            fn project(&self, lon: f64, _lat: f64) -> Result<(f64, f64)> {
                Ok((lon, 0.0))
            }
        }

        let ground = Plateau { z: 0.0, extent: 3.0 };
        let extruder =
            BuildingExtruder::new(&ground, ExtrudeOptions::default()).with_projection(&OntoAxis);
        let err = extruder.extrude(&square(4, 3.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("feature 4"));

        let batch = extruder.extrude_all(&[square(0, 3.0)]);
        assert_eq!(batch.built, 0);
        assert_eq!(batch.diagnostics.len(), 1);
    }

    #[test]
    fn test_height_resolution() {
        let options = ExtrudeOptions::default().with_storey_height(4.0);
        let levels = HeightAttributes {
            height: None,
            levels: Some(5.0),
        };
        assert_eq!(options.resolve_height(&levels), 20.0);
        assert_eq!(
            options.resolve_height(&HeightAttributes::default()),
            DEFAULT_BUILDING_HEIGHT
        );
    }
}
