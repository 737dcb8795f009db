// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draping polylines onto a triangle mesh

use rustc_hash::FxHashSet;

use crate::bvh::{Aabb, BvhOptions, SpatialIndex};
use crate::{Error, Mesh, Path, Point3, Result};

/// Segment parameters closer than this to an endpoint are not inserted
const PARAM_EPSILON: f64 = 1e-9;

/// Snapping parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapOptions {
    /// Insert a vertex wherever a path segment crosses a mesh edge
    pub densify: bool,
}

impl SnapOptions {
    pub fn with_densify(mut self, densify: bool) -> Self {
        self.densify = densify;
        self
    }
}

/// Result of snapping a path
#[derive(Clone, Debug, Default)]
pub struct SnappedPath {
    /// Snapped polyline, always with elevations
    pub path: Path,
    /// Input points that no mesh triangle covers, in path order
    pub diagnostics: Vec<Error>,
}

impl SnappedPath {
    /// Whether every input point found a containing triangle
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Projects path vertices onto a reference mesh
///
/// The snapper indexes its own copy of the mesh, so one snapper can drape
/// many paths.
#[derive(Clone, Debug)]
pub struct PathSnapper {
    index: SpatialIndex,
    options: SnapOptions,
}

impl PathSnapper {
    /// Index `mesh` for snapping
    pub fn new(mesh: &Mesh, options: SnapOptions) -> Result<Self> {
        let index = SpatialIndex::from_mesh(mesh, BvhOptions::default())?;
        Ok(Self { index, options })
    }

    /// Surface height at `(x, y)`, interpolated over the containing triangle
    pub fn surface_height(&self, x: f64, y: f64) -> Option<f64> {
        let location = self.index.locate(x, y)?;
        let corners = self.index.triangle(location.triangle);
        Some(
            location
                .weights
                .iter()
                .zip(corners)
                .map(|(w, p)| w * p.z)
                .sum(),
        )
    }

    /// Snap every path vertex onto the mesh surface
    ///
    /// Planar coordinates of input vertices are kept exactly; only the
    /// elevation changes. A vertex outside the mesh keeps its input
    /// elevation and is reported as `PointNotCovered`. With densification,
    /// extra vertices are inserted at mesh edge crossings between input
    /// vertices.
    pub fn snap(&self, path: &Path) -> SnappedPath {
        let mut snapped = SnappedPath::default();
        snapped.path.has_elevation = true;

        for (index, p) in path.points.iter().enumerate() {
            if self.options.densify && index > 0 {
                let previous = path.points[index - 1];
                snapped
                    .path
                    .points
                    .extend(self.edge_crossings(previous, *p));
            }

            match self.surface_height(p[0], p[1]) {
                Some(z) => snapped.path.points.push([p[0], p[1], z]),
                None => {
                    let err = Error::PointNotCovered {
                        index,
                        x: p[0],
                        y: p[1],
                    };
                    log::warn!("{}", err);
                    snapped.diagnostics.push(err);
                    snapped.path.points.push(*p);
                }
            }
        }

        log::info!(
            "snapped {} of {} path points ({} output vertices)",
            path.len() - snapped.diagnostics.len(),
            path.len(),
            snapped.path.len()
        );
        snapped
    }

    /// Points where segment `p -> q` crosses mesh edges, ordered along it
    fn edge_crossings(&self, p: [f64; 3], q: [f64; 3]) -> Vec<[f64; 3]> {
        let mut region = Aabb::empty();
        region.expand_point(&Point3::new(p[0], p[1], 0.0));
        region.expand_point(&Point3::new(q[0], q[1], 0.0));

        let d = [q[0] - p[0], q[1] - p[1]];
        let mut seen: FxHashSet<[u64; 4]> = FxHashSet::default();
        let mut crossings: Vec<(f64, [f64; 3])> = Vec::new();

        for t in self.index.query_planar(&region) {
            let corners = self.index.triangle(t);
            for i in 0..3 {
                let a = &corners[i];
                let b = &corners[(i + 1) % 3];
                if !seen.insert(edge_key(a, b)) {
                    continue;
                }

                let e = [b.x - a.x, b.y - a.y];
                let denom = cross(d, e);
                if denom.abs() < f64::EPSILON {
                    continue;
                }
                let ap = [a.x - p[0], a.y - p[1]];
                let t_seg = cross(ap, e) / denom;
                let s_edge = cross(ap, d) / denom;
                if t_seg <= PARAM_EPSILON
                    || t_seg >= 1.0 - PARAM_EPSILON
                    || !(0.0..=1.0).contains(&s_edge)
                {
                    continue;
                }
                let z = a.z + s_edge * (b.z - a.z);
                crossings.push((t_seg, [p[0] + t_seg * d[0], p[1] + t_seg * d[1], z]));
            }
        }

        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
        crossings.dedup_by(|a, b| (a.0 - b.0).abs() < PARAM_EPSILON);
        crossings.into_iter().map(|(_, point)| point).collect()
    }
}

/// Snap with default options
pub fn snap(path: &Path, mesh: &Mesh) -> Result<SnappedPath> {
    Ok(PathSnapper::new(mesh, SnapOptions::default())?.snap(path))
}

#[inline]
fn cross(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Direction-independent identity of a planar edge
fn edge_key(a: &Point3<f64>, b: &Point3<f64>) -> [u64; 4] {
    let ka = [a.x.to_bits(), a.y.to_bits()];
    let kb = [b.x.to_bits(), b.y.to_bits()];
    let (lo, hi) = if (a.x, a.y) <= (b.x, b.y) { (ka, kb) } else { (kb, ka) };
    [lo[0], lo[1], hi[0], hi[1]]
}
