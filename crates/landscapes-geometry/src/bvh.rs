// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounding volume hierarchy for ground queries
//!
//! A median-split BVH over a triangle soup, specialised for vertical rays
//! (`direction = (0, 0, -1)`) and planar point location. The index keeps
//! its own copy of the geometry and is immutable once built, so it can be
//! shared between threads without locking.

use crate::{ElevationProvider, Error, Mesh, Point3, Result, Vector3};

/// Default maximum triangle count per leaf
pub const DEFAULT_LEAF_SIZE: usize = 5;

/// Default height of the ray origin, well above any real terrain
pub const DEFAULT_RAY_ORIGIN_Z: f64 = 10_000.0;

/// Tolerance for barycentric tests, so points on shared edges always hit
const EPSILON: f64 = 1e-9;

/// Index construction and query parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhOptions {
    /// Maximum triangles per leaf
    pub leaf_size: usize,
    /// Z coordinate the downward rays start from
    pub ray_origin_z: f64,
    /// Ignore triangles facing downward
    pub cull_backfaces: bool,
}

impl Default for BvhOptions {
    fn default() -> Self {
        Self {
            leaf_size: DEFAULT_LEAF_SIZE,
            ray_origin_z: DEFAULT_RAY_ORIGIN_Z,
            cull_backfaces: false,
        }
    }
}

impl BvhOptions {
    /// Set the leaf size (clamped to at least 1)
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size.max(1);
        self
    }

    /// Set the ray origin height
    pub fn with_ray_origin_z(mut self, z: f64) -> Self {
        self.ray_origin_z = z;
        self
    }

    /// Enable or disable backface culling
    pub fn with_cull_backfaces(mut self, cull: bool) -> Self {
        self.cull_backfaces = cull;
        self
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn expand_point(&mut self, p: &Point3<f64>) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Whether the planar point lies inside the XY footprint
    #[inline]
    pub fn contains_planar(&self, x: f64, y: f64) -> bool {
        x >= self.min[0] - EPSILON
            && x <= self.max[0] + EPSILON
            && y >= self.min[1] - EPSILON
            && y <= self.max[1] + EPSILON
    }

    /// Whether the XY footprints of two boxes overlap
    #[inline]
    pub fn overlaps_planar(&self, other: &Aabb) -> bool {
        self.min[0] <= other.max[0] + EPSILON
            && self.max[0] >= other.min[0] - EPSILON
            && self.min[1] <= other.max[1] + EPSILON
            && self.max[1] >= other.min[1] - EPSILON
    }
}

#[derive(Clone, Copy, Debug)]
enum BvhNode {
    /// Range `first..first + count` of the triangle order
    Leaf { bounds: Aabb, first: usize, count: usize },
    Internal { bounds: Aabb, left: usize, right: usize },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Internal { bounds, .. } => bounds,
        }
    }
}

/// Hit of a vertical ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Triangle index in the source soup
    pub triangle: usize,
    /// Elevation of the hit point
    pub z: f64,
}

/// Planar point location result
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    /// Triangle index in the source soup
    pub triangle: usize,
    /// Barycentric weights of the triangle's corners
    pub weights: [f64; 3],
}

/// Construction statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BvhStats {
    pub triangles: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
}

/// BVH over a triangle soup answering vertical ray queries
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    triangles: Vec<[Point3<f64>; 3]>,
    /// Triangle ids in leaf order
    order: Vec<usize>,
    nodes: Vec<BvhNode>,
    options: BvhOptions,
    stats: BvhStats,
}

impl SpatialIndex {
    /// Build an index over a flat triangle soup (9 floats per triangle)
    pub fn build(soup: &[f64], options: BvhOptions) -> Result<Self> {
        if soup.len() % 9 != 0 {
            return Err(Error::invalid_input(format!(
                "triangle soup length {} is not a multiple of 9",
                soup.len()
            )));
        }
        if soup.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_input("triangle soup contains non-finite values"));
        }

        let triangles: Vec<[Point3<f64>; 3]> = soup
            .chunks_exact(9)
            .map(|t| {
                [
                    Point3::new(t[0], t[1], t[2]),
                    Point3::new(t[3], t[4], t[5]),
                    Point3::new(t[6], t[7], t[8]),
                ]
            })
            .collect();

        let leaf_size = options.leaf_size.max(1);
        let mut builder = Builder {
            triangles: &triangles,
            centroids: triangles
                .iter()
                .map(|[a, b, c]| [(a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0])
                .collect(),
            order: (0..triangles.len()).collect(),
            nodes: Vec::with_capacity(2 * triangles.len() / leaf_size + 1),
            leaf_size,
            stats: BvhStats {
                triangles: triangles.len(),
                ..BvhStats::default()
            },
        };
        if !triangles.is_empty() {
            builder.build_recursive(0, triangles.len(), 1);
        }

        let Builder {
            order,
            nodes,
            mut stats,
            ..
        } = builder;
        stats.nodes = nodes.len();

        log::debug!(
            "built BVH: {} triangles, {} nodes, {} leaves, depth {}",
            stats.triangles,
            stats.nodes,
            stats.leaves,
            stats.depth
        );

        Ok(Self {
            triangles,
            order,
            nodes,
            options,
            stats,
        })
    }

    /// Build an index over the triangles of a mesh
    ///
    /// Triangle ids in query results match the mesh's triangle order.
    pub fn from_mesh(mesh: &Mesh, options: BvhOptions) -> Result<Self> {
        mesh.validate()?;
        Self::build(&mesh.triangle_soup(), options)
    }

    /// Construction statistics
    pub fn stats(&self) -> BvhStats {
        self.stats
    }

    /// Configured options
    pub fn options(&self) -> &BvhOptions {
        &self.options
    }

    /// Number of indexed triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Corners of triangle `t`
    pub fn triangle(&self, t: usize) -> &[Point3<f64>; 3] {
        &self.triangles[t]
    }

    /// Bounds of the whole index, if it holds any triangle
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| *n.bounds())
    }

    /// Elevation of the first surface hit by a ray cast straight down
    /// from `ray_origin_z` above `(x, y)`
    pub fn intersect_vertical_ray(&self, x: f64, y: f64) -> Result<f64> {
        self.cast_vertical_ray(x, y)
            .map(|hit| hit.z)
            .ok_or(Error::NoIntersection { x, y })
    }

    /// Like [`Self::intersect_vertical_ray`], also reporting the triangle
    pub fn cast_vertical_ray(&self, x: f64, y: f64) -> Option<RayHit> {
        let origin = Point3::new(x, y, self.options.ray_origin_z);
        let direction = Vector3::new(0.0, 0.0, -1.0);

        let mut best: Option<(f64, usize)> = None;
        self.visit_leaves(
            |bounds| bounds.contains_planar(x, y) && bounds.min[2] <= origin.z,
            |t| {
                if let Some(dist) =
                    ray_triangle(&origin, &direction, &self.triangles[t], self.options.cull_backfaces)
                {
                    if best.map_or(true, |(d, b)| dist < d || (dist == d && t < b)) {
                        best = Some((dist, t));
                    }
                }
            },
        );

        best.map(|(dist, triangle)| RayHit {
            triangle,
            z: origin.z - dist,
        })
    }

    /// Find the triangle whose planar projection contains `(x, y)`
    ///
    /// Vertical and degenerate triangles are skipped. When the point lies
    /// on a shared edge the lowest triangle id wins, so results are stable.
    pub fn locate(&self, x: f64, y: f64) -> Option<Location> {
        let mut found: Option<Location> = None;
        self.visit_leaves(
            |bounds| bounds.contains_planar(x, y),
            |t| {
                if found.map_or(false, |f| f.triangle < t) {
                    return;
                }
                if let Some(weights) = planar_barycentric(&self.triangles[t], x, y) {
                    found = Some(Location { triangle: t, weights });
                }
            },
        );
        found
    }

    /// Ids of all triangles whose bounds overlap `region` in the plane
    pub fn query_planar(&self, region: &Aabb) -> Vec<usize> {
        let mut hits = Vec::new();
        self.visit_leaves(
            |bounds| bounds.overlaps_planar(region),
            |t| {
                let mut tb = Aabb::empty();
                for p in &self.triangles[t] {
                    tb.expand_point(p);
                }
                if tb.overlaps_planar(region) {
                    hits.push(t);
                }
            },
        );
        hits.sort_unstable();
        hits
    }

    /// Depth-first traversal of every leaf whose ancestors pass `enter`
    fn visit_leaves(&self, enter: impl Fn(&Aabb) -> bool, mut visit: impl FnMut(usize)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = Vec::with_capacity(64);
        stack.push(0usize);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !enter(node.bounds()) {
                continue;
            }
            match *node {
                BvhNode::Leaf { first, count, .. } => {
                    for &t in &self.order[first..first + count] {
                        visit(t);
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }
}

impl ElevationProvider for SpatialIndex {
    fn elevation_at(&self, x: f64, y: f64) -> Result<f64> {
        self.intersect_vertical_ray(x, y)
    }
}

struct Builder<'a> {
    triangles: &'a [[Point3<f64>; 3]],
    centroids: Vec<[f64; 2]>,
    order: Vec<usize>,
    nodes: Vec<BvhNode>,
    leaf_size: usize,
    stats: BvhStats,
}

impl Builder<'_> {
    /// Build the subtree over `order[start..end]`, returning its node index
    fn build_recursive(&mut self, start: usize, end: usize, depth: usize) -> usize {
        self.stats.depth = self.stats.depth.max(depth);

        let mut bounds = Aabb::empty();
        let mut centroid_bounds = Aabb::empty();
        for &t in &self.order[start..end] {
            for p in &self.triangles[t] {
                bounds.expand_point(p);
            }
            let c = self.centroids[t];
            centroid_bounds.expand_point(&Point3::new(c[0], c[1], 0.0));
        }

        let count = end - start;
        let extent_x = centroid_bounds.max[0] - centroid_bounds.min[0];
        let extent_y = centroid_bounds.max[1] - centroid_bounds.min[1];

        // Coincident centroids cannot be separated; keep them together
        if count <= self.leaf_size || (extent_x <= 0.0 && extent_y <= 0.0) {
            self.stats.leaves += 1;
            self.nodes.push(BvhNode::Leaf {
                bounds,
                first: start,
                count,
            });
            return self.nodes.len() - 1;
        }

        // Split the longest planar axis at the centroid median
        let axis = if extent_x >= extent_y { 0 } else { 1 };
        let mid = start + count / 2;
        let centroids = &self.centroids;
        self.order[start..end].select_nth_unstable_by(count / 2, |&a, &b| {
            centroids[a][axis].total_cmp(&centroids[b][axis])
        });

        let index = self.nodes.len();
        self.nodes.push(BvhNode::Internal {
            bounds,
            left: 0,
            right: 0,
        });
        let left = self.build_recursive(start, mid, depth + 1);
        let right = self.build_recursive(mid, end, depth + 1);
        self.nodes[index] = BvhNode::Internal {
            bounds,
            left,
            right,
        };
        index
    }
}

/// Möller-Trumbore ray/triangle intersection, returning the ray distance
///
/// Barycentric bounds are widened by `EPSILON` so rays through shared
/// edges and vertices never fall through the cracks.
fn ray_triangle(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    tri: &[Point3<f64>; 3],
    cull_backfaces: bool,
) -> Option<f64> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let pvec = direction.cross(&edge2);
    let det = edge1.dot(&pvec);

    if cull_backfaces {
        if det < EPSILON {
            return None;
        }
    } else if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = origin - tri[0];
    let u = tvec.dot(&pvec) * inv_det;
    if !(-EPSILON..=1.0 + EPSILON).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = direction.dot(&qvec) * inv_det;
    if v < -EPSILON || u + v > 1.0 + EPSILON {
        return None;
    }

    let dist = edge2.dot(&qvec) * inv_det;
    if dist >= 0.0 {
        Some(dist)
    } else {
        None
    }
}

/// Barycentric weights of `(x, y)` in the planar projection of `tri`
pub(crate) fn planar_barycentric(tri: &[Point3<f64>; 3], x: f64, y: f64) -> Option<[f64; 3]> {
    let [a, b, c] = tri;
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < EPSILON {
        return None;
    }
    let wa = ((b.y - c.y) * (x - c.x) + (c.x - b.x) * (y - c.y)) / det;
    let wb = ((c.y - a.y) * (x - c.x) + (a.x - c.x) * (y - c.y)) / det;
    let wc = 1.0 - wa - wb;
    if wa >= -EPSILON && wb >= -EPSILON && wc >= -EPSILON {
        Some([wa, wb, wc])
    } else {
        None
    }
}
