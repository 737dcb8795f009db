// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error-bounded terrain simplification
//!
//! Greedy Delaunay refinement over a height field: start from the two
//! triangles spanning the grid corners, then repeatedly insert the sample
//! with the largest vertical error against the current surface and restore
//! the Delaunay property locally with edge flips. Every triangle caches its
//! worst sample; a max-heap over those errors yields the next insertion in
//! O(log n).
//!
//! Vertices always sit on grid points, so their heights are exact samples.
//!
//! The refinement follows Delatin by Vladimir Agafonkin
//! (<https://github.com/mapbox/delatin>, ISC license), itself based on
//! Garland and Heckbert's "Fast Polygonal Approximation of Terrains and
//! Height Fields" (1995).

use crate::{Error, HeightField, Mesh, Result};

/// Maximum vertical deviation used when the caller gives none
pub const DEFAULT_MAX_DEVIATION: f64 = 0.5;

const NONE: usize = usize::MAX;

/// Simplification parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimplifyOptions {
    /// Largest allowed vertical error, in height units
    pub max_deviation: f64,
    /// Stop refining once this many vertices exist (error bound may then be exceeded)
    pub max_vertices: Option<usize>,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            max_deviation: DEFAULT_MAX_DEVIATION,
            max_vertices: None,
        }
    }
}

impl SimplifyOptions {
    /// Set the error tolerance
    pub fn with_max_deviation(mut self, max_deviation: f64) -> Self {
        self.max_deviation = max_deviation;
        self
    }

    /// Set a vertex budget
    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = Some(max_vertices);
        self
    }
}

/// Parse a user-supplied tolerance
///
/// Anything that is not a number (including `NaN`) falls back to
/// [`DEFAULT_MAX_DEVIATION`]. Zero and negative values are passed through
/// so that [`TerrainSimplifier::simplify`] rejects them.
pub fn parse_max_deviation(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if !v.is_nan() => v,
        _ => DEFAULT_MAX_DEVIATION,
    }
}

/// Simplified terrain together with refinement statistics
#[derive(Clone, Debug)]
pub struct SimplifiedTerrain {
    /// Mesh in grid coordinates (one unit per sample) with texture coordinates
    pub mesh: Mesh,
    /// Largest remaining vertical error
    pub max_error: f64,
    /// Root-mean-square deviation over all samples
    pub rmsd: f64,
    /// Number of inserted points
    pub steps: usize,
    /// Triangle count of the unsimplified grid
    pub full_triangle_count: usize,
}

impl SimplifiedTerrain {
    /// Fraction of the full-grid triangles that were removed, in percent
    pub fn reduction_percent(&self) -> f64 {
        if self.full_triangle_count == 0 {
            return 0.0;
        }
        let kept = self.mesh.triangle_count() as f64 / self.full_triangle_count as f64;
        (1.0 - kept) * 100.0
    }
}

/// Adaptive height field triangulator
#[derive(Clone, Debug, Default)]
pub struct TerrainSimplifier {
    options: SimplifyOptions,
}

impl TerrainSimplifier {
    /// Create a simplifier
    pub fn new(options: SimplifyOptions) -> Self {
        Self { options }
    }

    /// Configured options
    pub fn options(&self) -> &SimplifyOptions {
        &self.options
    }

    /// Simplify `field` until every sample lies within the tolerance
    ///
    /// # Returns
    /// The mesh in grid coordinates. Texture coordinates follow the tile
    /// convention `u = x * res / (bbox_width - res)`, which assumes the
    /// bounding box spans `samples * res`.
    pub fn simplify(&self, field: &HeightField) -> Result<SimplifiedTerrain> {
        let max_deviation = self.options.max_deviation;
        if !(max_deviation > 0.0) {
            return Err(Error::invalid_input(format!(
                "max deviation must be positive, got {}",
                max_deviation
            )));
        }
        if field.samples().len() != field.width() * field.height() {
            return Err(Error::invalid_input(format!(
                "sample count {} does not match {}x{}",
                field.samples().len(),
                field.width(),
                field.height()
            )));
        }

        let mut tin = Refinement::new(field);
        let vertex_budget = self.options.max_vertices.unwrap_or(usize::MAX);
        let mut steps = 0;
        while tin.max_error() > max_deviation && tin.vertex_count() < vertex_budget {
            tin.refine();
            steps += 1;
        }

        let max_error = tin.max_error();
        let rmsd = tin.rmsd();
        log::debug!(
            "refined {}x{} grid in {} steps (max error {:.3}, rmsd {:.3})",
            field.width(),
            field.height(),
            steps,
            max_error,
            rmsd
        );

        Ok(SimplifiedTerrain {
            mesh: tin.into_mesh(),
            max_error,
            rmsd,
            steps,
            full_triangle_count: field.full_triangle_count(),
        })
    }
}

/// Simplify with default options apart from the tolerance
pub fn simplify(field: &HeightField, max_deviation: f64) -> Result<Mesh> {
    let options = SimplifyOptions::default().with_max_deviation(max_deviation);
    TerrainSimplifier::new(options)
        .simplify(field)
        .map(|terrain| terrain.mesh)
}

/// Incremental triangulation state
///
/// Triangles live in flat arrays: triangle `t` owns half-edges `3t..3t+3`,
/// and `halfedges[e]` is the twin half-edge in the neighbouring triangle
/// (or `NONE` on the boundary). Triangles are CW in grid coordinates.
struct Refinement<'a> {
    field: &'a HeightField,
    coords: Vec<usize>,
    triangles: Vec<usize>,
    halfedges: Vec<usize>,
    candidates: Vec<usize>,
    queue_indices: Vec<usize>,
    queue: Vec<usize>,
    errors: Vec<f64>,
    rms: Vec<f64>,
    rms_sum: f64,
    pending: Vec<usize>,
}

impl<'a> Refinement<'a> {
    fn new(field: &'a HeightField) -> Self {
        let mut tin = Self {
            field,
            coords: Vec::new(),
            triangles: Vec::new(),
            halfedges: Vec::new(),
            candidates: Vec::new(),
            queue_indices: Vec::new(),
            queue: Vec::new(),
            errors: Vec::new(),
            rms: Vec::new(),
            rms_sum: 0.0,
            pending: Vec::new(),
        };

        let x1 = field.width() - 1;
        let y1 = field.height() - 1;
        let p0 = tin.add_point(0, 0);
        let p1 = tin.add_point(x1, 0);
        let p2 = tin.add_point(0, y1);
        let p3 = tin.add_point(x1, y1);

        let t0 = tin.add_triangle(p3, p0, p2, NONE, NONE, NONE, None);
        tin.add_triangle(p0, p3, p1, t0, NONE, NONE, None);
        tin.flush();
        tin
    }

    fn vertex_count(&self) -> usize {
        self.coords.len() / 2
    }

    fn max_error(&self) -> f64 {
        self.errors.first().copied().unwrap_or(0.0)
    }

    fn rmsd(&self) -> f64 {
        if self.rms_sum > 0.0 {
            (self.rms_sum / (self.field.width() * self.field.height()) as f64).sqrt()
        } else {
            0.0
        }
    }

    fn refine(&mut self) {
        self.step();
        self.flush();
    }

    #[inline]
    fn height_at(&self, x: usize, y: usize) -> f64 {
        self.field.sample(x, y) as f64
    }

    #[inline]
    fn point(&self, p: usize) -> (f64, f64) {
        (self.coords[2 * p] as f64, self.coords[2 * p + 1] as f64)
    }

    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for &t in &pending {
            let a = self.triangles[3 * t];
            let b = self.triangles[3 * t + 1];
            let c = self.triangles[3 * t + 2];
            self.find_candidate(a, b, c, t);
        }
        self.pending = pending;
        self.pending.clear();
    }

    /// Scan the samples inside triangle `t` for the largest error
    ///
    /// Rasterises the triangle with edge functions stepped incrementally;
    /// heights are pre-divided by the doubled area so the interpolated
    /// height is a plain dot product with the edge functions.
    fn find_candidate(&mut self, p0: usize, p1: usize, p2: usize, t: usize) {
        let (p0x, p0y) = (self.coords[2 * p0], self.coords[2 * p0 + 1]);
        let (p1x, p1y) = (self.coords[2 * p1], self.coords[2 * p1 + 1]);
        let (p2x, p2y) = (self.coords[2 * p2], self.coords[2 * p2 + 1]);

        let min_x = p0x.min(p1x).min(p2x);
        let min_y = p0y.min(p1y).min(p2y);
        let max_x = p0x.max(p1x).max(p2x);
        let max_y = p0y.max(p1y).max(p2y);

        let (fx0, fy0) = (p0x as f64, p0y as f64);
        let (fx1, fy1) = (p1x as f64, p1y as f64);
        let (fx2, fy2) = (p2x as f64, p2y as f64);
        let (fmin_x, fmin_y) = (min_x as f64, min_y as f64);

        // Edge functions at the bounding box corner
        let mut w00 = orient(fx1, fy1, fx2, fy2, fmin_x, fmin_y);
        let mut w01 = orient(fx2, fy2, fx0, fy0, fmin_x, fmin_y);
        let mut w02 = orient(fx0, fy0, fx1, fy1, fmin_x, fmin_y);

        // Per-step increments
        let a01 = fy1 - fy0;
        let b01 = fx0 - fx1;
        let a12 = fy2 - fy1;
        let b12 = fx1 - fx2;
        let a20 = fy0 - fy2;
        let b20 = fx2 - fx0;

        let area = orient(fx0, fy0, fx1, fy1, fx2, fy2);
        let z0 = self.height_at(p0x, p0y) / area;
        let z1 = self.height_at(p1x, p1y) / area;
        let z2 = self.height_at(p2x, p2y) / area;

        let mut max_error = 0.0f64;
        let mut mx = 0;
        let mut my = 0;
        let mut rms = 0.0;

        for y in min_y..=max_y {
            // Skip to the first column inside the triangle
            let mut dx = 0.0f64;
            if w00 < 0.0 && a12 != 0.0 {
                dx = dx.max((-w00 / a12).floor());
            }
            if w01 < 0.0 && a20 != 0.0 {
                dx = dx.max((-w01 / a20).floor());
            }
            if w02 < 0.0 && a01 != 0.0 {
                dx = dx.max((-w02 / a01).floor());
            }

            let mut w0 = w00 + a12 * dx;
            let mut w1 = w01 + a20 * dx;
            let mut w2 = w02 + a01 * dx;

            let mut was_inside = false;
            let start = min_x + dx as usize;
            for x in start..=max_x {
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    was_inside = true;

                    let z = z0 * w0 + z1 * w1 + z2 * w2;
                    let dz = (z - self.height_at(x, y)).abs();
                    rms += dz * dz;
                    if dz > max_error {
                        max_error = dz;
                        mx = x;
                        my = y;
                    }
                } else if was_inside {
                    break;
                }

                w0 += a12;
                w1 += a20;
                w2 += a01;
            }

            w00 += b12;
            w01 += b20;
            w02 += b01;
        }

        if (mx == p0x && my == p0y) || (mx == p1x && my == p1y) || (mx == p2x && my == p2y) {
            max_error = 0.0;
        }

        self.candidates[2 * t] = mx;
        self.candidates[2 * t + 1] = my;
        self.rms[t] = rms;

        self.queue_push(t, max_error, rms);
    }

    /// Insert the worst sample of the worst triangle
    fn step(&mut self) {
        let t = self.queue_pop();

        let e0 = 3 * t;
        let e1 = e0 + 1;
        let e2 = e0 + 2;

        let p0 = self.triangles[e0];
        let p1 = self.triangles[e1];
        let p2 = self.triangles[e2];

        let (ax, ay) = self.point(p0);
        let (bx, by) = self.point(p1);
        let (cx, cy) = self.point(p2);
        let (px, py) = (self.candidates[2 * t], self.candidates[2 * t + 1]);

        let pn = self.add_point(px, py);
        let (px, py) = (px as f64, py as f64);

        if orient(ax, ay, bx, by, px, py) == 0.0 {
            self.handle_collinear(pn, e0);
        } else if orient(bx, by, cx, cy, px, py) == 0.0 {
            self.handle_collinear(pn, e1);
        } else if orient(cx, cy, ax, ay, px, py) == 0.0 {
            self.handle_collinear(pn, e2);
        } else {
            let h0 = self.halfedges[e0];
            let h1 = self.halfedges[e1];
            let h2 = self.halfedges[e2];

            let t0 = self.add_triangle(p0, p1, pn, h0, NONE, NONE, Some(e0));
            let t1 = self.add_triangle(p1, p2, pn, h1, NONE, t0 + 1, None);
            let t2 = self.add_triangle(p2, p0, pn, h2, t0 + 2, t1 + 1, None);

            self.legalize(t0);
            self.legalize(t1);
            self.legalize(t2);
        }
    }

    fn add_point(&mut self, x: usize, y: usize) -> usize {
        let i = self.coords.len() / 2;
        self.coords.push(x);
        self.coords.push(y);
        i
    }

    /// Write a triangle at half-edge `slot` (or append one) and link its twins
    ///
    /// Returns the first half-edge of the triangle.
    #[allow(clippy::too_many_arguments)]
    fn add_triangle(
        &mut self,
        a: usize,
        b: usize,
        c: usize,
        ab: usize,
        bc: usize,
        ca: usize,
        slot: Option<usize>,
    ) -> usize {
        let e = slot.unwrap_or(self.triangles.len());
        let t = e / 3;

        if e == self.triangles.len() {
            self.triangles.extend_from_slice(&[a, b, c]);
            self.halfedges.extend_from_slice(&[ab, bc, ca]);
            self.candidates.extend_from_slice(&[0, 0]);
            self.queue_indices.push(NONE);
            self.rms.push(0.0);
        } else {
            self.triangles[e..e + 3].copy_from_slice(&[a, b, c]);
            self.halfedges[e..e + 3].copy_from_slice(&[ab, bc, ca]);
            self.candidates[2 * t] = 0;
            self.candidates[2 * t + 1] = 0;
            self.queue_indices[t] = NONE;
            self.rms[t] = 0.0;
        }

        if ab != NONE {
            self.halfedges[ab] = e;
        }
        if bc != NONE {
            self.halfedges[bc] = e + 1;
        }
        if ca != NONE {
            self.halfedges[ca] = e + 2;
        }

        self.pending.push(t);
        e
    }

    /// Flip half-edge `a` if its opposite point lies in the circumcircle
    fn legalize(&mut self, a: usize) {
        let b = self.halfedges[a];
        if b == NONE {
            return;
        }

        let a0 = a - a % 3;
        let b0 = b - b % 3;
        let al = a0 + (a + 1) % 3;
        let ar = a0 + (a + 2) % 3;
        let bl = b0 + (b + 2) % 3;
        let br = b0 + (b + 1) % 3;

        let p0 = self.triangles[ar];
        let pr = self.triangles[a];
        let pl = self.triangles[al];
        let p1 = self.triangles[bl];

        if !in_circle(self.point(p0), self.point(pr), self.point(pl), self.point(p1)) {
            return;
        }

        let hal = self.halfedges[al];
        let har = self.halfedges[ar];
        let hbl = self.halfedges[bl];
        let hbr = self.halfedges[br];

        self.queue_remove(a0 / 3);
        self.queue_remove(b0 / 3);

        let t0 = self.add_triangle(p0, p1, pl, NONE, hbl, hal, Some(a0));
        let t1 = self.add_triangle(p1, p0, pr, t0, har, hbr, Some(b0));

        self.legalize(t0 + 1);
        self.legalize(t1 + 2);
    }

    /// Insert point `pn` lying exactly on half-edge `a`
    fn handle_collinear(&mut self, pn: usize, a: usize) {
        let a0 = a - a % 3;
        let al = a0 + (a + 1) % 3;
        let ar = a0 + (a + 2) % 3;
        let p0 = self.triangles[ar];
        let pr = self.triangles[a];
        let pl = self.triangles[al];
        let hal = self.halfedges[al];
        let har = self.halfedges[ar];

        let b = self.halfedges[a];

        if b == NONE {
            // Point on the grid boundary
            let t0 = self.add_triangle(pn, p0, pr, NONE, har, NONE, Some(a0));
            let t1 = self.add_triangle(p0, pn, pl, t0, NONE, hal, None);
            self.legalize(t0 + 1);
            self.legalize(t1 + 2);
            return;
        }

        let b0 = b - b % 3;
        let bl = b0 + (b + 2) % 3;
        let br = b0 + (b + 1) % 3;
        let p1 = self.triangles[bl];
        let hbl = self.halfedges[bl];
        let hbr = self.halfedges[br];

        self.queue_remove(b0 / 3);

        let t0 = self.add_triangle(p0, pr, pn, har, NONE, NONE, Some(a0));
        let t1 = self.add_triangle(pr, p1, pn, hbr, NONE, t0 + 1, Some(b0));
        let t2 = self.add_triangle(p1, pl, pn, hbl, NONE, t1 + 1, None);
        let t3 = self.add_triangle(pl, p0, pn, hal, t0 + 2, t2 + 1, None);

        self.legalize(t0);
        self.legalize(t1);
        self.legalize(t2);
        self.legalize(t3);
    }

    fn queue_push(&mut self, t: usize, error: f64, rms: f64) {
        let i = self.queue.len();
        self.queue_indices[t] = i;
        self.queue.push(t);
        self.errors.push(error);
        self.rms_sum += rms;
        self.queue_up(i);
    }

    fn queue_pop(&mut self) -> usize {
        let n = self.queue.len() - 1;
        self.queue_swap(0, n);
        self.queue_down(0, n);
        self.queue_pop_back()
    }

    fn queue_pop_back(&mut self) -> usize {
        let t = self.queue.pop().unwrap_or(NONE);
        self.errors.pop();
        if t != NONE {
            self.rms_sum -= self.rms[t];
            self.queue_indices[t] = NONE;
        }
        t
    }

    /// Drop triangle `t` from the heap, or from the pending list if it
    /// has not been scanned yet
    fn queue_remove(&mut self, t: usize) {
        let i = self.queue_indices[t];
        if i == NONE {
            if let Some(it) = self.pending.iter().position(|&p| p == t) {
                self.pending.swap_remove(it);
            }
            return;
        }
        let n = self.queue.len() - 1;
        if n != i {
            self.queue_swap(i, n);
            if !self.queue_down(i, n) {
                self.queue_up(i);
            }
        }
        self.queue_pop_back();
    }

    #[inline]
    fn queue_less(&self, i: usize, j: usize) -> bool {
        self.errors[i] > self.errors[j]
    }

    fn queue_swap(&mut self, i: usize, j: usize) {
        let pi = self.queue[i];
        let pj = self.queue[j];
        self.queue[i] = pj;
        self.queue[j] = pi;
        self.queue_indices[pi] = j;
        self.queue_indices[pj] = i;
        self.errors.swap(i, j);
    }

    fn queue_up(&mut self, mut j: usize) {
        while j > 0 {
            let i = (j - 1) / 2;
            if !self.queue_less(j, i) {
                break;
            }
            self.queue_swap(i, j);
            j = i;
        }
    }

    fn queue_down(&mut self, i0: usize, n: usize) -> bool {
        let mut i = i0;
        loop {
            let j1 = 2 * i + 1;
            if j1 >= n {
                break;
            }
            let j2 = j1 + 1;
            let mut j = j1;
            if j2 < n && self.queue_less(j2, j1) {
                j = j2;
            }
            if !self.queue_less(j, i) {
                break;
            }
            self.queue_swap(i, j);
            i = j;
        }
        i > i0
    }

    /// Emit the triangulation as a CCW mesh with tile texture coordinates
    fn into_mesh(self) -> Mesh {
        let field = self.field;
        let res = field.cell_size();
        let bbox = field.bbox();
        let u_span = bbox.width() - res;
        let v_span = bbox.height() - res;

        let mut mesh = Mesh::with_capacity(self.vertex_count(), self.triangles.len() / 3);
        for p in 0..self.vertex_count() {
            let (x, y) = (self.coords[2 * p], self.coords[2 * p + 1]);
            let (fx, fy) = (x as f64, y as f64);
            let z = self.height_at(x, y);
            mesh.push_vertex_uv([fx, fy, z], [fx * res / u_span, fy * res / v_span]);
        }
        // Internal triangles are CW; swap the first two corners
        for tri in self.triangles.chunks_exact(3) {
            mesh.push_triangle([tri[1] as u32, tri[0] as u32, tri[2] as u32]);
        }
        mesh
    }
}

#[inline]
fn orient(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) -> f64 {
    (bx - cx) * (ay - cy) - (by - cy) * (ax - cx)
}

fn in_circle(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let dx = a.0 - p.0;
    let dy = a.1 - p.1;
    let ex = b.0 - p.0;
    let ey = b.1 - p.1;
    let fx = c.0 - p.0;
    let fy = c.1 - p.1;

    let ap = dx * dx + dy * dy;
    let bp = ex * ex + ey * ey;
    let cp = fx * fx + fy * fy;

    dx * (ey * cp - bp * fy) - dy * (ex * cp - bp * fx) + ap * (ex * fy - ey * fx) < 0.0
}
