// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for footprint rings, plus ring orientation helpers.

use crate::{Error, Point2, Result};

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false;
            }
        }
    }

    true
}

/// Fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.extend_from_slice(&[0, i, i + 1]);
    }
    indices
}

/// Twice the signed area of an open ring; positive when counter-clockwise
pub fn ring_signed_area2(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let p = &points[i];
        let q = &points[(i + 1) % n];
        sum += p.x * q.y - q.x * p.y;
    }
    sum
}

/// Whether an open ring winds counter-clockwise
#[inline]
pub fn is_counter_clockwise(points: &[Point2<f64>]) -> bool {
    ring_signed_area2(points) > 0.0
}

/// Triangulate a simple polygon given as an open ring (no closing duplicate)
///
/// Returns triangle indices into the input points. Small convex rings are
/// fanned; everything else goes through ear clipping, which may drop
/// collinear vertices and so return fewer than `n - 2` triangles.
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::triangulation(
            "Need at least 3 points to triangulate",
        ));
    }

    // FAST PATH: Triangle - no triangulation needed
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // FAST PATH: Convex polygon - use fan triangulation
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    // Flatten points for earcutr
    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcutr::earcut(&vertices, &[], 2)
        .map_err(|e| Error::triangulation(format!("{:?}", e)))?;

    if indices.is_empty() {
        return Err(Error::triangulation(format!(
            "ear clipping produced no triangles for a {}-vertex ring",
            n
        )));
    }

    Ok(indices)
}

/// Triangulate an open ring into counter-clockwise triangles
///
/// Each triangle is checked individually and flipped if needed, so the
/// result faces up regardless of the ring's own orientation.
pub fn triangulate_ccw(points: &[Point2<f64>]) -> Result<Vec<[usize; 3]>> {
    let indices = triangulate_polygon(points)?;
    Ok(indices
        .chunks_exact(3)
        .map(|t| {
            let (a, b, c) = (&points[t[0]], &points[t[1]], &points[t[2]]);
            let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            if cross < 0.0 {
                [t[0], t[2], t[1]]
            } else {
                [t[0], t[1], t[2]]
            }
        })
        .collect())
}
