// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Indexed triangle meshes shared by every producer and the mesh writer

use crate::{BoundingBox, Error, Result};

/// Indexed triangle mesh with optional per-vertex texture coordinates
///
/// Buffers are flattened the way a GPU consumes them. Vertex indices are
/// 0-based; triangles wind counter-clockwise seen from above (+Z).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions as flattened [x, y, z, x, y, z, ...]
    pub positions: Vec<f64>,
    /// Texture coordinates as flattened [u, v, u, v, ...]; empty when absent
    pub uvs: Vec<f64>,
    /// Triangle vertex indices
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create mesh with pre-allocated capacity
    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            uvs: Vec::new(),
            indices: Vec::with_capacity(triangle_count * 3),
        }
    }

    /// Build a mesh from a flat triangle soup (9 floats per triangle)
    ///
    /// Every triangle gets three fresh vertices; nothing is deduplicated.
    pub fn from_triangle_soup(soup: &[f64]) -> Result<Self> {
        if soup.len() % 9 != 0 {
            return Err(Error::invalid_input(format!(
                "triangle soup length {} is not a multiple of 9",
                soup.len()
            )));
        }
        let vertex_count = soup.len() / 3;
        Ok(Self {
            positions: soup.to_vec(),
            uvs: Vec::new(),
            indices: (0..vertex_count as u32).collect(),
        })
    }

    /// Check if mesh is empty
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether texture coordinates are present
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Append a vertex, returning its index
    pub fn push_vertex(&mut self, p: [f64; 3]) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.extend_from_slice(&p);
        index
    }

    /// Append a vertex with a texture coordinate, returning its index
    pub fn push_vertex_uv(&mut self, p: [f64; 3], uv: [f64; 2]) -> u32 {
        self.uvs.extend_from_slice(&uv);
        self.push_vertex(p)
    }

    /// Append a triangle
    pub fn push_triangle(&mut self, tri: [u32; 3]) {
        self.indices.extend_from_slice(&tri);
    }

    /// Position of vertex `i`
    #[inline]
    pub fn vertex(&self, i: usize) -> [f64; 3] {
        [
            self.positions[3 * i],
            self.positions[3 * i + 1],
            self.positions[3 * i + 2],
        ]
    }

    /// Texture coordinate of vertex `i`, if present
    #[inline]
    pub fn uv(&self, i: usize) -> Option<[f64; 2]> {
        if self.has_uvs() {
            Some([self.uvs[2 * i], self.uvs[2 * i + 1]])
        } else {
            None
        }
    }

    /// Vertex indices of triangle `t`
    #[inline]
    pub fn triangle(&self, t: usize) -> [u32; 3] {
        [
            self.indices[3 * t],
            self.indices[3 * t + 1],
            self.indices[3 * t + 2],
        ]
    }

    /// Iterate over vertex positions
    pub fn vertices(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    /// Iterate over triangles
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Corner positions of triangle `t`
    pub fn triangle_corners(&self, t: usize) -> [[f64; 3]; 3] {
        let [a, b, c] = self.triangle(t);
        [
            self.vertex(a as usize),
            self.vertex(b as usize),
            self.vertex(c as usize),
        ]
    }

    /// Flatten into a triangle soup: 9 floats per triangle, in triangle order
    pub fn triangle_soup(&self) -> Vec<f64> {
        let mut soup = Vec::with_capacity(self.indices.len() * 3);
        for tri in self.triangles() {
            for index in tri {
                soup.extend_from_slice(&self.vertex(index as usize));
            }
        }
        soup
    }

    /// Merge another mesh into this one, offsetting its indices
    ///
    /// Texture coordinates survive only if both meshes carry them.
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let keep_uvs = (self.is_empty() || self.has_uvs()) && other.has_uvs();
        let vertex_offset = self.vertex_count() as u32;

        self.positions.extend_from_slice(&other.positions);
        if keep_uvs {
            self.uvs.extend_from_slice(&other.uvs);
        } else {
            self.uvs.clear();
        }
        self.indices
            .extend(other.indices.iter().map(|i| i + vertex_offset));
    }

    /// Multiply the planar (X, Y) coordinates by `factor`
    pub fn scale_planar(&mut self, factor: f64) {
        for p in self.positions.chunks_exact_mut(3) {
            p[0] *= factor;
            p[1] *= factor;
        }
    }

    /// Translate every vertex
    pub fn translate(&mut self, offset: [f64; 3]) {
        for p in self.positions.chunks_exact_mut(3) {
            p[0] += offset[0];
            p[1] += offset[1];
            p[2] += offset[2];
        }
    }

    /// Planar bounds of all vertices
    pub fn planar_bounds(&self) -> Option<BoundingBox> {
        let mut vertices = self.vertices();
        let first = vertices.next()?;
        let mut bbox = BoundingBox::new(first[0], first[1], first[0], first[1]);
        for p in vertices {
            bbox.min_x = bbox.min_x.min(p[0]);
            bbox.min_y = bbox.min_y.min(p[1]);
            bbox.max_x = bbox.max_x.max(p[0]);
            bbox.max_y = bbox.max_y.max(p[1]);
        }
        Some(bbox)
    }

    /// Check buffer shapes and index ranges
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(Error::invalid_input(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::invalid_input(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if self.has_uvs() && self.uvs.len() != self.vertex_count() * 2 {
            return Err(Error::invalid_input(format!(
                "{} texture coordinates for {} vertices",
                self.uvs.len() / 2,
                self.vertex_count()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::invalid_input(format!(
                "triangle index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(())
    }
}

/// Signed doubled area of a planar triangle; positive when counter-clockwise
#[inline]
pub fn signed_area2(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.push_vertex([0.0, 0.0, 1.0]);
        let b = mesh.push_vertex([1.0, 0.0, 1.0]);
        let c = mesh.push_vertex([1.0, 1.0, 1.0]);
        let d = mesh.push_vertex([0.0, 1.0, 1.0]);
        mesh.push_triangle([a, b, c]);
        mesh.push_triangle([a, c, d]);
        mesh
    }

    #[test]
    fn test_counts_and_access() {
        let mesh = unit_square();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangle(1), [0, 2, 3]);
        assert_eq!(mesh.vertex(2), [1.0, 1.0, 1.0]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut mesh = unit_square();
        let other = unit_square();
        mesh.merge(&other);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle(2), [4, 5, 6]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_merge_drops_partial_uvs() {
        let mut textured = Mesh::new();
        textured.push_vertex_uv([0.0, 0.0, 0.0], [0.0, 0.0]);
        textured.push_vertex_uv([1.0, 0.0, 0.0], [1.0, 0.0]);
        textured.push_vertex_uv([0.0, 1.0, 0.0], [0.0, 1.0]);
        textured.push_triangle([0, 1, 2]);

        let mut merged = Mesh::new();
        merged.merge(&textured);
        assert!(merged.has_uvs());

        merged.merge(&unit_square());
        assert!(!merged.has_uvs());
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_triangle_soup_round_trip() {
        let mesh = unit_square();
        let soup = mesh.triangle_soup();
        assert_eq!(soup.len(), 18);

        let rebuilt = Mesh::from_triangle_soup(&soup).unwrap();
        assert_eq!(rebuilt.triangle_count(), 2);
        assert_eq!(rebuilt.vertex_count(), 6);
        assert_eq!(rebuilt.triangle_corners(1), mesh.triangle_corners(1));

        assert!(Mesh::from_triangle_soup(&soup[..10]).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut mesh = unit_square();
        mesh.push_triangle([0, 1, 9]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_scale_and_bounds() {
        let mut mesh = unit_square();
        mesh.scale_planar(2.0);
        mesh.translate([10.0, 0.0, -1.0]);
        let bounds = mesh.planar_bounds().unwrap();
        assert_eq!(bounds.to_array(), [10.0, 0.0, 12.0, 2.0]);
        assert_eq!(mesh.vertex(0)[2], 0.0);
    }

    #[test]
    fn test_signed_area_orientation() {
        assert!(signed_area2([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]) > 0.0);
        assert!(signed_area2([0.0, 0.0], [0.0, 1.0], [1.0, 0.0]) < 0.0);
    }
}
