// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Landscapes IO - file formats at the edge of the mesh pipeline
//!
//! Everything that touches bytes lives here, so the geometry crate only
//! ever sees [`landscapes_model`] types.
//!
//! # Formats
//!
//! - **Wavefront OBJ** - terrain and building meshes, written with fixed
//!   precision and read back with `nom` parsers
//! - **GeoJSON** - building footprints (tiles of polygons) and tracks
//!   (the first line of the first feature)
//! - **GeoTIFF** - elevation rasters, first band only
//!
//! # Example
//!
//! ```ignore
//! use landscapes_io::{read_geotiff, write_obj, ObjWriteOptions};
//!
//! let field = read_geotiff("dem.tif")?;
//! let mesh = landscapes_geometry::simplify(&field, 0.5)?;
//! write_obj(std::fs::File::create("terrain.obj")?, &mesh, &ObjWriteOptions::terrain())?;
//! ```

mod error;
pub mod obj;
pub mod raster;
pub mod vector;

pub use error::{FormatError, Result};
pub use obj::{parse_obj, read_obj, to_obj_string, write_obj, MaterialRef, ObjWriteOptions};
pub use raster::{decode_geotiff, read_geotiff, GeoTransform};
pub use vector::{
    height_attributes, parse_footprints, parse_track, read_footprint_dir, read_track,
    FootprintBatch, Track,
};

#[cfg(test)]
mod tests {
    use super::*;
    use landscapes_geometry::{
        BuildingExtruder, BvhOptions, ExtrudeOptions, HeightField, Mesh, PathSnapper,
        SnapOptions, SpatialIndex, TerrainSimplifier,
    };

    const TILE: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"height": 6},
         "geometry": {"type": "Polygon", "coordinates": [[[4,4],[8,4],[8,8],[4,8],[4,4]]]}},
        {"type": "Feature", "properties": {"levels": 2},
         "geometry": {"type": "Polygon", "coordinates": [[[500,500],[501,500],[501,501]]]}}
      ]
    }"#;

    const TRACK: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"name": "walk"},
         "geometry": {"type": "LineString", "coordinates": [[1,1],[15,3],[18,18]]}}
    ]}"#;

    /// 5x5 grid with 5 m cells on the plane z = 1.25 + 0.026 x + 0.014 y
    fn tilted_field() -> HeightField {
        let samples = (0..25)
            .map(|i| 1.25 + 0.13 * (i % 5) as f32 + 0.07 * (i / 5) as f32)
            .collect();
        HeightField::new(5, 5, samples, 5.0).unwrap()
    }

    fn plane(x: f64, y: f64) -> f64 {
        1.25 + 0.026 * x + 0.014 * y
    }

    /// Every vertex of `read` matches `written` to the written precision
    fn assert_same_mesh(read: &Mesh, written: &Mesh, tolerance: f64) {
        assert_eq!(read.vertex_count(), written.vertex_count());
        assert_eq!(read.indices, written.indices);
        for (i, (r, w)) in read.vertices().zip(written.vertices()).enumerate() {
            for k in 0..3 {
                assert!(
                    (r[k] - w[k]).abs() <= tolerance,
                    "vertex {} read as {:?}, written {:?}",
                    i,
                    r,
                    w
                );
            }
        }
        assert_eq!(read.uvs.len(), written.uvs.len());
        for (r, w) in read.uvs.iter().zip(&written.uvs) {
            assert!((r - w).abs() <= 5e-5, "uv read as {}, written {}", r, w);
        }
    }

    #[test]
    fn test_terrain_buildings_and_track_through_obj() {
        let field = tilted_field();
        let terrain = TerrainSimplifier::default().simplify(&field).unwrap();
        let mut mesh = terrain.mesh;
        mesh.scale_planar(field.cell_size());

        // Terrain round trip through the OBJ text format, centimeter heights
        let text = to_obj_string(&mesh, &ObjWriteOptions::terrain()).unwrap();
        assert!(text.starts_with("mtllib terrain.mtl\nusemtl material0\n"));
        let ground_mesh = parse_obj(&text).unwrap();
        assert!(ground_mesh.has_uvs());
        assert_same_mesh(&ground_mesh, &mesh, 0.005);
        for p in ground_mesh.vertices() {
            assert!((p[2] - plane(p[0], p[1])).abs() < 1e-5, "{:?} off the plane", p);
        }

        // Buildings on the re-read terrain
        let ground = SpatialIndex::from_mesh(&ground_mesh, BvhOptions::default()).unwrap();
        let options = ExtrudeOptions::default();
        let footprints = parse_footprints(TILE, &|a| options.resolve_height(a)).unwrap();
        let batch = BuildingExtruder::new(&ground, options).extrude_all(&footprints.footprints);

        assert_eq!(batch.built, 1);
        assert_eq!(batch.diagnostics.len(), 1);
        // Base sits at the lowest corner (4, 4), the roof 6 m above it
        let base = plane(4.0, 4.0);
        for p in batch.mesh.vertices() {
            let on_base = (p[2] - base).abs() < 1e-5;
            let on_roof = (p[2] - base - 6.0).abs() < 1e-5;
            assert!(on_base || on_roof, "{:?} neither on base {} nor roof", p, base);
        }

        let text = to_obj_string(&batch.mesh, &ObjWriteOptions::buildings()).unwrap();
        let buildings = parse_obj(&text).unwrap();
        assert_eq!(buildings.triangle_count(), 10);
        assert_same_mesh(&buildings, &batch.mesh, 0.0005);

        // Track draped on the same terrain
        let track = parse_track(TRACK).unwrap();
        let snapped = PathSnapper::new(&ground_mesh, SnapOptions::default())
            .unwrap()
            .snap(&track.path);
        assert!(snapped.is_complete());
        assert_eq!(snapped.path.len(), 3);
        for (p, source) in snapped.path.points.iter().zip(&track.path.points) {
            assert_eq!([p[0], p[1]], [source[0], source[1]]);
            assert!((p[2] - plane(p[0], p[1])).abs() < 1e-5, "{:?} off the plane", p);
        }

        let output = track.to_geojson_string(&snapped.path.points);
        let reread = parse_track(&output).unwrap();
        assert!(reread.path.has_elevation);
        assert_eq!(reread.path.points, snapped.path.points);
    }
}
