// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Landscapes Geometry
//!
//! The algorithms of the mesh pipeline, independent of any file format.
//!
//! ## Overview
//!
//! - **Terrain simplification**: error-bounded Delaunay refinement of a
//!   height field into a TIN with texture coordinates
//! - **Spatial index**: median-split BVH over a triangle soup answering
//!   vertical ray and planar location queries
//! - **Building extrusion**: footprints draped on the ground as walls and an
//!   ear-clipped roof, batched with per-feature failure isolation
//! - **Path snapping**: polylines projected onto a mesh surface
//! - **Projection**: UTM on GRS80 and a local frame around a reference point
//!
//! ## Architecture
//!
//! The stages meet at the traits from `landscapes-model`:
//!
//! - `ElevationProvider`: implemented by [`SpatialIndex`], consumed by
//!   [`BuildingExtruder`]
//! - `Projection`: implemented by [`Utm`] and [`LocalFrame`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use landscapes_geometry::{
//!     BuildingExtruder, BvhOptions, ExtrudeOptions, SimplifyOptions, SpatialIndex,
//!     TerrainSimplifier,
//! };
//!
//! let terrain = TerrainSimplifier::new(SimplifyOptions::default()).simplify(&field)?;
//! let mut mesh = terrain.mesh;
//! mesh.scale_planar(field.cell_size());
//!
//! let ground = SpatialIndex::from_mesh(&mesh, BvhOptions::default())?;
//! let batch = BuildingExtruder::new(&ground, ExtrudeOptions::default()).extrude_all(&footprints);
//! println!("{} buildings, {} skipped", batch.built, batch.diagnostics.len());
//! ```

pub mod bvh;
pub mod extrusion;
pub mod projection;
pub mod simplify;
pub mod snap;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector3};

// Re-export the shared model
pub use landscapes_model::*;

// Re-export main types
pub use bvh::{Aabb, BvhOptions, BvhStats, Location, RayHit, SpatialIndex};
pub use extrusion::{BuildingBatch, BuildingExtruder, ExtrudeOptions};
pub use projection::{LocalFrame, Utm, DEFAULT_UTM_ZONE};
pub use simplify::{
    parse_max_deviation, simplify, SimplifiedTerrain, SimplifyOptions, TerrainSimplifier,
    DEFAULT_MAX_DEVIATION,
};
pub use snap::{snap, PathSnapper, SnapOptions, SnappedPath};
pub use triangulation::{is_counter_clockwise, triangulate_ccw, triangulate_polygon};
