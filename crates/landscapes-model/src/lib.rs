// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Landscapes Model - Shared types and trait seams for the mesh pipeline
//!
//! This crate holds the data that flows between the pipeline stages and the
//! traits that decouple them. It has no algorithms of its own.
//!
//! # Data
//!
//! - [`HeightField`] - regular elevation grid, rows normalised bottom-to-top
//! - [`Mesh`] - indexed triangle mesh with optional texture coordinates
//! - [`Footprint`] - closed building outline with a height
//! - [`Path`] - ordered polyline
//!
//! # Seams
//!
//! - [`ElevationProvider`] - "ground height below this point", implemented
//!   by the spatial index and trivially mocked in tests
//! - [`Projection`] - geographic to planar coordinates
//!
//! # Example
//!
//! ```ignore
//! use landscapes_model::{HeightField, Mesh};
//!
//! let field = HeightField::new(2, 2, vec![10.0; 4], 1.0)?;
//! println!("{} full-resolution triangles", field.full_triangle_count());
//! ```

pub mod error;
pub mod features;
pub mod heightfield;
pub mod mesh;
pub mod traits;

// Re-export all public types
pub use error::*;
pub use features::*;
pub use heightfield::*;
pub use mesh::*;
pub use traits::*;
