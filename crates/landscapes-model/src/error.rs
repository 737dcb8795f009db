// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared by every pipeline stage

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building terrain, building or path meshes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or size-mismatched input (raster, polygon, options)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vertical ray at (x, y) did not hit the indexed surface
    #[error("No surface intersection at ({x:.3}, {y:.3})")]
    NoIntersection { x: f64, y: f64 },

    /// Ground elevation lookup failed for one footprint vertex
    #[error("Ground query failed for feature {feature} at ({x:.3}, {y:.3})")]
    GroundQueryFailed { feature: usize, x: f64, y: f64 },

    /// A path vertex lies outside every mesh triangle
    #[error("Path point {index} at ({x:.3}, {y:.3}) is not covered by the mesh")]
    PointNotCovered { index: usize, x: f64, y: f64 },

    /// Polygon triangulation failed
    #[error("Triangulation error: {0}")]
    Triangulation(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a triangulation error
    pub fn triangulation(msg: impl Into<String>) -> Self {
        Error::Triangulation(msg.into())
    }

    /// Create a no-intersection error
    pub fn no_intersection(x: f64, y: f64) -> Self {
        Error::NoIntersection { x, y }
    }
}
