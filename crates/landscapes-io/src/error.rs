// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for format decoding and encoding

use thiserror::Error;

/// Result type alias for format operations
pub type Result<T> = std::result::Result<T, FormatError>;

/// Errors raised at the file-format boundary
#[derive(Error, Debug)]
pub enum FormatError {
    /// Underlying read or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed OBJ record
    #[error("OBJ line {line}: {message}")]
    Obj { line: usize, message: String },

    /// Malformed GeoJSON document
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// GeoJSON that parses but does not have the expected shape
    #[error("Unsupported feature {index}: {message}")]
    Feature { index: usize, message: String },

    /// TIFF decoding failure
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Raster without usable georeferencing or samples
    #[error("Raster error: {0}")]
    Raster(String),

    /// Invariant violated by decoded data
    #[error(transparent)]
    Model(#[from] landscapes_model::Error),
}

impl FormatError {
    /// Create an OBJ error for a 1-based line number
    pub fn obj(line: usize, msg: impl Into<String>) -> Self {
        FormatError::Obj {
            line,
            message: msg.into(),
        }
    }

    /// Create an unsupported-feature error
    pub fn feature(index: usize, msg: impl Into<String>) -> Self {
        FormatError::Feature {
            index,
            message: msg.into(),
        }
    }

    /// Create a raster error
    pub fn raster(msg: impl Into<String>) -> Self {
        FormatError::Raster(msg.into())
    }
}
