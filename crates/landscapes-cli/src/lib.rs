// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared plumbing for the pipeline binaries

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Initialise `env_logger` at `info`, unless `RUST_LOG` says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Write `contents` to `path` through a sibling temporary file
///
/// The rename only happens once every byte is on disk, so readers never see
/// a truncated asset and a failed run leaves any previous file in place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temporary_sibling(path)?;
    fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("moving output into {}", path.display()));
    }

    log::info!("wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

fn temporary_sibling(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("output path {} has no file name", path.display()))?;
    Ok(path.with_file_name(format!(".{}.partial", name.to_string_lossy())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.obj");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"v 0 0 0\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "v 0 0 0\n");

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.obj");
        assert!(write_atomic(&path, b"x").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_temporary_sibling_is_hidden() {
        let tmp = temporary_sibling(Path::new("out/track.geojson")).unwrap();
        assert_eq!(tmp, Path::new("out/.track.geojson.partial"));
        assert!(temporary_sibling(Path::new("/")).is_err());
    }
}
