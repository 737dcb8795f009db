// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drape the first line of a GeoJSON track onto a terrain OBJ

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use landscapes_cli::{init_logging, write_atomic};
use landscapes_geometry::{PathSnapper, SnapOptions};
use landscapes_io::{read_obj, read_track};
use log::warn;

#[derive(Parser, Debug)]
#[command(name = "clamp-path", version, about, allow_negative_numbers = true)]
struct Args {
    /// Track (GeoJSON, first feature is used)
    input_geojson: PathBuf,

    /// Terrain mesh in the local frame
    obj_file: PathBuf,

    /// X of the terrain origin, in the track's coordinates
    ref_x: f64,

    /// Y of the terrain origin, in the track's coordinates
    ref_y: f64,

    /// Track to write
    output_geojson: PathBuf,

    /// Add a vertex at every terrain edge the track crosses
    #[arg(long)]
    densify: bool,

    /// Write coordinates in the track's frame instead of the local one
    #[arg(long)]
    absolute: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let track = read_track(&args.input_geojson)
        .with_context(|| format!("reading track {}", args.input_geojson.display()))?;
    let terrain = read_obj(&args.obj_file)
        .with_context(|| format!("reading terrain {}", args.obj_file.display()))?;

    let mut path = track.path.clone();
    path.translate_planar(-args.ref_x, -args.ref_y);

    let snapper = PathSnapper::new(&terrain, SnapOptions::default().with_densify(args.densify))
        .context("indexing terrain")?;
    let mut snapped = snapper.snap(&path);
    if !snapped.is_complete() {
        warn!(
            "{} track points lie outside the terrain and keep their elevation",
            snapped.diagnostics.len()
        );
    }

    if args.absolute {
        snapped.path.translate_planar(args.ref_x, args.ref_y);
    }

    let geojson = track.to_geojson_string(&snapped.path.points);
    write_atomic(&args.output_geojson, geojson.as_bytes())
}
