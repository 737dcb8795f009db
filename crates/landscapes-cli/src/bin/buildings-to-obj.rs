// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrude GeoJSON building footprints onto a terrain OBJ

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use landscapes_cli::{init_logging, write_atomic};
use landscapes_geometry::{
    BuildingExtruder, BvhOptions, ExtrudeOptions, LocalFrame, SpatialIndex, Utm,
    DEFAULT_BUILDING_HEIGHT, DEFAULT_STOREY_HEIGHT, DEFAULT_UTM_ZONE,
};
use landscapes_io::{read_footprint_dir, read_obj, to_obj_string, ObjWriteOptions};
use log::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "buildings-to-obj", version, about, allow_negative_numbers = true)]
struct Args {
    /// Easting of the terrain origin, in projected meters
    ref_x: f64,

    /// Northing of the terrain origin, in projected meters
    ref_y: f64,

    /// Terrain mesh in the local frame
    terrain_obj: PathBuf,

    /// Directory of GeoJSON footprint tiles (*.json)
    input_dir: PathBuf,

    /// Building mesh to write
    output_obj: PathBuf,

    /// Triangles per BVH leaf
    #[arg(long, default_value_t = 5)]
    leaf_size: usize,

    /// UTM zone of the projected frame (northern hemisphere)
    #[arg(long, default_value_t = DEFAULT_UTM_ZONE)]
    zone: u8,

    /// Meters per storey for buildings that only report levels
    #[arg(long, default_value_t = DEFAULT_STOREY_HEIGHT)]
    storey_height: f64,

    /// Height of buildings without height or levels
    #[arg(long, default_value_t = DEFAULT_BUILDING_HEIGHT)]
    default_height: f64,

    /// Extrude on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let projection = LocalFrame::new(
        Utm::new(args.zone, true).context("invalid --zone")?,
        [args.ref_x, args.ref_y],
    );

    let terrain = read_obj(&args.terrain_obj)
        .with_context(|| format!("reading terrain {}", args.terrain_obj.display()))?;
    let start = Instant::now();
    let bvh_options = BvhOptions::default().with_leaf_size(args.leaf_size);
    let ground = SpatialIndex::from_mesh(&terrain, bvh_options).context("indexing terrain")?;
    let stats = ground.stats();
    debug!(
        "terrain BVH: {} triangles, {} nodes, {} leaves, depth {}",
        stats.triangles, stats.nodes, stats.leaves, stats.depth
    );
    info!("indexed {} terrain triangles in {:.2?}", stats.triangles, start.elapsed());

    let options = ExtrudeOptions::default()
        .with_storey_height(args.storey_height)
        .with_default_height(args.default_height)
        .with_parallel(!args.sequential);
    let footprints = read_footprint_dir(&args.input_dir, &|a| options.resolve_height(a))
        .with_context(|| format!("reading footprints from {}", args.input_dir.display()))?;

    let start = Instant::now();
    let batch = BuildingExtruder::new(&ground, options)
        .with_projection(&projection)
        .extrude_all(&footprints.footprints);

    let skipped = footprints.skipped.len() + batch.diagnostics.len();
    if skipped > 0 {
        warn!("{} of {} features skipped", skipped, footprints.feature_count);
    }
    info!(
        "extruded {} buildings ({} triangles) in {:.2?}",
        batch.built,
        batch.mesh.triangle_count(),
        start.elapsed()
    );

    let obj = to_obj_string(&batch.mesh, &ObjWriteOptions::buildings())?;
    write_atomic(&args.output_obj, obj.as_bytes())
}
