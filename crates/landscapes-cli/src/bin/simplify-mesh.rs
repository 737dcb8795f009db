// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turn a GeoTIFF elevation raster into a simplified, textured terrain OBJ

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use landscapes_cli::{init_logging, write_atomic};
use landscapes_geometry::{parse_max_deviation, SimplifyOptions, TerrainSimplifier};
use landscapes_io::{read_geotiff, to_obj_string, ObjWriteOptions};
use log::info;

#[derive(Parser, Debug)]
#[command(name = "simplify-mesh", version, about)]
struct Args {
    /// Elevation raster (GeoTIFF, first band)
    input_tif: PathBuf,

    /// Terrain mesh to write
    output_obj: PathBuf,

    /// Maximum vertical deviation in meters; unparsable values mean 0.5
    #[arg(allow_hyphen_values = true)]
    max_deviation: String,

    /// Stop refining once the mesh reaches this many vertices
    #[arg(long)]
    max_vertices: Option<usize>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let field = read_geotiff(&args.input_tif)
        .with_context(|| format!("reading raster {}", args.input_tif.display()))?;
    info!(
        "image size {}x{}, resolution {:?}, origin {:?}, bounding box {:?}",
        field.width(),
        field.height(),
        field.resolution(),
        field.origin(),
        field.bbox().to_array()
    );
    info!("full grid triangle count: {}", field.full_triangle_count());

    let mut options =
        SimplifyOptions::default().with_max_deviation(parse_max_deviation(&args.max_deviation));
    if let Some(max_vertices) = args.max_vertices {
        options = options.with_max_vertices(max_vertices);
    }
    info!("simplifying with max deviation {}", options.max_deviation);

    let start = Instant::now();
    let terrain = TerrainSimplifier::new(options)
        .simplify(&field)
        .context("simplifying terrain")?;
    info!(
        "triangle count: {}, {:.1}% fewer than the full grid (max error {:.3}, rmsd {:.3}, {} steps) in {:.2?}",
        terrain.mesh.triangle_count(),
        terrain.reduction_percent(),
        terrain.max_error,
        terrain.rmsd,
        terrain.steps,
        start.elapsed()
    );

    let mut mesh = terrain.mesh;
    mesh.scale_planar(field.cell_size());

    let obj = to_obj_string(&mesh, &ObjWriteOptions::terrain())?;
    write_atomic(&args.output_obj, obj.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use landscapes_geometry::DEFAULT_MAX_DEVIATION;

    #[test]
    fn test_max_deviation_is_required() {
        let err = Args::try_parse_from(["simplify-mesh", "dem.tif", "terrain.obj"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_max_deviation_falls_back_when_unparsable() {
        let args =
            Args::try_parse_from(["simplify-mesh", "dem.tif", "terrain.obj", "0.25"]).unwrap();
        assert_eq!(parse_max_deviation(&args.max_deviation), 0.25);
        assert_eq!(args.max_vertices, None);

        let args = Args::try_parse_from([
            "simplify-mesh",
            "dem.tif",
            "terrain.obj",
            "fine",
            "--max-vertices",
            "1000",
        ])
        .unwrap();
        assert_eq!(parse_max_deviation(&args.max_deviation), DEFAULT_MAX_DEVIATION);
        assert_eq!(args.max_vertices, Some(1000));
    }
}
