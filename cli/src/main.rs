//! Command-line tools for dividing stream areas by reach and preparing solar insolation projects.
//! The raster-bound solar tools need a GIS engine, so they're only available as library calls.

#[macro_use]
extern crate log;

mod divide_polygon;

use std::path::Path;

use anyhow::Result;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "streamcli", about = "Stream segment and solar insolation tools")]
enum Command {
    /// Divides a stream area polygon into one piece per reach of its centerline, writing GeoJSON
    /// polygons tagged with the reach id.
    DividePolygon {
        /// GeoJSON lines, one or more per reach
        #[structopt(long)]
        centerline: String,
        /// GeoJSON file with the stream area polygon
        #[structopt(long)]
        polygon: String,
        /// The GeoJSON file to write
        #[structopt(long)]
        output: String,
        /// The property identifying each reach. Features are numbered in order if omitted.
        #[structopt(long)]
        reach_id_property: Option<String>,
        /// A TOML file with partitioning parameters. Flags below override it.
        #[structopt(long)]
        config: Option<String>,
        /// Maximum spacing between centerline vertices
        #[structopt(long)]
        point_density: Option<f64>,
        /// Centerline vertices this close to a confluence don't shape the pieces
        #[structopt(long)]
        junction_buffer: Option<f64>,
        /// Where intermediate geometry goes. Defaults to the system temp directory.
        #[structopt(long)]
        scratch_dir: Option<String>,
        /// Keep every intermediate stage in the scratch directory, for debugging
        #[structopt(long)]
        keep_scratch: bool,
    },
    /// Creates an empty Riverscapes project, with its directory layout and project file. Refuses
    /// to touch a directory that already has a project.
    CreateProject {
        #[structopt(long)]
        dir: String,
        #[structopt(long, default_value = "CRB")]
        region: String,
        /// One of the known watersheds, like "Lemhi"
        #[structopt(long)]
        watershed: String,
        #[structopt(long)]
        name: String,
    },
    /// Averages net solar insolation per monitoring site from SunEye skyview CSV exports.
    #[structopt(name = "compile-suneye")]
    CompileSunEye {
        /// A directory with one subdirectory per site
        #[structopt()]
        input: String,
        /// The CSV file to write
        #[structopt(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    match Command::from_args() {
        Command::DividePolygon {
            centerline,
            polygon,
            output,
            reach_id_property,
            config,
            point_density,
            junction_buffer,
            scratch_dir,
            keep_scratch,
        } => divide_polygon::run(divide_polygon::Options {
            centerline,
            polygon,
            output,
            reach_id_property,
            config,
            point_density,
            junction_buffer,
            scratch_dir,
            keep_scratch,
        })?,
        Command::CreateProject {
            dir,
            region,
            watershed,
            name,
        } => {
            let path = riverscapes::create_project(Path::new(&dir), &region, &watershed, &name)?;
            println!("Wrote {}", path.display());
        }
        Command::CompileSunEye { input, output } => compile_suneye(input, output)?,
    }
    Ok(())
}

fn compile_suneye(input: String, output: String) -> Result<()> {
    let sites = solar::suneye::compile_sites(Path::new(&input))?;
    if sites.is_empty() {
        warn!("No sites with skyview samples found in {}", input);
    }
    solar::suneye::write_csv(Path::new(&output), &sites)?;
    println!("Averaged {} sites into {}", sites.len(), output);
    Ok(())
}
