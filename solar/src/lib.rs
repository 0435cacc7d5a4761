//! Stream solar insolation tools. `solar_raster` models insolation over a DEM with vegetation on
//! top, `solar_vector` summarizes that per stream reach, and `suneye` compiles field measurements to
//! validate against. The raster work happens in a GIS engine behind `GeoEngine`.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::path::Path;

use anyhow::Result;

pub use crate::config::{SolarConfig, TimeConfig};
pub use crate::engine::{
    CellValue, EngineEnv, GeoEngine, RasterRef, Remap, SolarRadiationParams, VectorRef,
};

mod config;
pub mod engine;
pub mod solar_raster;
pub mod solar_vector;
pub mod suneye;

/// Datasets keep their file name when they're copied into a project.
fn dataset_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} doesn't name a file", path.display()))
}
