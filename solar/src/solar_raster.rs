//! Models solar insolation over a DEM, with vegetation stacked on top of the terrain except over
//! the stream itself.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use abstutil::Timer;
use riverscapes::{
    DatasetKind, MetadataSink, OutputDir, ProjectDir, ProjectXml, RunMetadata, PROJECT_FILE,
};

use crate::engine::{CellValue, EngineEnv, GeoEngine, RasterRef, SolarRadiationParams, VectorRef};
use crate::{dataset_file_name, SolarConfig};

pub const TOOL_NAME: &str = "Calculate Solar Insolation for a Stream Network";
pub const TOOL_VERSION: &str = "0.1";
/// Later tools find this realization's raster by this id
pub const OUTPUT_ID: &str = "SOL_RAS";

pub struct SolarRasterInputs {
    pub dem: RasterRef,
    /// Vegetation height
    pub canopy: RasterRef,
    pub stream: VectorRef,
    /// The open water area of the stream
    pub stream_area: VectorRef,
    pub workspace: PathBuf,
    pub output: RasterRef,
}

/// Also record the run in a Riverscapes project. The project is created first if `dir` doesn't
/// have one yet.
pub struct ProjectExport {
    pub dir: PathBuf,
    pub project_name: String,
    pub watershed: String,
    pub realization_name: String,
}

/// Returns the path of the run metadata file written next to the output.
pub fn run<E: GeoEngine>(
    engine: &mut E,
    inputs: &SolarRasterInputs,
    config: &SolarConfig,
    export: Option<&ProjectExport>,
) -> Result<PathBuf> {
    config.validate()?;
    let now = Local::now();
    let mut timer = Timer::new("solar raster");

    let out_dir = inputs
        .output
        .path()
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let meta_path = out_dir.join(riverscapes::run_metadata_file_name(
        "polystat",
        &now.naive_local(),
    ));
    let mut meta = RunMetadata::new(TOOL_NAME, TOOL_VERSION);
    for (name, value) in [
        ("DEM raster", inputs.dem.to_string()),
        ("Canopy height raster", inputs.canopy.to_string()),
        ("Stream network feature class", inputs.stream.to_string()),
        (
            "Stream area polygon feature class",
            inputs.stream_area.to_string(),
        ),
        ("Scratch workspace", inputs.workspace.display().to_string()),
        ("Time configuration", config.time_config.to_string()),
        ("Day interval", config.day_interval.to_string()),
        ("Hour interval", config.hour_interval.to_string()),
    ] {
        meta.add_parameter(name, &value)?;
    }
    meta.add_output(riverscapes::Dataset::new(
        DatasetKind::Raster,
        "Output solar raster dataset",
        inputs.output.to_string(),
    ))?;
    meta.add_output(riverscapes::Dataset::new(
        DatasetKind::DataTable,
        "Metadata XML file",
        meta_path.display().to_string(),
    ))?;

    fs_err::create_dir_all(&inputs.workspace)?;
    let env = EngineEnv::aligned_to(engine, &inputs.dem, &inputs.workspace)?;
    let latitude = engine.centroid_latitude(&inputs.stream)?;
    timer.note(format!(
        "Cell size {}, stream latitude {:.4}",
        env.cell_size, latitude
    ));

    timer.start("rasterize the stream");
    let line_ras =
        engine.rasterize_lines(&env, &inputs.stream, env.scratch_raster("strm_ras"))?;
    let poly_ras =
        engine.rasterize_polygons(&env, &inputs.stream_area, env.scratch_raster("poly_ras"))?;
    let burned = vec![(CellValue::Value(1.0), 1.0), (CellValue::NoData, 0.0)];
    let line_ras =
        engine.reclassify(&env, &line_ras, &burned, env.scratch_raster("rcls_strm_line"))?;
    let poly_ras =
        engine.reclassify(&env, &poly_ras, &burned, env.scratch_raster("rcls_strm_poly"))?;
    let both = engine.plus(&env, &line_ras, &poly_ras, env.scratch_raster("plus_rcls"))?;
    let mask = engine.reclassify(
        &env,
        &both,
        &vec![
            (CellValue::Value(0.0), 0.0),
            (CellValue::Value(1.0), 1.0),
            (CellValue::Value(2.0), 1.0),
        ],
        env.scratch_raster("strm_mask"),
    )?;
    timer.stop("rasterize the stream");

    timer.start("stack vegetation on the terrain");
    let no_stream_canopy = engine.con(
        &env,
        &mask,
        1.0,
        0.0,
        &inputs.canopy,
        env.scratch_raster("remove_strm"),
    )?;
    let scaled = engine.divide(
        &env,
        &no_stream_canopy,
        config.canopy_divisor,
        env.scratch_raster("veg_div"),
    )?;
    let elevation = engine.plus(&env, &scaled, &inputs.dem, env.scratch_raster("elev_vegtopo"))?;
    timer.stop("stack vegetation on the terrain");

    timer.start("solar radiation");
    let params = SolarRadiationParams {
        latitude,
        sky_size: config.sky_size,
        time_config: config.time_config.clone(),
        day_interval: config.day_interval,
        hour_interval: config.hour_interval,
    };
    let result = engine.solar_radiation(&env, &elevation, &params, inputs.output.clone())?;
    timer.stop("solar radiation");
    info!("Solar insolation saved to {}", result);

    if let Some(export) = export {
        timer.start("export to the Riverscapes project");
        export_to_project(inputs, config, export, &now)?;
        timer.stop("export to the Riverscapes project");
    }

    meta.finalize("Success");
    meta.write(&meta_path)?;
    Ok(meta_path)
}

fn export_to_project(
    inputs: &SolarRasterInputs,
    config: &SolarConfig,
    export: &ProjectExport,
    now: &chrono::DateTime<Local>,
) -> Result<()> {
    let project_path = export.dir.join(PROJECT_FILE);
    if !project_path.exists() {
        riverscapes::create_project(
            &export.dir,
            &config.region,
            &export.watershed,
            &export.project_name,
        )?;
    }
    let mut project = ProjectXml::load(&project_path)?;
    let real_id = riverscapes::realization_id(&now.naive_local());
    riverscapes::write_realization_dirs(&export.dir, &real_id)?;
    let real_dir = ProjectDir::Realization {
        id: real_id.clone(),
        output: OutputDir::SolarRaster,
    };

    let dem = copy_into(&export.dir, &ProjectDir::Inputs, inputs.dem.path())?;
    let canopy = copy_into(&export.dir, &real_dir, inputs.canopy.path())?;
    let stream = copy_into(&export.dir, &real_dir, inputs.stream.path())?;
    let stream_area = copy_into(&export.dir, &real_dir, inputs.stream_area.path())?;
    let solar = copy_into(&export.dir, &real_dir, inputs.output.path())?;

    let stop = riverscapes::timestamp(&Local::now());
    if !project.inputs.iter().any(|i| i.id.as_deref() == Some("DEM")) {
        project.add_project_input(
            riverscapes::Dataset::new(DatasetKind::Raster, "Bare earth DEM raster dataset", dem)
                .with_id("DEM"),
        );
    }
    project.add_realization(&export.realization_name, &real_id, &stop);
    project.add_meta("solar_raster Start Time", &riverscapes::timestamp(now))?;
    project.add_meta("solar_raster Stop Time", &stop)?;
    project.add_parameter("Time configuration", &config.time_config.to_string())?;
    project.add_parameter("Day interval", &config.day_interval.to_string())?;
    project.add_parameter("Hour interval", &config.hour_interval.to_string())?;
    project.add_input_ref(DatasetKind::Raster, "DEM")?;
    project.add_input(riverscapes::Dataset::new(
        DatasetKind::Raster,
        "Vegetation height raster dataset",
        canopy,
    ))?;
    project.add_input(riverscapes::Dataset::new(
        DatasetKind::Vector,
        "Stream network polyline feature class",
        stream,
    ))?;
    project.add_input(riverscapes::Dataset::new(
        DatasetKind::Vector,
        "Stream area polygon feature class",
        stream_area,
    ))?;
    project.add_output(
        riverscapes::Dataset::new(DatasetKind::Raster, "Solar insolation raster dataset", solar)
            .with_id(OUTPUT_ID),
    )?;
    project.write(&project_path)
}

/// Copies a dataset into one of the project's directories, returning its path relative to the
/// project root.
pub(crate) fn copy_into(root: &Path, dir: &ProjectDir, from: &Path) -> Result<String> {
    let name = dataset_file_name(from)?;
    let relative = riverscapes::relative_project_dir(dir).join(&name);
    riverscapes::copy_dataset(from, &root.join(&relative))
        .with_context(|| format!("adding {} to the project", from.display()))?;
    Ok(relative.display().to_string())
}
