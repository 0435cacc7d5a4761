//! Summarizes a solar insolation raster per stream reach: the stream area is divided into one
//! piece per reach, and each reach gets the mean insolation over its pieces.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use geojson::Feature;

use abstutil::{prettyprint_usize, Timer};
use partition::{divide_polygon, Centerline, ReachId, ScratchWorkspace};
use riverscapes::{
    Dataset, DatasetKind, MetadataSink, OutputDir, ProjectDir, ProjectXml, RunMetadata,
    PROJECT_FILE,
};

use crate::engine::{EngineEnv, GeoEngine, RasterRef};
use crate::solar_raster::{copy_into, OUTPUT_ID as RASTER_OUTPUT_ID};
use crate::SolarConfig;

pub const TOOL_NAME: &str = "Predict Solar Insolation for a Stream Network";
pub const TOOL_VERSION: &str = "0.4";
pub const OUTPUT_ID: &str = "PRED_SOLAR";
/// The property holding each reach's mean insolation in the output
pub const SOLAR_PROPERTY: &str = "area_solar";

pub struct SolarVectorInputs {
    /// Output of the solar raster tool
    pub solar_raster: RasterRef,
    /// GeoJSON lines, already segmented into reaches
    pub stream: PathBuf,
    /// The property identifying each reach
    pub reach_id_property: String,
    /// GeoJSON polygon of the open water area
    pub stream_area: PathBuf,
    pub workspace: PathBuf,
    /// Where the stream lines are written back out, with `area_solar` attached
    pub output: PathBuf,
}

/// Add this run to an existing realization of a Riverscapes project.
pub struct ProjectExport {
    pub dir: PathBuf,
    pub realization_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReachSolar {
    pub reach: ReachId,
    /// None when the reach doesn't reach the stream area, or only covers cells without data
    pub area_solar: Option<f64>,
}

pub fn run<E: GeoEngine>(
    engine: &mut E,
    inputs: &SolarVectorInputs,
    config: &SolarConfig,
    export: Option<&ProjectExport>,
) -> Result<Vec<ReachSolar>> {
    config.validate()?;
    let now = Local::now();
    let mut timer = Timer::new("solar vector");

    let out_dir = inputs
        .output
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let meta_path = out_dir.join(riverscapes::run_metadata_file_name(
        "solarVector",
        &now.naive_local(),
    ));
    let mut meta = RunMetadata::new(TOOL_NAME, TOOL_VERSION);
    for (name, value) in [
        ("Solar insolation raster dataset", inputs.solar_raster.to_string()),
        (
            "Stream network feature class",
            inputs.stream.display().to_string(),
        ),
        ("Stream unique ID field", inputs.reach_id_property.clone()),
        (
            "Stream area polygon feature class",
            inputs.stream_area.display().to_string(),
        ),
    ] {
        meta.add_parameter(name, &value)?;
    }
    meta.add_output(Dataset::new(
        DatasetKind::Vector,
        "Output polyline feature class with solar values",
        inputs.output.display().to_string(),
    ))?;
    meta.add_output(Dataset::new(
        DatasetKind::DataTable,
        "Metadata XML file",
        meta_path.display().to_string(),
    ))?;

    // Check the project before doing any work
    let project = match export {
        Some(export) => {
            let mut project = ProjectXml::load(&export.dir.join(PROJECT_FILE))?;
            let real_id = project.select_realization(&export.realization_name)?;
            Some((project, real_id))
        }
        None => None,
    };

    timer.start("read the stream");
    let lines = geom::io::read_polylines(&inputs.stream, Some(&inputs.reach_id_property))?;
    let centerline = Centerline::from_polylines(lines)?;
    let polygon = geom::io::read_polygon(&inputs.stream_area)?;
    timer.stop("read the stream");

    timer.start("divide the stream area");
    fs_err::create_dir_all(&inputs.workspace)?;
    let segments = divide_polygon(
        &centerline,
        &polygon,
        &ScratchWorkspace::new(&inputs.workspace),
        &config.partition,
    )
    .context("dividing the stream area by reach")?;
    timer.stop("divide the stream area");
    timer.note(format!(
        "{} segment polygons",
        prettyprint_usize(segments.len())
    ));

    timer.start("zonal statistics");
    let env = EngineEnv::aligned_to(engine, &inputs.solar_raster, &inputs.workspace)?;
    let means = engine.zonal_mean(&env, &segments, &inputs.solar_raster)?;
    timer.stop("zonal statistics");

    let reaches: BTreeSet<ReachId> = centerline.reaches().iter().map(|r| r.id).collect();
    let results: Vec<ReachSolar> = reaches
        .into_iter()
        .map(|reach| ReachSolar {
            reach,
            area_solar: means.get(&reach).cloned(),
        })
        .collect();
    let missing = results.iter().filter(|r| r.area_solar.is_none()).count();
    if missing > 0 {
        timer.warn(format!(
            "{} reaches got no solar value",
            prettyprint_usize(missing)
        ));
    }

    write_output(inputs, &results)?;
    info!("Tool output saved to {}", inputs.output.display());
    meta.finalize("Success");
    meta.write(&meta_path)?;

    if let (Some(export), Some((mut project, real_id))) = (export, project) {
        timer.start("export to the Riverscapes project");
        export_to_project(&mut project, &real_id, export, inputs, &now)?;
        timer.stop("export to the Riverscapes project");
    }

    Ok(results)
}

/// Copies the stream features, setting `area_solar` on each from its reach. Features for unknown
/// reaches or without line geometry get null.
fn write_output(inputs: &SolarVectorInputs, results: &[ReachSolar]) -> Result<()> {
    let mut features: Vec<Feature> = geom::io::read_features(&inputs.stream)?;
    for feature in &mut features {
        let value = geom::io::feature_id(feature, &inputs.reach_id_property)
            .ok()
            .and_then(|id| {
                results
                    .binary_search_by_key(&ReachId(id), |r| r.reach)
                    .ok()
                    .and_then(|idx| results[idx].area_solar)
            });
        feature.set_property(
            SOLAR_PROPERTY,
            value.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null),
        );
    }
    if let Some(parent) = inputs.output.parent() {
        fs_err::create_dir_all(parent)?;
    }
    geom::io::write_features(&inputs.output, features)
}

fn export_to_project(
    project: &mut ProjectXml,
    real_id: &str,
    export: &ProjectExport,
    inputs: &SolarVectorInputs,
    start: &chrono::DateTime<Local>,
) -> Result<()> {
    let real_dir = ProjectDir::Realization {
        id: real_id.to_string(),
        output: OutputDir::SolarVector,
    };
    let root: &Path = &export.dir;
    riverscapes::write_realization_dirs(root, real_id)?;
    copy_into(root, &real_dir, inputs.stream.as_path())?;
    copy_into(root, &real_dir, inputs.stream_area.as_path())?;
    let output = copy_into(root, &real_dir, inputs.output.as_path())?;

    project.add_input_ref(DatasetKind::Raster, RASTER_OUTPUT_ID)?;
    project.add_meta("solar_vector Start Time", &riverscapes::timestamp(start))?;
    project.add_meta(
        "solar_vector Stop Time",
        &riverscapes::timestamp(&Local::now()),
    )?;
    project.add_output(
        Dataset::new(
            DatasetKind::Vector,
            "Output polyline feature with solar values",
            output,
        )
        .with_id(OUTPUT_ID),
    )?;
    project.write(&export.dir.join(PROJECT_FILE))
}
