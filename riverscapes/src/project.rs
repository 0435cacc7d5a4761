use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::metadata::{MetadataSink, ProjectXml};

pub const INPUTS: &str = "Inputs";
pub const REALIZATIONS: &str = "Realizations";
/// Every project file lives here, relative to the project root
pub const PROJECT_FILE: &str = "project.rs.xml";
pub const PROJECT_TYPE: &str = "Solar";

/// Where each tool writes its results, under one realization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDir {
    SolarRaster,
    SolarVector,
}

impl OutputDir {
    pub const ALL: [OutputDir; 2] = [OutputDir::SolarRaster, OutputDir::SolarVector];

    pub fn name(self) -> &'static str {
        match self {
            OutputDir::SolarRaster => "SolarRaster",
            OutputDir::SolarVector => "SolarVector",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectDir {
    Inputs,
    Realization { id: String, output: OutputDir },
}

/// Relative to the project root, the way the project file refers to things
pub fn relative_project_dir(dir: &ProjectDir) -> PathBuf {
    match dir {
        ProjectDir::Inputs => PathBuf::from(INPUTS),
        ProjectDir::Realization { id, output } => {
            Path::new(REALIZATIONS).join(id).join(output.name())
        }
    }
}

pub fn project_dir(root: &Path, dir: &ProjectDir) -> PathBuf {
    root.join(relative_project_dir(dir))
}

/// Deletes anything already at `root`, then creates it fresh and empty.
pub fn write_root(root: &Path) -> Result<()> {
    if root.exists() {
        info!("Wiping existing project directory {}", root.display());
        fs_err::remove_dir_all(root)?;
    }
    fs_err::create_dir_all(root)?;
    Ok(())
}

/// Creates the inputs folder and the output folders of one realization.
pub fn write_realization_dirs(root: &Path, realization_id: &str) -> Result<()> {
    fs_err::create_dir_all(project_dir(root, &ProjectDir::Inputs))?;
    for output in OutputDir::ALL {
        fs_err::create_dir_all(project_dir(
            root,
            &ProjectDir::Realization {
                id: realization_id.to_string(),
                output,
            },
        ))?;
    }
    Ok(())
}

/// The hydrologic unit code of a watershed the tools know about.
pub fn huc_id(watershed: &str) -> Result<&'static str> {
    Ok(match watershed {
        "Asotin" => "17060103",
        "Big-Navarro-Garcia (CA)" => "18010108",
        "Entiat" => "17020010",
        "John Day" => "17070204",
        "Lemhi" => "17060204",
        "Lolo Creek" => "1706030602",
        "Methow" => "17020008",
        "Minam" => "1706010505",
        "Region 17" => "17",
        "South Fork Salmon" => "17060208",
        "Tucannon" => "17060107",
        "Umatilla" => "17070103",
        "Upper Grande Ronde" => "17060104",
        "Walla Walla" => "17070102",
        "Wenatchee" => "17020011",
        "Yankee Fork" => "1706020105",
        _ => bail!("Unknown watershed {}; no HUC id for it", watershed),
    })
}

/// Realizations are named by the minute they were created.
pub fn realization_id(timestamp: &NaiveDateTime) -> String {
    format!("real{}", timestamp.format("%Y%m%d%H%M"))
}

/// Starts a new project in `dir`, refusing to touch one that already exists. Returns the path to
/// the project file.
pub fn create_project(
    dir: &Path,
    region: &str,
    watershed: &str,
    project_name: &str,
) -> Result<PathBuf> {
    let path = dir.join(PROJECT_FILE);
    if path.exists() {
        bail!(
            "{} already exists; choose an empty directory for a new project",
            path.display()
        );
    }
    // Fail before wiping anything
    let huc = huc_id(watershed)?;

    write_root(dir)?;
    let mut project = ProjectXml::new(project_name, PROJECT_TYPE);
    project.add_project_meta("HUCID", huc);
    project.add_project_meta("Region", region);
    project.add_project_meta("Watershed", watershed);
    project
        .write(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Created project {} in {}", project_name, dir.display());
    Ok(path)
}
