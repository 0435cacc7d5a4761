use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Which element a dataset becomes in a project file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetKind {
    Raster,
    Vector,
    DataTable,
}

const SHAPEFILE_SIDECARS: [&str; 8] = [
    "shx", "dbf", "prj", "cpg", "sbn", "sbx", "qix", "shp.xml",
];

impl DatasetKind {
    /// Guesses from the file extension.
    pub fn detect(path: &Path) -> Result<DatasetKind> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("{} has no extension", path.display()))?;
        Ok(match ext.as_str() {
            "tif" | "tiff" | "img" | "asc" | "vrt" => DatasetKind::Raster,
            "geojson" | "json" | "shp" | "gpkg" => DatasetKind::Vector,
            "csv" | "dbf" | "txt" => DatasetKind::DataTable,
            _ => bail!("Don't know what kind of dataset {} is", path.display()),
        })
    }

    /// The element name in a project file
    pub fn tag(self) -> &'static str {
        match self {
            DatasetKind::Raster => "Raster",
            DatasetKind::Vector => "Vector",
            DatasetKind::DataTable => "DataTable",
        }
    }

    pub fn from_tag(tag: &str) -> Option<DatasetKind> {
        match tag {
            "Raster" => Some(DatasetKind::Raster),
            "Vector" => Some(DatasetKind::Vector),
            "DataTable" => Some(DatasetKind::DataTable),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Copies a dataset into a project, creating the destination directory. GeoJSON is parsed and
/// written back out, so a broken input fails here instead of later. A shapefile brings along
/// whichever sidecar files exist next to it.
pub fn copy_dataset(from: &Path, to: &Path) -> Result<DatasetKind> {
    let kind = DatasetKind::detect(from)?;
    if let Some(parent) = to.parent() {
        fs_err::create_dir_all(parent)?;
    }

    if is_geojson(from) {
        let features = geom::io::read_features(from)?;
        geom::io::write_features(to, features)?;
    } else {
        fs_err::copy(from, to).with_context(|| format!("copying {}", from.display()))?;
        if has_extension(from, "shp") {
            for ext in SHAPEFILE_SIDECARS {
                let sidecar = sibling(from, ext);
                if sidecar.exists() {
                    fs_err::copy(&sidecar, sibling(to, ext))?;
                }
            }
        }
    }
    debug!("Copied {} {} to {}", kind, from.display(), to.display());
    Ok(kind)
}

fn is_geojson(path: &Path) -> bool {
    has_extension(path, "geojson") || has_extension(path, "json")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|x| x.to_str())
        .map(|x| x.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

// streams.shp -> streams.dbf
fn sibling(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext)
}
