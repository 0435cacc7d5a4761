use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use geom::Distance;

use crate::PartitionError;

/// Tunable distances for `divide_polygon`, all in the units of the input coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Maximum spacing between centerline vertices after densifying
    pub point_density: f64,
    /// Vertices this close to a confluence don't generate Thiessen cells
    pub junction_buffer: f64,
    /// How close a split point must be to a junction cell boundary to cut it
    pub split_tolerance: f64,
    /// How close a ring vertex must be to a confluence to count as the same point
    pub vertex_match_tolerance: f64,
    /// Nodes of the planar arrangement closer than this are merged
    pub snap_tolerance: f64,
    /// Write every intermediate stage as GeoJSON into the scratch workspace
    pub keep_scratch: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            point_density: 10.0,
            junction_buffer: 120.0,
            split_tolerance: 0.1,
            vertex_match_tolerance: 1e-6,
            snap_tolerance: 1e-6,
            keep_scratch: false,
        }
    }
}

impl PartitionConfig {
    /// Reads TOML, filling in defaults for anything missing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PartitionConfig> {
        let path = path.as_ref();
        let raw = fs_err::read_to_string(path)?;
        let config: PartitionConfig =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .map_err(|err| anyhow!("{}: {}", path.display(), err))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PartitionError> {
        for (name, value) in [
            ("point_density", self.point_density),
            ("junction_buffer", self.junction_buffer),
            ("split_tolerance", self.split_tolerance),
            ("vertex_match_tolerance", self.vertex_match_tolerance),
            ("snap_tolerance", self.snap_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PartitionError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    pub(crate) fn point_density(&self) -> Distance {
        Distance::meters(self.point_density)
    }

    pub(crate) fn junction_buffer(&self) -> Distance {
        Distance::meters(self.junction_buffer)
    }

    pub(crate) fn split_tolerance(&self) -> Distance {
        Distance::meters(self.split_tolerance)
    }

    pub(crate) fn vertex_match_tolerance(&self) -> Distance {
        Distance::meters(self.vertex_match_tolerance)
    }

    pub(crate) fn snap_tolerance(&self) -> Distance {
        Distance::meters(self.snap_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: PartitionConfig = toml::from_str("junction_buffer = 50.0").unwrap();
        assert_eq!(config.junction_buffer, 50.0);
        assert_eq!(config.point_density, 10.0);
        assert_eq!(config.split_tolerance, 0.1);
        assert!(!config.keep_scratch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let config = PartitionConfig {
            point_density: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PartitionError::InvalidParameter {
                name: "point_density",
                ..
            })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition.toml");
        fs_err::write(&path, "snap_tolerance = -1.0\n").unwrap();
        assert!(PartitionConfig::load(&path).is_err());
        fs_err::write(&path, "point_density = 5.0\nkeep_scratch = true\n").unwrap();
        let loaded = PartitionConfig::load(&path).unwrap();
        assert_eq!(loaded.point_density, 5.0);
        assert!(loaded.keep_scratch);
    }
}
