use std::path::PathBuf;

use anyhow::Result;

use partition::{divide_polygon, Centerline, PartitionConfig, ScratchWorkspace};

pub struct Options {
    pub centerline: String,
    pub polygon: String,
    pub output: String,
    pub reach_id_property: Option<String>,
    pub config: Option<String>,
    pub point_density: Option<f64>,
    pub junction_buffer: Option<f64>,
    pub scratch_dir: Option<String>,
    pub keep_scratch: bool,
}

impl Options {
    /// The TOML file if there is one, then any flags on top
    fn partition_config(&self) -> Result<PartitionConfig> {
        let mut config = match self.config {
            Some(ref path) => PartitionConfig::load(path)?,
            None => PartitionConfig::default(),
        };
        if let Some(x) = self.point_density {
            config.point_density = x;
        }
        if let Some(x) = self.junction_buffer {
            config.junction_buffer = x;
        }
        if self.keep_scratch {
            config.keep_scratch = true;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run(opts: Options) -> Result<()> {
    let config = opts.partition_config()?;
    let lines = geom::io::read_polylines(&opts.centerline, opts.reach_id_property.as_deref())?;
    let centerline = Centerline::from_polylines(lines)?;
    let polygon = geom::io::read_polygon(&opts.polygon)?;
    let scratch_dir = opts
        .scratch_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("stream_partition"));

    let segments = divide_polygon(
        &centerline,
        &polygon,
        &ScratchWorkspace::new(scratch_dir),
        &config,
    )?;
    let id_property = opts.reach_id_property.as_deref().unwrap_or("reach");
    geom::io::write_features(
        &opts.output,
        segments
            .iter()
            .map(|s| s.to_geojson(id_property))
            .collect(),
    )?;
    println!("Wrote {} segment polygons to {}", segments.len(), opts.output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition.toml");
        fs_err::write(&path, "point_density = 4.0\njunction_buffer = 50.0\n").unwrap();

        let mut opts = Options {
            centerline: String::new(),
            polygon: String::new(),
            output: String::new(),
            reach_id_property: None,
            config: Some(path.display().to_string()),
            point_density: None,
            junction_buffer: Some(30.0),
            scratch_dir: None,
            keep_scratch: false,
        };
        let config = opts.partition_config().unwrap();
        assert_eq!(config.point_density, 4.0);
        assert_eq!(config.junction_buffer, 30.0);
        assert!(!config.keep_scratch);

        opts.point_density = Some(-1.0);
        assert!(opts.partition_config().is_err());
    }

    #[test]
    fn end_to_end() {
        abstutil::logger::setup_for_tests();
        let dir = tempfile::tempdir().unwrap();
        let centerline = dir.path().join("centerline.geojson");
        let polygon = dir.path().join("polygon.geojson");
        let output = dir.path().join("segments.geojson");
        fs_err::write(
            &centerline,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"ReachID": 4},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [100, 0]]}}
            ]}"#,
        )
        .unwrap();
        fs_err::write(
            &polygon,
            r#"{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon",
                             "coordinates": [[[0, -10], [100, -10], [100, 10], [0, 10], [0, -10]]]}}"#,
        )
        .unwrap();

        run(Options {
            centerline: centerline.display().to_string(),
            polygon: polygon.display().to_string(),
            output: output.display().to_string(),
            reach_id_property: Some("ReachID".to_string()),
            config: None,
            point_density: None,
            junction_buffer: None,
            scratch_dir: Some(dir.path().join("scratch").display().to_string()),
            keep_scratch: false,
        })
        .unwrap();

        let features = geom::io::read_features(&output).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].property("ReachID").unwrap(), 4);
        assert!(!dir.path().join("scratch").exists());
    }
}
