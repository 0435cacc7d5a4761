use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use geom::Bounds;
use partition::{ReachId, SegmentPolygon};
use riverscapes::{ProjectXml, RealizationInput, PROJECT_FILE};
use solar::solar_raster::{self, SolarRasterInputs};
use solar::solar_vector::{self, ReachSolar, SolarVectorInputs};
use solar::{
    CellValue, EngineEnv, GeoEngine, RasterRef, Remap, SolarConfig, SolarRadiationParams,
    VectorRef,
};

#[derive(Debug, PartialEq)]
struct Call {
    op: &'static str,
    env: EngineEnv,
    inputs: Vec<PathBuf>,
    out: Option<PathBuf>,
}

/// Remembers every call, and writes a placeholder file for every output
#[derive(Default)]
struct RecordingEngine {
    calls: Vec<Call>,
    remaps: Vec<Remap>,
    solar: Vec<SolarRadiationParams>,
    zones: Vec<ReachId>,
}

impl RecordingEngine {
    fn record(
        &mut self,
        op: &'static str,
        env: &EngineEnv,
        inputs: Vec<&Path>,
        out: RasterRef,
    ) -> Result<RasterRef> {
        if let Some(parent) = out.path().parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(out.path(), op)?;
        self.calls.push(Call {
            op,
            env: env.clone(),
            inputs: inputs.into_iter().map(|p| p.to_path_buf()).collect(),
            out: Some(out.path().to_path_buf()),
        });
        Ok(out)
    }

    fn ops(&self) -> Vec<&'static str> {
        self.calls.iter().map(|c| c.op).collect()
    }
}

impl GeoEngine for RecordingEngine {
    fn cell_size(&self, _: &RasterRef) -> Result<f64> {
        Ok(2.0)
    }

    fn extent(&self, _: &RasterRef) -> Result<Bounds> {
        Ok(Bounds {
            min_x: 0.0,
            min_y: -50.0,
            max_x: 100.0,
            max_y: 50.0,
        })
    }

    fn centroid_latitude(&self, _: &VectorRef) -> Result<f64> {
        Ok(44.5)
    }

    fn rasterize_lines(
        &mut self,
        env: &EngineEnv,
        lines: &VectorRef,
        out: RasterRef,
    ) -> Result<RasterRef> {
        self.record("rasterize_lines", env, vec![lines.path()], out)
    }

    fn rasterize_polygons(
        &mut self,
        env: &EngineEnv,
        polygons: &VectorRef,
        out: RasterRef,
    ) -> Result<RasterRef> {
        self.record("rasterize_polygons", env, vec![polygons.path()], out)
    }

    fn reclassify(
        &mut self,
        env: &EngineEnv,
        input: &RasterRef,
        remap: &Remap,
        out: RasterRef,
    ) -> Result<RasterRef> {
        self.remaps.push(remap.clone());
        self.record("reclassify", env, vec![input.path()], out)
    }

    fn plus(
        &mut self,
        env: &EngineEnv,
        a: &RasterRef,
        b: &RasterRef,
        out: RasterRef,
    ) -> Result<RasterRef> {
        self.record("plus", env, vec![a.path(), b.path()], out)
    }

    fn con(
        &mut self,
        env: &EngineEnv,
        condition: &RasterRef,
        equals: f64,
        when_true: f64,
        otherwise: &RasterRef,
        out: RasterRef,
    ) -> Result<RasterRef> {
        assert_eq!((equals, when_true), (1.0, 0.0));
        self.record("con", env, vec![condition.path(), otherwise.path()], out)
    }

    fn divide(
        &mut self,
        env: &EngineEnv,
        input: &RasterRef,
        divisor: f64,
        out: RasterRef,
    ) -> Result<RasterRef> {
        assert_eq!(divisor, 10.0);
        self.record("divide", env, vec![input.path()], out)
    }

    fn solar_radiation(
        &mut self,
        env: &EngineEnv,
        elevation: &RasterRef,
        params: &SolarRadiationParams,
        out: RasterRef,
    ) -> Result<RasterRef> {
        self.solar.push(params.clone());
        self.record("solar_radiation", env, vec![elevation.path()], out)
    }

    fn zonal_mean(
        &mut self,
        env: &EngineEnv,
        zones: &[SegmentPolygon],
        values: &RasterRef,
    ) -> Result<BTreeMap<ReachId, f64>> {
        self.calls.push(Call {
            op: "zonal_mean",
            env: env.clone(),
            inputs: vec![values.path().to_path_buf()],
            out: None,
        });
        self.zones.extend(zones.iter().map(|z| z.reach));
        // Pretend reach 2 only covers NoData
        Ok(zones
            .iter()
            .filter(|z| z.reach != ReachId(2))
            .map(|z| (z.reach, 100.0 * z.reach.0 as f64))
            .collect())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Fixture {
        abstutil::logger::setup_for_tests();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let data = root.join("data");
        fs_err::create_dir_all(&data).unwrap();
        fs_err::write(data.join("dem.tif"), "elevation").unwrap();
        fs_err::write(data.join("canopy.tif"), "vegetation").unwrap();
        fs_err::write(
            data.join("streams.geojson"),
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"LineOID": 1, "name": "upper"},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [50, 0]]}},
                {"type": "Feature", "properties": {"LineOID": 2, "name": "lower"},
                 "geometry": {"type": "LineString", "coordinates": [[50, 0], [100, 0]]}}
            ]}"#,
        )
        .unwrap();
        fs_err::write(
            data.join("area.geojson"),
            r#"{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[0, -10], [100, -10], [100, 10], [0, 10], [0, -10]]]}}"#,
        )
        .unwrap();
        Fixture { _dir: dir, root }
    }

    fn data(&self, name: &str) -> PathBuf {
        self.root.join("data").join(name)
    }

    fn raster_inputs(&self) -> SolarRasterInputs {
        SolarRasterInputs {
            dem: RasterRef(self.data("dem.tif")),
            canopy: RasterRef(self.data("canopy.tif")),
            stream: VectorRef(self.data("streams.geojson")),
            stream_area: VectorRef(self.data("area.geojson")),
            workspace: self.root.join("scratch"),
            output: RasterRef(self.root.join("out").join("solar.tif")),
        }
    }

    fn vector_inputs(&self) -> SolarVectorInputs {
        SolarVectorInputs {
            solar_raster: RasterRef(self.root.join("out").join("solar.tif")),
            stream: self.data("streams.geojson"),
            reach_id_property: "LineOID".to_string(),
            stream_area: self.data("area.geojson"),
            workspace: self.root.join("scratch"),
            output: self.root.join("out").join("streams_solar.geojson"),
        }
    }

    fn project_dir(&self) -> PathBuf {
        self.root.join("project")
    }
}

fn config() -> SolarConfig {
    let mut config = SolarConfig::default();
    config.partition.junction_buffer = 20.0;
    config
}

#[test]
fn solar_raster_runs_every_step_in_order() {
    let fixture = Fixture::new();
    let inputs = fixture.raster_inputs();
    let mut engine = RecordingEngine::default();
    let meta = solar_raster::run(&mut engine, &inputs, &config(), None).unwrap();
    assert!(meta.exists());
    assert!(meta
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("meta_polystat_"));

    assert_eq!(
        engine.ops(),
        vec![
            "rasterize_lines",
            "rasterize_polygons",
            "reclassify",
            "reclassify",
            "plus",
            "reclassify",
            "con",
            "divide",
            "plus",
            "solar_radiation",
        ]
    );

    // Every call gets the same explicit environment, aligned to the DEM
    let expected_env = EngineEnv {
        workspace: inputs.workspace.clone(),
        extent: Bounds {
            min_x: 0.0,
            min_y: -50.0,
            max_x: 100.0,
            max_y: 50.0,
        },
        cell_size: 2.0,
        snap_raster: inputs.dem.clone(),
        mask: Some(inputs.dem.clone()),
    };
    assert!(engine.calls.iter().all(|c| c.env == expected_env));

    assert_eq!(
        engine.remaps[0],
        vec![(CellValue::Value(1.0), 1.0), (CellValue::NoData, 0.0)]
    );
    assert_eq!(
        engine.remaps[2],
        vec![
            (CellValue::Value(0.0), 0.0),
            (CellValue::Value(1.0), 1.0),
            (CellValue::Value(2.0), 1.0),
        ]
    );

    // The stream mask removes canopy, and the scaled canopy lands on the DEM
    let con = &engine.calls[6];
    assert_eq!(con.inputs[0], engine.calls[5].out.clone().unwrap());
    assert_eq!(con.inputs[1], inputs.canopy.path().to_path_buf());
    let elevation = &engine.calls[8];
    assert_eq!(elevation.inputs[0], engine.calls[7].out.clone().unwrap());
    assert_eq!(elevation.inputs[1], inputs.dem.path().to_path_buf());

    let solar = &engine.solar[0];
    assert_eq!(solar.latitude, 44.5);
    assert_eq!(solar.sky_size, 400);
    assert_eq!(solar.day_interval, 14);
    assert_eq!(
        engine.calls[9].out.clone().unwrap(),
        inputs.output.path().to_path_buf()
    );
}

#[test]
fn both_tools_share_one_project() {
    let fixture = Fixture::new();
    let config = config();
    let project_dir = fixture.project_dir();

    let mut engine = RecordingEngine::default();
    solar_raster::run(
        &mut engine,
        &fixture.raster_inputs(),
        &config,
        Some(&solar_raster::ProjectExport {
            dir: project_dir.clone(),
            project_name: "Lemhi solar".to_string(),
            watershed: "Lemhi".to_string(),
            realization_name: "summer".to_string(),
        }),
    )
    .unwrap();

    let project = ProjectXml::load(&project_dir.join(PROJECT_FILE)).unwrap();
    assert_eq!(project.meta[0], ("HUCID".to_string(), "17060204".to_string()));
    assert_eq!(project.inputs[0].id.as_deref(), Some("DEM"));
    assert!(project_dir.join(&project.inputs[0].path).exists());
    let real = &project.realizations[0];
    assert_eq!(real.name, "summer");
    assert!(real.id.starts_with("real"));
    assert_eq!(real.outputs[0].id.as_deref(), Some("SOL_RAS"));
    assert!(project_dir.join(&real.outputs[0].path).exists());
    assert!(real
        .params
        .contains(&("Day interval".to_string(), "14".to_string())));

    // An unknown realization fails before any work happens
    let mut engine = RecordingEngine::default();
    assert!(solar_vector::run(
        &mut engine,
        &fixture.vector_inputs(),
        &config,
        Some(&solar_vector::ProjectExport {
            dir: project_dir.clone(),
            realization_name: "winter".to_string(),
        }),
    )
    .is_err());
    assert!(engine.calls.is_empty());

    let inputs = fixture.vector_inputs();
    let results = solar_vector::run(
        &mut engine,
        &inputs,
        &config,
        Some(&solar_vector::ProjectExport {
            dir: project_dir.clone(),
            realization_name: "summer".to_string(),
        }),
    )
    .unwrap();
    assert_eq!(
        results,
        vec![
            ReachSolar {
                reach: ReachId(1),
                area_solar: Some(100.0),
            },
            ReachSolar {
                reach: ReachId(2),
                area_solar: None,
            },
        ]
    );
    assert_eq!(engine.ops(), vec!["zonal_mean"]);
    assert_eq!(engine.calls[0].env.snap_raster, inputs.solar_raster);
    // Both reaches got a piece of the stream area
    assert_eq!(engine.zones, vec![ReachId(1), ReachId(2)]);

    let features = geom::io::read_features(&inputs.output).unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].property("area_solar").unwrap(), 100.0);
    assert_eq!(features[0].property("name").unwrap().as_str(), Some("upper"));
    assert!(features[1].property("area_solar").unwrap().is_null());

    let project = ProjectXml::load(&project_dir.join(PROJECT_FILE)).unwrap();
    let real = &project.realizations[0];
    assert_eq!(real.outputs.len(), 2);
    assert_eq!(real.outputs[1].id.as_deref(), Some("PRED_SOLAR"));
    assert!(project_dir.join(&real.outputs[1].path).exists());
    assert!(real.inputs.contains(&RealizationInput::Ref {
        kind: riverscapes::DatasetKind::Raster,
        id: "SOL_RAS".to_string(),
    }));
}
