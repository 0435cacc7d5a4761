//! The raster operations the solar tools need. Nothing here does raster math itself; a GIS engine
//! behind `GeoEngine` does, and every call names its output so intermediate rasters land in the
//! scratch workspace where they can be inspected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use geom::Bounds;
use partition::{ReachId, SegmentPolygon};

use crate::TimeConfig;

/// A raster dataset, by path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterRef(pub PathBuf);

/// A vector dataset, by path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorRef(pub PathBuf);

impl RasterRef {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl VectorRef {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RasterRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl fmt::Display for VectorRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// The environment every raster operation runs in. Passed explicitly to each call, instead of
/// living in global engine state.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineEnv {
    /// Where intermediate outputs are written
    pub workspace: PathBuf,
    pub extent: Bounds,
    pub cell_size: f64,
    /// Output cells align to this raster's grid
    pub snap_raster: RasterRef,
    /// Cells outside this raster's data are NoData
    pub mask: Option<RasterRef>,
}

impl EngineEnv {
    /// Aligns everything to one raster: its grid, its extent, and its data as a mask.
    pub fn aligned_to<E: GeoEngine + ?Sized>(
        engine: &E,
        raster: &RasterRef,
        workspace: &Path,
    ) -> Result<EngineEnv> {
        Ok(EngineEnv {
            workspace: workspace.to_path_buf(),
            extent: engine.extent(raster)?,
            cell_size: engine.cell_size(raster)?,
            snap_raster: raster.clone(),
            mask: Some(raster.clone()),
        })
    }

    /// Somewhere in the workspace for an intermediate raster
    pub fn scratch_raster(&self, name: &str) -> RasterRef {
        RasterRef(self.workspace.join(name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CellValue {
    Value(f64),
    NoData,
}

/// Maps old cell values to new ones. Cells matching no rule keep their value.
pub type Remap = Vec<(CellValue, f64)>;

#[derive(Clone, Debug, PartialEq)]
pub struct SolarRadiationParams {
    pub latitude: f64,
    pub sky_size: u32,
    pub time_config: TimeConfig,
    pub day_interval: u32,
    pub hour_interval: f64,
}

pub trait GeoEngine {
    fn cell_size(&self, raster: &RasterRef) -> Result<f64>;
    fn extent(&self, raster: &RasterRef) -> Result<Bounds>;
    /// Latitude in WGS84 of the middle of some features
    fn centroid_latitude(&self, features: &VectorRef) -> Result<f64>;

    /// Burns 1 into every cell a line crosses; everything else is NoData.
    fn rasterize_lines(
        &mut self,
        env: &EngineEnv,
        lines: &VectorRef,
        out: RasterRef,
    ) -> Result<RasterRef>;
    /// Burns 1 into every cell whose center is inside a polygon; everything else is NoData.
    fn rasterize_polygons(
        &mut self,
        env: &EngineEnv,
        polygons: &VectorRef,
        out: RasterRef,
    ) -> Result<RasterRef>;
    fn reclassify(
        &mut self,
        env: &EngineEnv,
        input: &RasterRef,
        remap: &Remap,
        out: RasterRef,
    ) -> Result<RasterRef>;
    fn plus(
        &mut self,
        env: &EngineEnv,
        a: &RasterRef,
        b: &RasterRef,
        out: RasterRef,
    ) -> Result<RasterRef>;
    /// Where `condition` equals `equals`, `when_true`; elsewhere the cell from `otherwise`.
    fn con(
        &mut self,
        env: &EngineEnv,
        condition: &RasterRef,
        equals: f64,
        when_true: f64,
        otherwise: &RasterRef,
        out: RasterRef,
    ) -> Result<RasterRef>;
    fn divide(
        &mut self,
        env: &EngineEnv,
        input: &RasterRef,
        divisor: f64,
        out: RasterRef,
    ) -> Result<RasterRef>;
    /// Area solar radiation over an elevation surface
    fn solar_radiation(
        &mut self,
        env: &EngineEnv,
        elevation: &RasterRef,
        params: &SolarRadiationParams,
        out: RasterRef,
    ) -> Result<RasterRef>;
    /// The mean of `values` over all cells under each reach's polygons. Reaches whose polygons
    /// cover no cells with data are absent.
    fn zonal_mean(
        &mut self,
        env: &EngineEnv,
        zones: &[SegmentPolygon],
        values: &RasterRef,
    ) -> Result<BTreeMap<ReachId, f64>>;
}
