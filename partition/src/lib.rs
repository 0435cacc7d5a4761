//! Divides the polygon covering a stream into one piece per reach of its centerline.
//!
//! The rough idea is to grow Thiessen (Voronoi) cells around the densified centerline vertices,
//! so each piece of the polygon goes to the closest reach. Near confluences that breaks down, so
//! vertices there don't generate cells. Instead, the cells touching a confluence get their
//! boundaries rerouted through the confluence itself. All of the resulting lines are overlaid
//! into one planar arrangement, whose faces get attributed to reaches, dissolved, and cleaned up.
//!
//! There are no partial results: `divide_polygon` either covers the whole polygon or fails.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::fmt;

use geojson::Feature;
use serde::{Deserialize, Serialize};

use abstutil::{prettyprint_usize, Timer};
use geom::{Line, PolyLine, Polygon, EPSILON_DIST};

pub use crate::config::PartitionConfig;
pub use crate::error::PartitionError;
pub use crate::reorient::change_starting_vertex;
pub use crate::scratch::ScratchWorkspace;
pub use crate::thiessen::ThiessenCell;

mod arrangement;
mod config;
mod dissolve;
mod error;
mod junction;
pub mod reorient;
mod scratch;
pub mod thiessen;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReachId(pub usize);

impl fmt::Display for ReachId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reach of the centerline. Several may share an id, when a reach has multiple parts.
#[derive(Clone, Debug, PartialEq)]
pub struct Reach {
    pub id: ReachId,
    pub line: PolyLine,
}

/// The reaches of a stream, possibly branching.
#[derive(Clone, Debug, PartialEq)]
pub struct Centerline {
    reaches: Vec<Reach>,
}

impl Centerline {
    pub fn new(reaches: Vec<Reach>) -> Result<Centerline, PartitionError> {
        if reaches.is_empty() {
            return Err(PartitionError::EmptyCenterline);
        }
        if let Some(reach) = reaches.iter().find(|r| r.line.length() <= EPSILON_DIST) {
            return Err(PartitionError::DegenerateReach(reach.id));
        }
        Ok(Centerline { reaches })
    }

    /// From `(reach id, line)` pairs, like `geom::io::read_polylines` returns.
    pub fn from_polylines(lines: Vec<(usize, PolyLine)>) -> Result<Centerline, PartitionError> {
        Centerline::new(
            lines
                .into_iter()
                .map(|(id, line)| Reach {
                    id: ReachId(id),
                    line,
                })
                .collect(),
        )
    }

    pub fn reaches(&self) -> &Vec<Reach> {
        &self.reaches
    }
}

/// The piece of the input polygon belonging to one reach.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentPolygon {
    pub reach: ReachId,
    pub polygon: Polygon,
}

impl SegmentPolygon {
    pub fn to_geojson(&self, id_property: &str) -> Feature {
        let mut feature = geom::io::feature(self.polygon.to_geojson());
        feature.set_property(id_property, self.reach.0);
        feature.set_property("area", self.polygon.area());
        feature
    }
}

/// Splits `polygon` into disjoint pieces, one per connected area closest to each reach, together
/// covering all of it. Output is sorted by reach id. A reach may own more than one piece when the
/// polygon pinches it off, and a reach far from the polygon may own none.
pub fn divide_polygon(
    centerline: &Centerline,
    polygon: &Polygon,
    scratch: &ScratchWorkspace,
    config: &PartitionConfig,
) -> Result<Vec<SegmentPolygon>, PartitionError> {
    config.validate()?;
    // Centerline::new checks this, but the fields could've been built some other way
    if centerline.reaches.is_empty() {
        return Err(PartitionError::EmptyCenterline);
    }
    if !centerline
        .reaches
        .iter()
        .any(|r| polygon.intersects_polyline(&r.line))
    {
        return Err(PartitionError::Topology(
            "the centerline doesn't touch the polygon".to_string(),
        ));
    }

    let snap = config.snap_tolerance();
    let scratch = scratch.namespace(config.keep_scratch);
    let mut timer = Timer::new(format!("divide polygon ({})", scratch.prefix()));

    timer.start("densify centerline");
    let reaches: Vec<Reach> = centerline
        .reaches
        .iter()
        .map(|r| Reach {
            id: r.id,
            line: r.line.densify(config.point_density()),
        })
        .collect();
    timer.stop("densify centerline");
    scratch.write("centerline", || {
        reaches
            .iter()
            .map(|r| {
                let mut f = geom::io::feature(r.line.to_geojson());
                f.set_property("reach", r.id.0);
                f
            })
            .collect()
    })?;

    timer.start("find confluences");
    let confluences = junction::find_confluences(&reaches, snap);
    let generators = junction::thiessen_generators(
        &reaches,
        &confluences,
        config.junction_buffer(),
        snap,
    );
    timer.stop("find confluences");
    timer.note(format!(
        "{} confluences, {} Thiessen points",
        prettyprint_usize(confluences.len()),
        prettyprint_usize(generators.len())
    ));
    scratch.write("confluences", || points_to_features(&confluences))?;
    scratch.write("thiessen_points", || points_to_features(&generators))?;

    timer.start("Thiessen cells");
    let cells = thiessen::thiessen_cells(&generators, polygon)?;
    timer.stop("Thiessen cells");
    scratch.write("thiessen_cells", || {
        cells
            .iter()
            .map(|c| geom::io::feature(c.polygon.to_geojson()))
            .collect()
    })?;

    timer.start("reroute junction cells");
    let junctions = junction::junction_cells(&cells, &confluences, snap);
    let split_pts = junction::split_points(&junctions, &reaches, snap);
    let rings: Vec<_> = junctions
        .iter()
        .flat_map(|c| c.polygon.rings().iter().cloned())
        .collect();
    let rings =
        reorient::change_starting_vertex(&confluences, &rings, config.vertex_match_tolerance());
    let pieces: Vec<PolyLine> = rings
        .iter()
        .flat_map(|ring| junction::split_ring(ring, &split_pts, config.split_tolerance()))
        .collect();
    let connectors = junction::connectors(&pieces, &confluences);
    timer.stop("reroute junction cells");
    timer.note(format!(
        "{} junction cells split into {} pieces, with {} connectors",
        junctions.len(),
        pieces.len(),
        connectors.len()
    ));
    scratch.write("split_points", || points_to_features(&split_pts))?;
    scratch.write("connectors", || {
        connectors
            .iter()
            .map(|l| geom::io::feature(l.to_polyline().to_geojson()))
            .collect()
    })?;

    timer.start("polygonize");
    let mut segments: Vec<(Line, Option<ReachId>)> = Vec::new();
    segments.extend(connectors.into_iter().map(|l| (l, None)));
    for cell in &cells {
        for ring in cell.polygon.rings() {
            segments.extend(ring.lines().map(|l| (l, None)));
        }
    }
    for ring in polygon.rings() {
        segments.extend(ring.lines().map(|l| (l, None)));
    }
    for reach in &reaches {
        segments.extend(reach.line.lines().map(|l| (l, Some(reach.id))));
    }
    let arrangement = arrangement::Arrangement::new(&segments, snap);
    let faces = arrangement.polygonize()?;
    timer.stop("polygonize");

    timer.start("dissolve");
    let labels = dissolve::attribute_faces(&arrangement, &faces, polygon);
    let num_inside = labels
        .iter()
        .filter(|l| **l != dissolve::Label::Outside)
        .count();
    if num_inside == 0 {
        return Err(PartitionError::Topology(
            "polygonizing produced nothing inside the polygon".to_string(),
        ));
    }
    timer.note(format!(
        "{} faces inside the polygon",
        prettyprint_usize(num_inside)
    ));
    scratch.write("faces", || {
        faces
            .faces
            .iter()
            .zip(labels.iter())
            .map(|(face, label)| {
                let mut f = geom::io::feature(face.polygon.to_geojson());
                f.set_property("label", format!("{:?}", label));
                f
            })
            .collect()
    })?;
    let regions = dissolve::dissolve(&arrangement, &faces, &labels);
    let eliminated = dissolve::eliminate(&arrangement, &faces, &regions)?;
    let merged = dissolve::dissolve(&arrangement, &faces, &regions.face_labels(&eliminated));
    let results = dissolve::trace_regions(&arrangement, &faces, &merged, snap)?;
    timer.stop("dissolve");

    scratch.write("segments", || {
        results.iter().map(|s| s.to_geojson("reach")).collect()
    })?;
    timer.note(format!(
        "Divided the polygon into {} pieces",
        prettyprint_usize(results.len())
    ));
    Ok(results)
}

fn points_to_features(pts: &[geom::Pt2D]) -> Vec<Feature> {
    pts.iter()
        .map(|pt| geom::io::feature(pt.to_geojson()))
        .collect()
}
