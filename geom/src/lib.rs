//! Planar geometry in projected coordinates: points, segments, polylines, rings and polygons,
//! with the heavy lifting (boolean ops, interior points, segment intersection) delegated to `geo`
//! and spatial lookups to `rstar`.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod bounds;
mod distance;
mod find_closest;
pub mod io;
mod line;
mod polygon;
mod polyline;
mod pt;
mod ring;

pub use crate::bounds::Bounds;
pub use crate::distance::Distance;
pub use crate::find_closest::FindClosest;
pub use crate::line::Line;
pub use crate::polygon::Polygon;
pub use crate::polyline::PolyLine;
pub use crate::pt::Pt2D;
pub use crate::ring::{signed_area, Ring};

/// Points closer than this are considered the same by constructors.
pub const EPSILON_DIST: Distance = Distance::const_meters(1e-9);
