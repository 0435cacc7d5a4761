use std::fmt;

use anyhow::Result;
use geo::{Area, BooleanOps, Contains, InteriorPoint, Intersects};
use serde::{Deserialize, Serialize};

use crate::{Bounds, Distance, PolyLine, Pt2D, Ring};

/// A polygon with one outer ring and any number of holes.
#[derive(PartialEq, Serialize, Deserialize, Clone, Debug)]
pub struct Polygon {
    /// The first ring is the exterior; the rest are holes.
    rings: Vec<Ring>,
}

impl Polygon {
    pub fn with_holes(outer: Ring, mut inner: Vec<Ring>) -> Polygon {
        inner.insert(0, outer);
        Polygon { rings: inner }
    }

    pub fn from_rings(mut rings: Vec<Ring>) -> Result<Polygon> {
        if rings.is_empty() {
            bail!("Can't make a polygon from no rings");
        }
        let outer = rings.remove(0);
        Ok(Polygon::with_holes(outer, rings))
    }

    /// Bottom-left at `(x1, y1)`
    pub fn rectangle_two_corners(pt1: Pt2D, pt2: Pt2D) -> Result<Polygon> {
        let (x1, x2) = (pt1.x().min(pt2.x()), pt1.x().max(pt2.x()));
        let (y1, y2) = (pt1.y().min(pt2.y()), pt1.y().max(pt2.y()));
        let ring = Ring::new(vec![
            Pt2D::new(x1, y1),
            Pt2D::new(x2, y1),
            Pt2D::new(x2, y2),
            Pt2D::new(x1, y2),
            Pt2D::new(x1, y1),
        ])?;
        Ok(ring.into_polygon())
    }

    pub fn exterior(&self) -> &Ring {
        &self.rings[0]
    }

    pub fn holes(&self) -> &[Ring] {
        &self.rings[1..]
    }

    pub fn rings(&self) -> &Vec<Ring> {
        &self.rings
    }

    /// The points of the exterior ring
    pub fn points(&self) -> &Vec<Pt2D> {
        self.rings[0].points()
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(self.points())
    }

    /// Usually m^2
    pub fn area(&self) -> f64 {
        // Don't use signed_area, since rings may come in either orientation
        self.to_geo().unsigned_area()
    }

    /// Does this polygon contain the point in its interior?
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.to_geo().contains(&geo::Point::from(pt))
    }

    /// Does the polygon's interior or boundary come within `threshold` of the point?
    pub fn touches_pt(&self, pt: Pt2D, threshold: Distance) -> bool {
        self.contains_pt(pt)
            || self
                .rings
                .iter()
                .any(|ring| ring.lines().any(|l| l.contains_pt(pt, threshold)))
    }

    pub fn intersects(&self, other: &Polygon) -> bool {
        self.to_geo().intersects(&other.to_geo())
    }

    pub fn intersects_polyline(&self, pl: &PolyLine) -> bool {
        self.to_geo().intersects(&geo::LineString::from(pl))
    }

    /// A point guaranteed to be in the interior of the polygon, if it's not degenerate.
    pub fn interior_point(&self) -> Option<Pt2D> {
        self.to_geo().interior_point().map(Pt2D::from)
    }

    pub fn intersection(&self, other: &Polygon) -> Vec<Polygon> {
        from_multi(self.to_geo().intersection(&other.to_geo()))
    }

    /// Union all of the polygons into one geo::MultiPolygon
    pub fn union_all_into_multipolygon(list: Vec<Polygon>) -> geo::MultiPolygon {
        let mut result = geo::MultiPolygon(Vec::new());
        for p in list {
            result = result.union(&geo::MultiPolygon(vec![p.into()]));
        }
        result
    }

    /// A less verbose way of invoking the From/Into impl. Note this hides a clone.
    pub fn to_geo(&self) -> geo::Polygon {
        self.clone().into()
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Polygon with {} rings", self.rings.len())?;
        for ring in &self.rings {
            writeln!(f, "{}", ring)?;
        }
        Ok(())
    }
}

impl TryFrom<geo::Polygon> for Polygon {
    type Error = anyhow::Error;

    fn try_from(poly: geo::Polygon) -> Result<Self> {
        let (exterior, interiors) = poly.into_inner();
        let mut rings = vec![Ring::try_from(exterior)?];
        for hole in interiors {
            // Holes collapsing to nothing can be skipped
            if let Ok(ring) = Ring::try_from(hole) {
                rings.push(ring);
            }
        }
        Polygon::from_rings(rings)
    }
}

impl From<Polygon> for geo::Polygon {
    fn from(poly: Polygon) -> Self {
        let mut rings = poly.rings.into_iter();
        let exterior = rings
            .next()
            .map(geo::LineString::from)
            .unwrap_or_else(|| geo::LineString(Vec::new()));
        Self::new(exterior, rings.map(geo::LineString::from).collect())
    }
}

/// Splits a multipolygon into its parts, dropping anything degenerate.
fn from_multi(multi: geo::MultiPolygon) -> Vec<Polygon> {
    multi
        .into_iter()
        .filter_map(|p| Polygon::try_from(p).ok())
        .collect()
}
