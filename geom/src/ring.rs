use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Distance, Line, PolyLine, Polygon, Pt2D, EPSILON_DIST};

/// Maybe a misnomer, but like a PolyLine, but closed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    // first equals last
    pts: Vec<Pt2D>,
}

impl Ring {
    pub fn new(pts: Vec<Pt2D>) -> Result<Ring> {
        if pts.len() < 4 {
            bail!("Can't make a ring with < 4 points");
        }
        if pts[0] != pts[pts.len() - 1] {
            bail!("Can't make a ring with mismatching first/last points");
        }

        // Callers are expected to squish down tiny edges themselves; they know better what needs
        // to be merged and why.
        if let Some(pair) = pts
            .windows(2)
            .find(|pair| pair[0].dist_to(pair[1]) <= EPSILON_DIST)
        {
            bail!("Ring has ~dupe adjacent pts at {}", pair[0]);
        }

        Ok(Ring { pts })
    }

    pub fn must_new(pts: Vec<Pt2D>) -> Ring {
        Ring::new(pts).unwrap()
    }

    /// Closes the ring if needed and squishes adjacent duplicate points first.
    pub fn deduping_new(mut pts: Vec<Pt2D>) -> Result<Ring> {
        pts.dedup_by(|a, b| a.dist_to(*b) <= EPSILON_DIST);
        if let (Some(first), Some(last)) = (pts.first().cloned(), pts.last().cloned()) {
            if first.dist_to(last) <= EPSILON_DIST {
                pts.pop();
            }
            pts.push(first);
        }
        Ring::new(pts)
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts
            .windows(2)
            .map(|pair| Line::unchecked_new(pair[0], pair[1]))
    }

    /// The ring as a polyline, starting and ending at the first point.
    pub fn to_polyline(&self) -> PolyLine {
        PolyLine::unchecked_new(self.pts.clone())
    }

    pub fn perimeter(&self) -> Distance {
        self.lines().map(|l| l.length()).sum()
    }

    /// Shoelace formula. Positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.pts)
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn reversed(&self) -> Ring {
        let mut pts = self.pts.clone();
        pts.reverse();
        Ring { pts }
    }

    /// Removes vertices lying within `threshold` of the straight line joining their neighbors.
    /// Treats the ring cyclically, so the starting vertex may be removed too.
    pub fn remove_collinear(&self, threshold: Distance) -> Result<Ring> {
        let mut pts: Vec<Pt2D> = self.pts[..self.pts.len() - 1].to_vec();
        loop {
            let n = pts.len();
            if n < 3 {
                bail!("Ring collapsed after removing collinear points");
            }
            let mut removed = false;
            for idx in 0..n {
                let prev = pts[(idx + n - 1) % n];
                let next = pts[(idx + 1) % n];
                if is_redundant(prev, pts[idx], next, threshold) {
                    pts.remove(idx);
                    removed = true;
                    break;
                }
            }
            if !removed {
                break;
            }
        }
        pts.push(pts[0]);
        Ring::new(pts)
    }

    /// Rotates the ring so it starts at the vertex `idx`, keeping the winding order.
    pub fn rotated_to(&self, idx: usize) -> Ring {
        let n = self.pts.len() - 1;
        assert!(idx < n);
        let mut pts: Vec<Pt2D> = Vec::with_capacity(self.pts.len());
        pts.extend_from_slice(&self.pts[idx..n]);
        pts.extend_from_slice(&self.pts[0..idx]);
        pts.push(pts[0]);
        Ring { pts }
    }

    pub fn into_polygon(self) -> Polygon {
        Polygon::with_holes(self, Vec::new())
    }
}

fn is_redundant(prev: Pt2D, pt: Pt2D, next: Pt2D, threshold: Distance) -> bool {
    match Line::new(prev, next) {
        // Only drop points lying between their neighbors, never spikes doubling back
        Ok(l) => {
            let pct = l.percent_of_closest(pt);
            pct > 0.0 && pct < 1.0 && l.dist_to_pt(pt) <= threshold
        }
        Err(_) => false,
    }
}

/// Shoelace formula over a closed list of points. Positive when counter-clockwise.
pub fn signed_area(pts: &[Pt2D]) -> f64 {
    let mut sum = 0.0;
    for pair in pts.windows(2) {
        sum += pair[0].x() * pair[1].y() - pair[1].x() * pair[0].y();
    }
    sum / 2.0
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ring::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

impl From<Ring> for geo::LineString {
    fn from(ring: Ring) -> Self {
        ring.pts.into_iter().map(geo::Coord::from).collect()
    }
}

impl TryFrom<geo::LineString> for Ring {
    type Error = anyhow::Error;

    fn try_from(line_string: geo::LineString) -> Result<Self> {
        Ring::deduping_new(line_string.into_iter().map(Pt2D::from).collect())
    }
}
