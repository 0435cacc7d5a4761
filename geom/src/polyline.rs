use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Bounds, Distance, Line, Pt2D, EPSILON_DIST};

/// An ordered sequence of at least two points, with no adjacent duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
    length: Distance,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> Result<PolyLine> {
        if pts.len() < 2 {
            bail!("Need at least two points for a PolyLine");
        }
        if let Some(pair) = pts
            .windows(2)
            .find(|pair| pair[0].dist_to(pair[1]) <= EPSILON_DIST)
        {
            bail!("PolyLine has ~dupe adjacent pts at {}", pair[0]);
        }
        Ok(PolyLine::unchecked_new(pts))
    }

    pub fn must_new(pts: Vec<Pt2D>) -> PolyLine {
        PolyLine::new(pts).unwrap()
    }

    /// Doesn't check for duplicate adjacent points.
    pub(crate) fn unchecked_new(pts: Vec<Pt2D>) -> PolyLine {
        assert!(pts.len() >= 2);
        let length = pts.windows(2).map(|pair| pair[0].dist_to(pair[1])).sum();
        PolyLine { pts, length }
    }

    /// First dedupes adjacent points
    pub fn deduping_new(mut pts: Vec<Pt2D>) -> Result<PolyLine> {
        pts.dedup_by(|a, b| a.dist_to(*b) <= EPSILON_DIST);
        PolyLine::new(pts)
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts
            .windows(2)
            .map(|pair| Line::unchecked_new(pair[0], pair[1]))
    }

    pub fn length(&self) -> Distance {
        self.length
    }

    pub fn first_pt(&self) -> Pt2D {
        self.pts[0]
    }

    pub fn last_pt(&self) -> Pt2D {
        self.pts[self.pts.len() - 1]
    }

    pub fn reversed(&self) -> PolyLine {
        let mut pts = self.pts.clone();
        pts.reverse();
        PolyLine::unchecked_new(pts)
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }

    /// The point some distance along the line, measured from the start.
    pub fn dist_along(&self, dist_along: Distance) -> Result<Pt2D> {
        if dist_along < Distance::ZERO {
            bail!("dist_along {} is negative", dist_along);
        }
        let mut dist_left = dist_along;
        let num_lines = self.pts.len() - 1;
        for (idx, line) in self.lines().enumerate() {
            let length = line.length();
            let epsilon = if idx == num_lines - 1 {
                EPSILON_DIST
            } else {
                Distance::ZERO
            };
            if dist_left <= length + epsilon {
                return Ok(line.percent_along((dist_left / length).min(1.0)));
            }
            dist_left -= length;
        }
        bail!(
            "dist_along {} is longer than the polyline {}",
            dist_along,
            self.length
        )
    }

    pub fn middle(&self) -> Pt2D {
        // Half the length is always in range
        self.dist_along(self.length / 2.0).unwrap_or(self.pts[0])
    }

    /// Adds vertices so that no two consecutive points are more than `max_spacing` apart. Each
    /// original segment is divided into the fewest equal pieces satisfying that; original
    /// vertices are kept.
    pub fn densify(&self, max_spacing: Distance) -> PolyLine {
        assert!(max_spacing > Distance::ZERO);
        let mut pts = vec![self.pts[0]];
        for line in self.lines() {
            let pieces = (line.length() / max_spacing).ceil().max(1.0) as usize;
            for i in 1..pieces {
                pts.push(line.percent_along((i as f64) / (pieces as f64)));
            }
            pts.push(line.pt2());
        }
        PolyLine::unchecked_new(pts)
    }

    /// Glue together two polylines in order. The last point of `self` must be the first point of
    /// `other`.
    pub fn extend(self, other: PolyLine) -> Result<PolyLine> {
        if self.last_pt() != other.first_pt() {
            bail!(
                "Can't extend PolyLine ending at {} with one starting at {}",
                self.last_pt(),
                other.first_pt()
            );
        }
        let mut pts = self.pts;
        pts.extend(other.pts.into_iter().skip(1));
        PolyLine::deduping_new(pts)
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PolyLine::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

impl From<&PolyLine> for geo::LineString {
    fn from(pl: &PolyLine) -> Self {
        pl.pts.iter().map(|pt| geo::Coord::from(*pt)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn densify_keeps_original_vertices() {
        let pl = PolyLine::must_new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(25.0, 0.0),
            Pt2D::new(25.0, 5.0),
        ]);
        let dense = pl.densify(Distance::meters(10.0));
        // 25 -> 3 pieces, 5 -> 1 piece
        assert_eq!(dense.points().len(), 5);
        assert!(dense.points().contains(&Pt2D::new(25.0, 0.0)));
        for line in dense.lines() {
            assert!(line.length() <= Distance::meters(10.0 + 1e-9));
        }
        assert!((dense.length().inner_meters() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn along() {
        let pl = PolyLine::must_new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(10.0, 10.0),
        ]);
        assert_eq!(pl.middle(), Pt2D::new(10.0, 0.0));
        assert_eq!(
            pl.dist_along(Distance::meters(15.0)).unwrap(),
            Pt2D::new(10.0, 5.0)
        );
        assert!(pl.dist_along(Distance::meters(21.0)).is_err());
        assert!(PolyLine::new(vec![Pt2D::new(1.0, 1.0), Pt2D::new(1.0, 1.0)]).is_err());
    }
}
