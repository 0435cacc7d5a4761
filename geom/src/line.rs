use std::fmt;

use anyhow::Result;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use serde::{Deserialize, Serialize};

use crate::{Distance, PolyLine, Pt2D, EPSILON_DIST};

/// A line segment.
#[derive(PartialEq, Serialize, Deserialize, Clone, Copy, Debug)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    /// Creates a line segment between two points, which must not be the same
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> Result<Line> {
        if pt1.dist_to(pt2) <= EPSILON_DIST {
            bail!("Line from {:?} to {:?} too small", pt1, pt2);
        }
        Ok(Line(pt1, pt2))
    }

    /// Equivalent to `Line::new(pt1, pt2).unwrap()`. Use this to effectively document an
    /// assertion at the call-site.
    pub fn must_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line::new(pt1, pt2).unwrap()
    }

    /// Callers must already know the points are distinct.
    pub(crate) fn unchecked_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line(pt1, pt2)
    }

    pub fn pt1(&self) -> Pt2D {
        self.0
    }

    pub fn pt2(&self) -> Pt2D {
        self.1
    }

    pub fn points(&self) -> Vec<Pt2D> {
        vec![self.0, self.1]
    }

    pub fn to_polyline(&self) -> PolyLine {
        PolyLine::unchecked_new(self.points())
    }

    pub fn length(&self) -> Distance {
        self.pt1().dist_to(self.pt2())
    }

    pub fn reversed(&self) -> Line {
        Line(self.pt2(), self.pt1())
    }

    pub fn middle(&self) -> Pt2D {
        self.percent_along(0.5)
    }

    /// Unbounded: values outside [0, 1] extrapolate.
    pub fn percent_along(&self, percent: f64) -> Pt2D {
        Pt2D::new(
            self.pt1().x() + percent * (self.pt2().x() - self.pt1().x()),
            self.pt1().y() + percent * (self.pt2().y() - self.pt1().y()),
        )
    }

    /// The fraction along this segment of the point on it closest to `pt`, clamped to [0, 1].
    pub fn percent_of_closest(&self, pt: Pt2D) -> f64 {
        let dx = self.pt2().x() - self.pt1().x();
        let dy = self.pt2().y() - self.pt1().y();
        let len_sq = dx * dx + dy * dy;
        let t = ((pt.x() - self.pt1().x()) * dx + (pt.y() - self.pt1().y()) * dy) / len_sq;
        t.clamp(0.0, 1.0)
    }

    pub fn closest_pt(&self, pt: Pt2D) -> Pt2D {
        self.percent_along(self.percent_of_closest(pt))
    }

    pub fn dist_to_pt(&self, pt: Pt2D) -> Distance {
        self.closest_pt(pt).dist_to(pt)
    }

    /// True if `pt` is within `threshold` of any part of this segment.
    pub fn contains_pt(&self, pt: Pt2D, threshold: Distance) -> bool {
        self.dist_to_pt(pt) <= threshold
    }

    /// The single point where two segments cross or touch. Overlapping collinear segments have
    /// no single answer, so they return None here; see `touch_points`.
    pub fn intersection(&self, other: &Line) -> Option<Pt2D> {
        match line_intersection(geo::Line::from(*self), geo::Line::from(*other))? {
            LineIntersection::SinglePoint { intersection, .. } => {
                Pt2D::checked_new(intersection.x, intersection.y)
            }
            LineIntersection::Collinear { .. } => None,
        }
    }

    /// Every point where the two segments meet: the crossing point, or both ends of a collinear
    /// overlap.
    pub fn touch_points(&self, other: &Line) -> Vec<Pt2D> {
        match line_intersection(geo::Line::from(*self), geo::Line::from(*other)) {
            None => Vec::new(),
            Some(LineIntersection::SinglePoint { intersection, .. }) => {
                Pt2D::checked_new(intersection.x, intersection.y)
                    .into_iter()
                    .collect()
            }
            Some(LineIntersection::Collinear { intersection }) => {
                let mut pts = vec![Pt2D::from(intersection.start)];
                if intersection.start != intersection.end {
                    pts.push(Pt2D::from(intersection.end));
                }
                pts
            }
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Line::new(")?;
        writeln!(f, "  Pt2D::new({}, {}),", self.0.x(), self.0.y())?;
        writeln!(f, "  Pt2D::new({}, {}),", self.1.x(), self.1.y())?;
        write!(f, ")")
    }
}

impl From<Line> for geo::Line {
    fn from(line: Line) -> Self {
        geo::Line::new(geo::Coord::from(line.0), geo::Coord::from(line.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_and_overlap() {
        let horiz = Line::must_new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        let vert = Line::must_new(Pt2D::new(5.0, -5.0), Pt2D::new(5.0, 5.0));
        assert_eq!(horiz.intersection(&vert), Some(Pt2D::new(5.0, 0.0)));

        let overlap = Line::must_new(Pt2D::new(8.0, 0.0), Pt2D::new(20.0, 0.0));
        assert_eq!(horiz.intersection(&overlap), None);
        let mut pts = horiz.touch_points(&overlap);
        pts.sort_by(|a, b| a.x().total_cmp(&b.x()));
        assert_eq!(pts, vec![Pt2D::new(8.0, 0.0), Pt2D::new(10.0, 0.0)]);

        let apart = Line::must_new(Pt2D::new(0.0, 1.0), Pt2D::new(10.0, 1.0));
        assert!(horiz.touch_points(&apart).is_empty());
    }

    #[test]
    fn closest() {
        let l = Line::must_new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        assert_eq!(l.closest_pt(Pt2D::new(3.0, 4.0)), Pt2D::new(3.0, 0.0));
        assert_eq!(l.dist_to_pt(Pt2D::new(13.0, 4.0)), Distance::meters(5.0));
        assert!(l.contains_pt(Pt2D::new(4.0, 0.05), Distance::meters(0.1)));
        assert!(Line::new(Pt2D::new(1.0, 1.0), Pt2D::new(1.0, 1.0)).is_err());
    }
}
