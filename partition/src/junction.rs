//! Everything about confluences: finding them, keeping Thiessen generators away from them, and
//! rerouting the boundaries of the cells around them so that each reach gets its own side.

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;

use geom::{Distance, FindClosest, Line, PolyLine, Pt2D, Ring, EPSILON_DIST};

use crate::arrangement::envelope;
use crate::thiessen::ThiessenCell;
use crate::Reach;

/// Segments of every reach, tagged with the index of the reach they came from, in an R-tree.
struct SegmentIndex {
    segments: Vec<(usize, Line)>,
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
    pad: Distance,
}

impl SegmentIndex {
    fn new(reaches: &[Reach], pad: Distance) -> SegmentIndex {
        let mut segments = Vec::new();
        for (idx, reach) in reaches.iter().enumerate() {
            for line in reach.line.lines() {
                segments.push((idx, line));
            }
        }
        let tree = RTree::bulk_load(
            segments
                .iter()
                .enumerate()
                .map(|(idx, (_, line))| {
                    GeomWithData::new(Rectangle::from_aabb(envelope(line, pad)), idx)
                })
                .collect(),
        );
        SegmentIndex {
            segments,
            tree,
            pad,
        }
    }

    /// Indices of segments whose padded envelope overlaps this line's
    fn candidates(&self, line: &Line) -> impl Iterator<Item = usize> + '_ {
        self.tree
            .locate_in_envelope_intersecting(&envelope(line, self.pad))
            .map(|obj| obj.data)
    }
}

/// Every point where two segments meet, counting endpoints that come within `snap` of the other
/// segment.
fn meeting_points(line: &Line, other: &Line, snap: Distance) -> Vec<Pt2D> {
    let mut pts = line.touch_points(other);
    for pt in [other.pt1(), other.pt2()] {
        if line.contains_pt(pt, snap) {
            pts.push(pt);
        }
    }
    for pt in [line.pt1(), line.pt2()] {
        if other.contains_pt(pt, snap) {
            pts.push(pt);
        }
    }
    pts
}

/// Collects points, ignoring any within the tolerance of one already seen.
struct DistinctPoints {
    pts: Vec<Pt2D>,
    index: FindClosest<usize>,
    tolerance: Distance,
}

impl DistinctPoints {
    fn new(tolerance: Distance) -> DistinctPoints {
        DistinctPoints {
            pts: Vec::new(),
            index: FindClosest::new(),
            tolerance,
        }
    }

    fn add(&mut self, pt: Pt2D) -> bool {
        if self.index.closest_pt(pt, self.tolerance).is_some() {
            return false;
        }
        self.index.add(self.pts.len(), pt);
        self.pts.push(pt);
        true
    }
}

/// Where two or more distinct reaches meet, including where one simply ends at the start of the
/// next. Points within `snap` of each other are reported once.
pub fn find_confluences(reaches: &[Reach], snap: Distance) -> Vec<Pt2D> {
    let index = SegmentIndex::new(reaches, snap);
    let mut confluences = DistinctPoints::new(snap);
    for (idx, (reach, line)) in index.segments.iter().enumerate() {
        for other_idx in index.candidates(line) {
            let (other_reach, other) = &index.segments[other_idx];
            if other_idx <= idx || other_reach == reach {
                continue;
            }
            for pt in meeting_points(line, other, snap) {
                confluences.add(pt);
            }
        }
    }
    confluences.pts
}

/// The distinct centerline vertices strictly farther than `junction_buffer` from every
/// confluence.
pub fn thiessen_generators(
    reaches: &[Reach],
    confluences: &[Pt2D],
    junction_buffer: Distance,
    snap: Distance,
) -> Vec<Pt2D> {
    let near = FindClosest::bulk_load(confluences.iter().cloned().enumerate().collect());
    let mut generators = DistinctPoints::new(snap);
    for reach in reaches {
        for pt in reach.line.points() {
            if let Some((_, confluence)) = near.nearest(*pt) {
                if pt.dist_to(confluence) <= junction_buffer {
                    continue;
                }
            }
            generators.add(*pt);
        }
    }
    generators.pts
}

/// The clipped cells touching at least one confluence.
pub fn junction_cells<'a>(
    cells: &'a [ThiessenCell],
    confluences: &[Pt2D],
    snap: Distance,
) -> Vec<&'a ThiessenCell> {
    cells
        .iter()
        .filter(|cell| {
            confluences
                .iter()
                .any(|pt| cell.polygon.touches_pt(*pt, snap))
        })
        .collect()
}

/// Where the boundaries of the junction cells cross the centerline.
pub fn split_points(junctions: &[&ThiessenCell], reaches: &[Reach], snap: Distance) -> Vec<Pt2D> {
    let index = SegmentIndex::new(reaches, snap);
    let mut split = DistinctPoints::new(snap);
    for cell in junctions {
        for ring in cell.polygon.rings() {
            for line in ring.lines() {
                for idx in index.candidates(&line) {
                    for pt in meeting_points(&line, &index.segments[idx].1, snap) {
                        split.add(pt);
                    }
                }
            }
        }
    }
    split.pts
}

/// Cuts a ring into pieces at every split point within `tolerance` of it. The ring is treated as
/// a loop, so a piece may run through the ring's starting vertex. A ring with no split points
/// yields nothing; one split point yields the whole loop, starting and ending there.
pub fn split_ring(ring: &Ring, split_pts: &[Pt2D], tolerance: Distance) -> Vec<PolyLine> {
    let lines: Vec<Line> = ring.lines().collect();
    let mut starts = Vec::with_capacity(lines.len());
    let mut perimeter = 0.0;
    for line in &lines {
        starts.push(perimeter);
        perimeter += line.length().inner_meters();
    }

    let mut positions: Vec<f64> = Vec::new();
    for pt in split_pts {
        let closest = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (line.dist_to_pt(*pt), idx))
            .min();
        if let Some((dist, idx)) = closest {
            if dist <= tolerance {
                let line = &lines[idx];
                let pos = starts[idx] + line.percent_of_closest(*pt) * line.length().inner_meters();
                positions.push(pos % perimeter);
            }
        }
    }
    positions.sort_by(|a, b| a.total_cmp(b));
    let eps = EPSILON_DIST.inner_meters();
    positions.dedup_by(|a, b| (*a - *b).abs() <= eps);
    if positions.len() > 1 && positions[0] + perimeter - positions[positions.len() - 1] <= eps {
        positions.pop();
    }

    // The last piece wraps around and ends exactly where the first one starts
    let split_at: Vec<Pt2D> = positions
        .iter()
        .map(|pos| point_at(&lines, &starts, perimeter, *pos))
        .collect();
    let mut pieces = Vec::new();
    for (idx, start) in positions.iter().enumerate() {
        let (end, end_pt) = match positions.get(idx + 1) {
            Some(end) => (*end, split_at[idx + 1]),
            None => (positions[0] + perimeter, split_at[0]),
        };
        let mut pts = vec![split_at[idx]];
        // Vertices strictly inside the piece, going around at most twice
        for k in 0..2 * lines.len() {
            let pos = starts[k % lines.len()] + ((k / lines.len()) as f64) * perimeter;
            if pos > *start && pos < end {
                pts.push(lines[k % lines.len()].pt1());
            }
        }
        pts.push(end_pt);
        match PolyLine::deduping_new(pts) {
            Ok(pl) => pieces.push(pl),
            Err(err) => debug!("Skipping a degenerate piece of a junction ring: {}", err),
        }
    }
    pieces
}

fn point_at(lines: &[Line], starts: &[f64], perimeter: f64, pos: f64) -> Pt2D {
    let pos = pos % perimeter;
    let idx = match starts.binary_search_by(|s| s.total_cmp(&pos)) {
        Ok(idx) => idx,
        Err(idx) => idx - 1,
    };
    let line = &lines[idx];
    line.percent_along((pos - starts[idx]) / line.length().inner_meters())
}

/// A straight line from the middle of each piece to the nearest confluence.
pub fn connectors(pieces: &[PolyLine], confluences: &[Pt2D]) -> Vec<Line> {
    let near = FindClosest::bulk_load(confluences.iter().cloned().enumerate().collect());
    let mut result = Vec::new();
    for piece in pieces {
        let middle = piece.middle();
        if let Some((_, confluence)) = near.nearest(middle) {
            // A piece whose middle is the confluence needs no connector
            if let Ok(line) = Line::new(middle, confluence) {
                result.push(line);
            }
        }
    }
    result
}
