//! Turning the faces of the arrangement into one polygon per reach: attribute each face, dissolve
//! neighbors with the same reach, fold leftover regions into their best neighbor, and trace the
//! boundaries of what remains.

use abstutil::Counter;
use geom::{signed_area, Bounds, Distance, Polygon, Ring};

use crate::arrangement::{Arrangement, Faces, HalfEdge};
use crate::{PartitionError, ReachId, SegmentPolygon};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Label {
    /// The face isn't part of the input polygon
    Outside,
    /// Inside the polygon, but no reach runs along its boundary
    Unmatched,
    Reach(ReachId),
}

/// Labels each face by the reach it shares the most boundary length with. Ties go to the lowest
/// reach id.
pub fn attribute_faces(arrangement: &Arrangement, faces: &Faces, polygon: &Polygon) -> Vec<Label> {
    faces
        .faces
        .iter()
        .map(|face| {
            match face.polygon.interior_point() {
                Some(pt) if polygon.contains_pt(pt) => {}
                _ => {
                    return Label::Outside;
                }
            }
            let mut shared: Counter<ReachId> = Counter::new();
            for h in &face.boundary {
                for reach in arrangement.reaches(*h) {
                    shared.add(*reach, arrangement.length(*h).inner_meters());
                }
            }
            match shared.max_key() {
                Some(reach) => Label::Reach(reach),
                None => Label::Unmatched,
            }
        })
        .collect()
}

/// Disjoint sets with path compression. Unions keep the smaller root, so region numbering only
/// depends on face order.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let p = self.parent[x];
        if p != x {
            let root = self.find(p);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Groups of edge-connected faces sharing one label.
pub struct Regions {
    /// None for faces outside the polygon
    region_of_face: Vec<Option<usize>>,
    pub labels: Vec<Label>,
}

impl Regions {
    fn region_left_of(&self, faces: &Faces, h: HalfEdge) -> Option<usize> {
        faces.left_of(h).and_then(|f| self.region_of_face[f])
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// The label of every face, taken from its region. `Outside` faces stay that way.
    pub fn face_labels(&self, region_labels: &[Label]) -> Vec<Label> {
        self.region_of_face
            .iter()
            .map(|r| match r {
                Some(r) => region_labels[*r],
                None => Label::Outside,
            })
            .collect()
    }
}

/// Merges faces across every edge whose two sides carry the same label.
pub fn dissolve(arrangement: &Arrangement, faces: &Faces, labels: &[Label]) -> Regions {
    let mut sets = UnionFind::new(faces.faces.len());
    for h in arrangement.half_edges() {
        if let (Some(a), Some(b)) = (faces.left_of(h), faces.left_of(h.twin())) {
            if a != b && labels[a] != Label::Outside && labels[a] == labels[b] {
                sets.union(a, b);
            }
        }
    }

    let mut region_of_root = vec![None; faces.faces.len()];
    let mut region_of_face = Vec::new();
    let mut region_labels = Vec::new();
    for (face, label) in labels.iter().enumerate() {
        if *label == Label::Outside {
            region_of_face.push(None);
            continue;
        }
        let root = sets.find(face);
        let region = match region_of_root[root] {
            Some(r) => r,
            None => {
                region_labels.push(*label);
                region_of_root[root] = Some(region_labels.len() - 1);
                region_labels.len() - 1
            }
        };
        region_of_face.push(Some(region));
    }
    Regions {
        region_of_face,
        labels: region_labels,
    }
}

/// Picks a reach for every unmatched region: whichever neighboring reach shares the longest
/// boundary with it, ties going to the lowest reach id. Neighbors are judged before any merging
/// happens. Returns the new label per region.
pub fn eliminate(
    arrangement: &Arrangement,
    faces: &Faces,
    regions: &Regions,
) -> Result<Vec<Label>, PartitionError> {
    if !regions
        .labels
        .iter()
        .any(|label| matches!(label, Label::Reach(_)))
    {
        return Err(PartitionError::Topology(
            "no part of the polygon shares a boundary with any reach".to_string(),
        ));
    }

    let mut shared: Vec<Counter<ReachId>> = vec![Counter::new(); regions.len()];
    for h in arrangement.half_edges() {
        if let (Some(a), Some(b)) = (
            regions.region_left_of(faces, h),
            regions.region_left_of(faces, h.twin()),
        ) {
            if let Label::Reach(reach) = regions.labels[b] {
                if a != b {
                    shared[a].add(reach, arrangement.length(h).inner_meters());
                }
            }
        }
    }

    let mut result = regions.labels.clone();
    for (region, label) in regions.labels.iter().enumerate() {
        if *label != Label::Unmatched {
            continue;
        }
        match shared[region].max_key() {
            Some(reach) => {
                debug!(
                    "Region {} has no reach; merging it into reach {} across {:.3} of boundary",
                    region,
                    reach,
                    shared[region].get(reach)
                );
                result[region] = Label::Reach(reach);
            }
            None => {
                return Err(PartitionError::Topology(format!(
                    "region {} touches no reach and has no neighbor that does",
                    region
                )));
            }
        }
    }
    Ok(result)
}

/// Walks the boundary of every region, producing one polygon per connected outer boundary with
/// its holes. Vertices within `snap` of the line joining their neighbors are dropped.
pub fn trace_regions(
    arrangement: &Arrangement,
    faces: &Faces,
    regions: &Regions,
    snap: Distance,
) -> Result<Vec<SegmentPolygon>, PartitionError> {
    let limit = arrangement.num_half_edges();
    let mut visited = vec![false; limit];
    let mut cycles: Vec<Vec<Vec<HalfEdge>>> = vec![Vec::new(); regions.len()];
    for start in arrangement.half_edges() {
        let Some(region) = regions.region_left_of(faces, start) else {
            continue;
        };
        if visited[start.idx()] || regions.region_left_of(faces, start.twin()) == Some(region) {
            continue;
        }

        let mut cycle = Vec::new();
        let mut current = start;
        loop {
            visited[current.idx()] = true;
            cycle.push(current);
            // Turn through any edges interior to the region
            let mut candidate = arrangement.next(current);
            let mut turns = 0;
            while regions.region_left_of(faces, candidate.twin()) == Some(region) {
                candidate = arrangement.next(candidate.twin());
                turns += 1;
                if turns > limit {
                    return Err(PartitionError::Topology(format!(
                        "lost tracing the boundary of region {}",
                        region
                    )));
                }
            }
            current = candidate;
            if current == start {
                break;
            }
            if cycle.len() > limit {
                return Err(PartitionError::Topology(format!(
                    "the boundary of region {} never closes",
                    region
                )));
            }
        }
        cycles[region].push(cycle);
    }

    let mut results = Vec::new();
    for (region, region_cycles) in cycles.into_iter().enumerate() {
        let Label::Reach(reach) = regions.labels[region] else {
            return Err(PartitionError::Topology(format!(
                "region {} has no reach after eliminating",
                region
            )));
        };
        let mut outers = Vec::new();
        let mut holes = Vec::new();
        for cycle in region_cycles {
            let pts = arrangement.cycle_pts(&cycle);
            let area = signed_area(&pts);
            let ring = Ring::new(pts)
                .and_then(|ring| ring.remove_collinear(snap))
                .map_err(|err| {
                    PartitionError::Topology(format!("boundary of reach {}: {}", reach, err))
                })?;
            if area > 0.0 {
                outers.push(ring);
            } else if area < 0.0 {
                holes.push(ring);
            }
        }

        let mut polygons: Vec<(Ring, Vec<Ring>)> =
            outers.into_iter().map(|ring| (ring, Vec::new())).collect();
        for hole in holes {
            let inside = hole
                .reversed()
                .into_polygon()
                .interior_point()
                .ok_or_else(|| {
                    PartitionError::Topology(format!("degenerate hole in reach {}", reach))
                })?;
            let container = polygons
                .iter()
                .enumerate()
                .filter(|(_, (outer, _))| {
                    Bounds::from(outer.points()).contains(inside)
                        && outer.clone().into_polygon().contains_pt(inside)
                })
                .min_by(|(_, (a, _)), (_, (b, _))| a.signed_area().total_cmp(&b.signed_area()))
                .map(|(idx, _)| idx);
            match container {
                Some(idx) => polygons[idx].1.push(hole),
                None => {
                    return Err(PartitionError::Topology(format!(
                        "a hole in reach {} isn't inside any of its boundaries",
                        reach
                    )));
                }
            }
        }
        if polygons.len() > 1 {
            debug!("Reach {} covers {} separate pieces", reach, polygons.len());
        }
        for (outer, holes) in polygons {
            results.push(SegmentPolygon {
                reach,
                polygon: Polygon::with_holes(outer, holes),
            });
        }
    }
    results.sort_by_key(|s| s.reach);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use geom::{Line, Pt2D};

    use super::*;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
        Line::must_new(Pt2D::new(x1, y1), Pt2D::new(x2, y2))
    }

    fn snap() -> Distance {
        Distance::meters(1e-6)
    }

    fn outline(pts: &[(f64, f64)]) -> Polygon {
        let mut pts: Vec<Pt2D> = pts.iter().map(|(x, y)| Pt2D::new(*x, *y)).collect();
        pts.push(pts[0]);
        Ring::must_new(pts).into_polygon()
    }

    fn run(
        polygon: &Polygon,
        segments: Vec<(Line, Option<ReachId>)>,
    ) -> Result<Vec<SegmentPolygon>, PartitionError> {
        let mut all: Vec<(Line, Option<ReachId>)> = polygon
            .rings()
            .iter()
            .flat_map(|ring| ring.lines())
            .map(|line| (line, None))
            .collect();
        all.extend(segments);
        let arrangement = Arrangement::new(&all, snap());
        let faces = arrangement.polygonize()?;
        let labels = attribute_faces(&arrangement, &faces, polygon);
        let regions = dissolve(&arrangement, &faces, &labels);
        let eliminated = eliminate(&arrangement, &faces, &regions)?;
        let merged = dissolve(&arrangement, &faces, &regions.face_labels(&eliminated));
        trace_regions(&arrangement, &faces, &merged, snap())
    }

    #[test]
    fn sliver_joins_the_longest_neighbor() {
        // An L-shaped outline cut into three rooms. The middle room has no reach, and shares 10
        // units of wall with reach 1 but only 4 with reach 2.
        let polygon = outline(&[
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 4.0),
            (20.0, 4.0),
            (20.0, 10.0),
            (0.0, 10.0),
        ]);
        let results = run(
            &polygon,
            vec![
                (seg(10.0, 0.0, 10.0, 10.0), None),
                (seg(20.0, 0.0, 20.0, 4.0), None),
                (seg(0.0, 5.0, 10.0, 5.0), Some(ReachId(1))),
                (seg(20.0, 2.0, 30.0, 2.0), Some(ReachId(2))),
            ],
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].reach, ReachId(1));
        assert!((results[0].polygon.area() - 200.0).abs() < 1e-9);
        assert_eq!(results[1].reach, ReachId(2));
        assert!((results[1].polygon.area() - 40.0).abs() < 1e-9);
        // The merged room and the split room lose their interior walls entirely
        assert_eq!(results[0].polygon.exterior().points().len(), 5);
        assert_eq!(results[1].polygon.exterior().points().len(), 5);
    }

    #[test]
    fn unmatched_island_is_absorbed() {
        let polygon = outline(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let results = run(
            &polygon,
            vec![
                // A pond in the middle that nothing runs along, and a reach crossing the rest
                (seg(4.0, 4.0, 6.0, 4.0), None),
                (seg(6.0, 4.0, 6.0, 6.0), None),
                (seg(6.0, 6.0, 4.0, 6.0), None),
                (seg(4.0, 6.0, 4.0, 4.0), None),
                (seg(0.0, 2.0, 10.0, 2.0), Some(ReachId(5))),
            ],
        )
        .unwrap();
        // The pond is unmatched and gets swallowed, so there's no hole left at all
        assert_eq!(results.len(), 1);
        assert!(results[0].polygon.holes().is_empty());
        assert!((results[0].polygon.area() - 100.0).abs() < 1e-9);
        assert_eq!(results[0].polygon.exterior().points().len(), 5);
    }

    #[test]
    fn holes_survive_dissolving() {
        let square = |x1: f64, y1: f64, x2: f64, y2: f64| {
            Ring::must_new(vec![
                Pt2D::new(x1, y1),
                Pt2D::new(x2, y1),
                Pt2D::new(x2, y2),
                Pt2D::new(x1, y2),
                Pt2D::new(x1, y1),
            ])
        };
        let polygon = Polygon::with_holes(
            square(0.0, 0.0, 10.0, 10.0),
            vec![square(4.0, 4.0, 6.0, 6.0)],
        );
        let results = run(
            &polygon,
            vec![(seg(0.0, 2.0, 10.0, 2.0), Some(ReachId(5)))],
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].polygon.holes().len(), 1);
        assert!((results[0].polygon.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_the_lowest_reach() {
        // The middle strip touches reach 4 and reach 3 along equally long walls
        let polygon = outline(&[(0.0, 0.0), (30.0, 0.0), (30.0, 10.0), (0.0, 10.0)]);
        let results = run(
            &polygon,
            vec![
                (seg(10.0, 0.0, 10.0, 10.0), None),
                (seg(20.0, 0.0, 20.0, 10.0), None),
                (seg(0.0, 5.0, 10.0, 5.0), Some(ReachId(4))),
                (seg(20.0, 5.0, 30.0, 5.0), Some(ReachId(3))),
            ],
        )
        .unwrap();
        assert_eq!(results[0].reach, ReachId(3));
        assert!((results[0].polygon.area() - 200.0).abs() < 1e-9);
        assert_eq!(results[1].reach, ReachId(4));
        assert!((results[1].polygon.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_touches_a_reach() {
        let polygon = outline(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let result = run(
            &polygon,
            vec![(seg(20.0, 0.0, 30.0, 0.0), Some(ReachId(1)))],
        );
        assert!(matches!(result, Err(PartitionError::Topology(_))));
    }
}
