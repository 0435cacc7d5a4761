//! A planar arrangement built from loose, possibly overlapping line segments, and the faces it
//! encloses.
//!
//! Building it happens in a few steps:
//!
//! 1. Every pair of segments with overlapping envelopes is intersected. Crossings, T-junctions,
//!    collinear overlaps, and endpoints lying within the snap tolerance of another segment all
//!    become cut points.
//! 2. Endpoints and cut points are snapped together into nodes.
//! 3. Each segment is split at its cut points into edges between consecutive nodes. Duplicate
//!    edges are merged, keeping the union of their reach tags.
//! 4. Dangling edges are pruned repeatedly; they can't bound any face.
//! 5. Outgoing half-edges at every node are sorted counter-clockwise. Following the next
//!    half-edge clockwise from the reverse of the one just walked traces each bounded face
//!    counter-clockwise; clockwise cycles are holes or the unbounded outside.

use std::collections::{BTreeMap, BTreeSet};

use geo::Contains;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use geom::{signed_area, Bounds, Distance, FindClosest, Line, Polygon, Pt2D, Ring};

use crate::{PartitionError, ReachId};

/// An undirected edge between two distinct nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub src: usize,
    pub dst: usize,
    /// The reaches whose centerline runs along this edge
    pub reaches: BTreeSet<ReachId>,
}

/// Edge `e` has half-edges `2e` (src to dst) and `2e + 1` (dst to src).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfEdge(usize);

impl HalfEdge {
    pub fn edge(self) -> usize {
        self.0 / 2
    }

    pub fn twin(self) -> HalfEdge {
        HalfEdge(self.0 ^ 1)
    }

    /// Dense index, for lookup tables sized by `Arrangement::num_half_edges`
    pub fn idx(self) -> usize {
        self.0
    }

    fn forwards(self) -> bool {
        self.0 % 2 == 0
    }
}

pub struct Arrangement {
    nodes: Vec<Pt2D>,
    edges: Vec<Edge>,
    /// Per node, outgoing half-edges sorted counter-clockwise by angle
    outgoing: Vec<Vec<HalfEdge>>,
    /// Per half-edge, its index in `outgoing` of its source node
    position: Vec<usize>,
}

impl Arrangement {
    pub fn new(segments: &[(Line, Option<ReachId>)], snap: Distance) -> Arrangement {
        let (nodes, edges) = node_segments(segments, snap);
        let edges = prune_dangles(nodes.len(), edges);
        Arrangement::from_edges(nodes, edges)
    }

    fn from_edges(nodes: Vec<Pt2D>, edges: Vec<Edge>) -> Arrangement {
        let mut outgoing: Vec<Vec<HalfEdge>> = vec![Vec::new(); nodes.len()];
        for (idx, edge) in edges.iter().enumerate() {
            outgoing[edge.src].push(HalfEdge(2 * idx));
            outgoing[edge.dst].push(HalfEdge(2 * idx + 1));
        }

        let mut arrangement = Arrangement {
            nodes,
            edges,
            outgoing: Vec::new(),
            position: Vec::new(),
        };
        for list in &mut outgoing {
            list.sort_by(|a, b| {
                arrangement
                    .raw_angle(*a)
                    .total_cmp(&arrangement.raw_angle(*b))
                    .then(a.cmp(b))
            });
        }
        let mut position = vec![0; 2 * arrangement.edges.len()];
        for list in &outgoing {
            for (idx, h) in list.iter().enumerate() {
                position[h.0] = idx;
            }
        }
        arrangement.outgoing = outgoing;
        arrangement.position = position;
        arrangement
    }

    #[cfg(test)]
    pub fn nodes(&self) -> &Vec<Pt2D> {
        &self.nodes
    }

    #[cfg(test)]
    pub fn edges(&self) -> &Vec<Edge> {
        &self.edges
    }

    pub fn half_edges(&self) -> impl Iterator<Item = HalfEdge> {
        (0..2 * self.edges.len()).map(HalfEdge)
    }

    pub fn num_half_edges(&self) -> usize {
        2 * self.edges.len()
    }

    pub fn src(&self, h: HalfEdge) -> usize {
        let edge = &self.edges[h.edge()];
        if h.forwards() {
            edge.src
        } else {
            edge.dst
        }
    }

    pub fn dst(&self, h: HalfEdge) -> usize {
        self.src(h.twin())
    }

    pub fn src_pt(&self, h: HalfEdge) -> Pt2D {
        self.nodes[self.src(h)]
    }

    pub fn length(&self, h: HalfEdge) -> Distance {
        self.nodes[self.src(h)].dist_to(self.nodes[self.dst(h)])
    }

    pub fn reaches(&self, h: HalfEdge) -> &BTreeSet<ReachId> {
        &self.edges[h.edge()].reaches
    }

    fn raw_angle(&self, h: HalfEdge) -> f64 {
        let from = self.nodes[self.src(h)];
        let to = self.nodes[self.dst(h)];
        (to.y() - from.y()).atan2(to.x() - from.x())
    }

    /// The next half-edge around the face on the left of `h`.
    pub fn next(&self, h: HalfEdge) -> HalfEdge {
        let around = &self.outgoing[self.dst(h)];
        let idx = self.position[h.twin().0];
        around[(idx + around.len() - 1) % around.len()]
    }

    /// Traces every bounded face, with holes attached.
    pub fn polygonize(&self) -> Result<Faces, PartitionError> {
        let mut cycle_of = vec![usize::MAX; self.num_half_edges()];
        let mut cycles: Vec<Vec<HalfEdge>> = Vec::new();
        for start in self.half_edges() {
            if cycle_of[start.0] != usize::MAX {
                continue;
            }
            let id = cycles.len();
            let mut cycle = Vec::new();
            let mut current = start;
            loop {
                cycle_of[current.0] = id;
                cycle.push(current);
                current = self.next(current);
                if current == start {
                    break;
                }
            }
            cycles.push(cycle);
        }

        let mut outers = Vec::new();
        let mut holes = Vec::new();
        for cycle in cycles {
            let pts = self.cycle_pts(&cycle);
            let area = signed_area(&pts);
            if area > 0.0 {
                let ring = Ring::new(pts).map_err(|err| {
                    PartitionError::Topology(format!("bad face boundary: {}", err))
                })?;
                outers.push((cycle, ring, area));
            } else if area < 0.0 {
                holes.push(cycle);
            }
        }

        let outer_geoms: Vec<(geo::Polygon, Bounds)> = outers
            .iter()
            .map(|(_, ring, _)| {
                (
                    geo::Polygon::new(ring.clone().into(), Vec::new()),
                    Bounds::from(ring.points()),
                )
            })
            .collect();

        let mut face_holes: Vec<Vec<Vec<HalfEdge>>> = vec![Vec::new(); outers.len()];
        for cycle in holes {
            let pt = self.src_pt(cycle[0]);
            let container = outer_geoms
                .iter()
                .enumerate()
                .filter(|(_, (poly, bounds))| {
                    bounds.contains(pt) && poly.contains(&geo::Point::from(pt))
                })
                .min_by(|(a, _), (b, _)| outers[*a].2.total_cmp(&outers[*b].2))
                .map(|(idx, _)| idx);
            // Otherwise, it's the outside of some connected piece
            if let Some(idx) = container {
                face_holes[idx].push(cycle);
            }
        }

        let mut faces = Vec::new();
        let mut face_of = vec![None; self.num_half_edges()];
        for (idx, ((mut boundary, ring, _), hole_cycles)) in
            outers.into_iter().zip(face_holes.into_iter()).enumerate()
        {
            let mut hole_rings = Vec::new();
            for cycle in hole_cycles {
                hole_rings.push(Ring::new(self.cycle_pts(&cycle)).map_err(|err| {
                    PartitionError::Topology(format!("bad hole boundary: {}", err))
                })?);
                boundary.extend(cycle);
            }
            for h in &boundary {
                face_of[h.0] = Some(idx);
            }
            faces.push(Face {
                boundary,
                polygon: Polygon::with_holes(ring, hole_rings),
            });
        }

        Ok(Faces { faces, face_of })
    }

    /// Closed list of points along a cycle of half-edges
    pub fn cycle_pts(&self, cycle: &[HalfEdge]) -> Vec<Pt2D> {
        let mut pts: Vec<Pt2D> = cycle.iter().map(|h| self.src_pt(*h)).collect();
        pts.push(pts[0]);
        pts
    }
}

/// A bounded face of the arrangement.
pub struct Face {
    /// Every half-edge with this face on its left, the outer cycle first and then any holes
    pub boundary: Vec<HalfEdge>,
    pub polygon: Polygon,
}

pub struct Faces {
    pub faces: Vec<Face>,
    /// The face on the left of each half-edge. None for the unbounded outside.
    pub face_of: Vec<Option<usize>>,
}

impl Faces {
    pub fn left_of(&self, h: HalfEdge) -> Option<usize> {
        self.face_of[h.0]
    }
}

pub(crate) fn envelope(line: &Line, pad: Distance) -> AABB<[f64; 2]> {
    let pad = pad.inner_meters();
    let (a, b) = (line.pt1(), line.pt2());
    AABB::from_corners(
        [a.x().min(b.x()) - pad, a.y().min(b.y()) - pad],
        [a.x().max(b.x()) + pad, a.y().max(b.y()) + pad],
    )
}

/// Merges points within the snap tolerance into one node.
struct NodeSnapper {
    nodes: Vec<Pt2D>,
    index: FindClosest<usize>,
    snap: Distance,
}

impl NodeSnapper {
    fn id(&mut self, pt: Pt2D) -> usize {
        if let Some((id, _)) = self.index.closest_pt(pt, self.snap) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(pt);
        self.index.add(id, pt);
        id
    }
}

fn node_segments(
    segments: &[(Line, Option<ReachId>)],
    snap: Distance,
) -> (Vec<Pt2D>, Vec<Edge>) {
    let tree = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(idx, (line, _))| {
                GeomWithData::new(Rectangle::from_aabb(envelope(line, snap)), idx)
            })
            .collect(),
    );

    let mut cuts: Vec<Vec<Pt2D>> = vec![Vec::new(); segments.len()];
    for (idx, (line, _)) in segments.iter().enumerate() {
        for obj in tree.locate_in_envelope_intersecting(&envelope(line, snap)) {
            let other_idx = obj.data;
            if other_idx <= idx {
                continue;
            }
            let other = &segments[other_idx].0;
            for pt in line.touch_points(other) {
                cuts[idx].push(pt);
                cuts[other_idx].push(pt);
            }
            // Endpoints barely missing a segment still split it
            for pt in [other.pt1(), other.pt2()] {
                if line.contains_pt(pt, snap) {
                    cuts[idx].push(pt);
                }
            }
            for pt in [line.pt1(), line.pt2()] {
                if other.contains_pt(pt, snap) {
                    cuts[other_idx].push(pt);
                }
            }
        }
    }

    let mut snapper = NodeSnapper {
        nodes: Vec::new(),
        index: FindClosest::new(),
        snap,
    };
    // Endpoints first, so they're the canonical position of each node
    for (line, _) in segments {
        snapper.id(line.pt1());
        snapper.id(line.pt2());
    }

    let mut merged: BTreeMap<(usize, usize), BTreeSet<ReachId>> = BTreeMap::new();
    for ((line, reach), cuts) in segments.iter().zip(cuts.into_iter()) {
        let mut stops = vec![(0.0, snapper.id(line.pt1())), (1.0, snapper.id(line.pt2()))];
        for pt in cuts {
            stops.push((line.percent_of_closest(pt), snapper.id(pt)));
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut ids: Vec<usize> = stops.into_iter().map(|(_, id)| id).collect();
        ids.dedup();
        for pair in ids.windows(2) {
            let key = (pair[0].min(pair[1]), pair[0].max(pair[1]));
            let tags = merged.entry(key).or_insert_with(BTreeSet::new);
            if let Some(r) = reach {
                tags.insert(*r);
            }
        }
    }

    let edges = merged
        .into_iter()
        .filter(|((src, dst), _)| src != dst)
        .map(|((src, dst), reaches)| Edge { src, dst, reaches })
        .collect();
    (snapper.nodes, edges)
}

/// Repeatedly removes edges touching a node of degree 1, until there are none.
fn prune_dangles(num_nodes: usize, edges: Vec<Edge>) -> Vec<Edge> {
    let mut degree = vec![0; num_nodes];
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
    for (idx, edge) in edges.iter().enumerate() {
        degree[edge.src] += 1;
        degree[edge.dst] += 1;
        incident[edge.src].push(idx);
        incident[edge.dst].push(idx);
    }

    let mut alive = vec![true; edges.len()];
    let mut queue: Vec<usize> = (0..num_nodes).filter(|n| degree[*n] == 1).collect();
    while let Some(node) = queue.pop() {
        if degree[node] != 1 {
            continue;
        }
        let Some(idx) = incident[node].iter().find(|e| alive[**e]).cloned() else {
            continue;
        };
        alive[idx] = false;
        let edge = &edges[idx];
        let other = if edge.src == node { edge.dst } else { edge.src };
        degree[node] -= 1;
        degree[other] -= 1;
        if degree[other] == 1 {
            queue.push(other);
        }
    }

    let pruned = alive.iter().filter(|a| !**a).count();
    if pruned > 0 {
        debug!("Pruned {} dangling edges", pruned);
    }
    edges
        .into_iter()
        .zip(alive)
        .filter_map(|(edge, alive)| if alive { Some(edge) } else { None })
        .collect()
}
