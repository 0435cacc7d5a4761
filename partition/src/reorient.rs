//! Rotating rings so they start at a confluence.

use geom::{Distance, Pt2D, Ring};

/// Returns new rings, each rotated so that its first vertex matching one of `reference_pts`
/// (within `tolerance`) becomes the start. Rings already starting at a reference point, and rings
/// touching none, are returned unchanged. Winding order is always preserved.
pub fn change_starting_vertex(
    reference_pts: &[Pt2D],
    rings: &[Ring],
    tolerance: Distance,
) -> Vec<Ring> {
    rings
        .iter()
        .map(|ring| reorient_ring(reference_pts, ring, tolerance))
        .collect()
}

pub fn reorient_ring(reference_pts: &[Pt2D], ring: &Ring, tolerance: Distance) -> Ring {
    let matches = |pt: Pt2D| {
        reference_pts
            .iter()
            .any(|reference| reference.approx_eq(pt, tolerance))
    };

    let pts = ring.points();
    // The last point repeats the first
    let num_vertices = pts.len() - 1;
    if matches(pts[0]) {
        return ring.clone();
    }
    match (1..num_vertices).find(|idx| matches(pts[*idx])) {
        Some(idx) => ring.rotated_to(idx),
        None => {
            debug!(
                "No vertex of a {}-vertex ring matches any of {} reference points",
                num_vertices,
                reference_pts.len()
            );
            ring.clone()
        }
    }
}
