//! Thiessen (Voronoi) cells of the densified centerline vertices.
//!
//! Each cell starts as the whole extent rectangle and gets clipped by the perpendicular bisector
//! between its generator and every neighbor close enough to matter. Neighbors come from an
//! R-tree in order of distance, so the loop stops as soon as the next neighbor is more than twice
//! as far away as the farthest corner of the cell so far; no bisector beyond that can cut it.

use geom::{Bounds, Distance, FindClosest, Polygon, Pt2D, Ring};

use crate::PartitionError;

/// One piece of a Thiessen cell after clipping to the input polygon.
#[derive(Clone, Debug)]
pub struct ThiessenCell {
    /// None when there were no generators and the cell is the whole extent
    pub generator: Option<Pt2D>,
    pub polygon: Polygon,
}

/// The extent rectangle used for clipping cells, padded a bit beyond the polygon's bounds.
pub fn clip_extent(polygon: &Polygon) -> Bounds {
    let bounds = polygon.get_bounds();
    let margin = 0.01 * bounds.width().max(bounds.height()) + 1.0;
    bounds.expanded(Distance::meters(margin))
}

/// Convex Voronoi cells of the generators, clipped to the extent. Returned in the same order as
/// the generators, as open point lists in counter-clockwise order. Generators must be distinct.
pub fn voronoi_cells(generators: &[Pt2D], extent: &Bounds) -> Vec<Vec<Pt2D>> {
    let closest = FindClosest::bulk_load(generators.iter().cloned().enumerate().collect());

    let mut cells = Vec::new();
    for (idx, generator) in generators.iter().enumerate() {
        let mut cell = extent.get_corners();
        for (other_idx, other) in closest.nearest_iter(*generator) {
            if other_idx == idx {
                continue;
            }
            let reach = cell
                .iter()
                .map(|pt| generator.dist_to(*pt))
                .max()
                .unwrap_or(Distance::ZERO);
            if generator.dist_to(other) > reach * 2.0 {
                break;
            }
            cell = clip_to_half_plane(cell, *generator, other);
            if cell.len() < 3 {
                break;
            }
        }
        cells.push(cell);
    }
    cells
}

/// Keeps the part of a convex polygon closer to `keep` than to `other`.
fn clip_to_half_plane(cell: Vec<Pt2D>, keep: Pt2D, other: Pt2D) -> Vec<Pt2D> {
    let mid_x = (keep.x() + other.x()) / 2.0;
    let mid_y = (keep.y() + other.y()) / 2.0;
    let dx = other.x() - keep.x();
    let dy = other.y() - keep.y();
    // Positive on the far side of the bisector
    let side = |pt: Pt2D| (pt.x() - mid_x) * dx + (pt.y() - mid_y) * dy;

    let mut result = Vec::new();
    for idx in 0..cell.len() {
        let a = cell[idx];
        let b = cell[(idx + 1) % cell.len()];
        let (fa, fb) = (side(a), side(b));
        if fa <= 0.0 {
            result.push(a);
        }
        if (fa < 0.0 && fb > 0.0) || (fa > 0.0 && fb < 0.0) {
            let t = fa / (fa - fb);
            result.push(Pt2D::new(
                a.x() + t * (b.x() - a.x()),
                a.y() + t * (b.y() - a.y()),
            ));
        }
    }
    result.dedup();
    if result.len() > 1 && result[0] == result[result.len() - 1] {
        result.pop();
    }
    result
}

/// Thiessen cells of the generators, clipped to the extent and then to the polygon. A cell the
/// polygon splits into several parts yields one `ThiessenCell` per part. With no generators, the
/// polygon itself is the only cell.
pub fn thiessen_cells(
    generators: &[Pt2D],
    polygon: &Polygon,
) -> Result<Vec<ThiessenCell>, PartitionError> {
    let extent = clip_extent(polygon);
    if generators.is_empty() {
        let rect = extent
            .get_rectangle()
            .map_err(|err| PartitionError::Topology(format!("empty extent: {}", err)))?;
        return Ok(polygon
            .intersection(&rect)
            .into_iter()
            .map(|polygon| ThiessenCell {
                generator: None,
                polygon,
            })
            .collect());
    }

    let mut results = Vec::new();
    for (generator, mut pts) in generators
        .iter()
        .zip(voronoi_cells(generators, &extent).into_iter())
    {
        if pts.len() < 3 {
            continue;
        }
        pts.push(pts[0]);
        // Slivers of cells can collapse to nothing
        let cell = match Ring::deduping_new(pts) {
            Ok(ring) => ring.into_polygon(),
            Err(_) => continue,
        };
        for part in cell.intersection(polygon) {
            results.push(ThiessenCell {
                generator: Some(*generator),
                polygon: part,
            });
        }
    }
    if results.is_empty() {
        return Err(PartitionError::Topology(
            "no Thiessen cell overlaps the polygon".to_string(),
        ));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use super::*;

    fn area(pts: &[Pt2D]) -> f64 {
        let mut closed = pts.to_vec();
        closed.push(pts[0]);
        Ring::must_new(closed).signed_area()
    }

    #[test]
    fn cells_partition_the_extent() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let extent = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 200.0,
            max_y: 100.0,
        };
        let mut generators = Vec::new();
        for _ in 0..60 {
            generators.push(Pt2D::new(
                rng.gen_range(1.0..199.0),
                rng.gen_range(1.0..99.0),
            ));
        }
        let cells = voronoi_cells(&generators, &extent);
        assert_eq!(cells.len(), generators.len());

        let total: f64 = cells.iter().map(|c| area(c)).sum();
        assert!((total - 20_000.0).abs() < 1e-6);

        // Every cell contains its own generator and is closest to it
        let sample = cells[0][0];
        let owner = generators
            .iter()
            .map(|g| g.dist_to(sample))
            .min()
            .unwrap();
        assert!((generators[0].dist_to(sample) - owner).abs() < Distance::meters(1e-6));
        for (g, cell) in generators.iter().zip(cells.iter()) {
            let mut closed = cell.clone();
            closed.push(cell[0]);
            let poly = Ring::must_new(closed).into_polygon();
            assert!(poly.contains_pt(*g));
        }
    }

    #[test]
    fn collinear_generators_make_strips() {
        let extent = Bounds {
            min_x: -10.0,
            min_y: -10.0,
            max_x: 40.0,
            max_y: 10.0,
        };
        let generators = vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(20.0, 0.0),
            Pt2D::new(30.0, 0.0),
        ];
        let cells = voronoi_cells(&generators, &extent);
        // Interior strips are 10 wide and 20 tall
        assert!((area(&cells[1]) - 200.0).abs() < 1e-9);
        assert!((area(&cells[2]) - 200.0).abs() < 1e-9);
        assert!((area(&cells[0]) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn no_generators_means_one_cell() {
        let polygon =
            Polygon::rectangle_two_corners(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 5.0)).unwrap();
        let cells = thiessen_cells(&[], &polygon).unwrap();
        assert_eq!(cells.len(), 1);
        assert!(cells[0].generator.is_none());
        assert!((cells[0].polygon.area() - 50.0).abs() < 1e-9);
    }
}
