use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::{Distance, Pt2D};

/// A quick way to find the closest point to a query among many keyed points.
pub struct FindClosest<K> {
    rtree: RTree<GeomWithData<[f64; 2], K>>,
}

impl<K> FindClosest<K>
where
    K: Clone,
{
    pub fn new() -> FindClosest<K> {
        FindClosest {
            rtree: RTree::new(),
        }
    }

    pub fn bulk_load(pts: Vec<(K, Pt2D)>) -> FindClosest<K> {
        FindClosest {
            rtree: RTree::bulk_load(
                pts.into_iter()
                    .map(|(key, pt)| GeomWithData::new([pt.x(), pt.y()], key))
                    .collect(),
            ),
        }
    }

    pub fn add(&mut self, key: K, pt: Pt2D) {
        self.rtree.insert(GeomWithData::new([pt.x(), pt.y()], key));
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// Finds the closest point to the query, if any are within `max_dist_away`.
    pub fn closest_pt(&self, query_pt: Pt2D, max_dist_away: Distance) -> Option<(K, Pt2D)> {
        let (key, pt) = self.nearest(query_pt)?;
        if pt.dist_to(query_pt) <= max_dist_away {
            Some((key, pt))
        } else {
            None
        }
    }

    /// Finds the closest point to the query, however far away.
    pub fn nearest(&self, query_pt: Pt2D) -> Option<(K, Pt2D)> {
        self.rtree
            .nearest_neighbor(&[query_pt.x(), query_pt.y()])
            .map(|obj| (obj.data.clone(), to_pt(obj.geom())))
    }

    /// Every point within `radius` of the query, in no particular order.
    pub fn all_within(&self, query_pt: Pt2D, radius: Distance) -> Vec<(K, Pt2D)> {
        let r = radius.inner_meters();
        self.rtree
            .locate_within_distance([query_pt.x(), query_pt.y()], r * r)
            .map(|obj| (obj.data.clone(), to_pt(obj.geom())))
            .collect()
    }

    /// All points, nearest to the query first.
    pub fn nearest_iter(&self, query_pt: Pt2D) -> impl Iterator<Item = (K, Pt2D)> + '_ {
        self.rtree
            .nearest_neighbor_iter(&[query_pt.x(), query_pt.y()])
            .map(|obj| (obj.data.clone(), to_pt(obj.geom())))
    }
}

impl<K: Clone> Default for FindClosest<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_pt(raw: &[f64; 2]) -> Pt2D {
    Pt2D::new(raw[0], raw[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_with_limit() {
        let closest = FindClosest::bulk_load(vec![
            ("a", Pt2D::new(0.0, 0.0)),
            ("b", Pt2D::new(10.0, 0.0)),
            ("c", Pt2D::new(10.0, 10.0)),
        ]);
        assert_eq!(
            closest.nearest(Pt2D::new(8.0, 1.0)),
            Some(("b", Pt2D::new(10.0, 0.0)))
        );
        assert_eq!(
            closest.closest_pt(Pt2D::new(5.0, 5.0), Distance::meters(1.0)),
            None
        );
        let mut near: Vec<&str> = closest
            .all_within(Pt2D::new(10.0, 5.0), Distance::meters(5.0))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        near.sort();
        assert_eq!(near, vec!["b", "c"]);
        let order: Vec<&str> = closest
            .nearest_iter(Pt2D::new(1.0, 0.0))
            .map(|(k, _)| k)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
