//! A generic metric ball-tree, used as the "external" nearest-neighbor index
//! collaborator (spec.md §9 design notes): `build(points)` and
//! `query(point, k) -> (indices, sq_dists)`. Any implementation satisfying
//! [`NeighborIndex`] is admissible; this one is a minimal two-pole ball tree
//! so the crate has no hard dependency on a particular spatial-index
//! library.
//!
//! Construction follows the bipolar-split scheme: pick the point farthest
//! from the node's centroid as one pole, the point farthest from that pole
//! as the other, then partition the remaining points by which pole is
//! closer. Queries prune a subtree using the triangle-inequality bound
//! `|d(query, center) - radius|`.

use rayon::prelude::*;

use crate::utils::SizedHeap;

/// A point type usable with [`BallTree`]: cheap to copy, with a metric.
pub trait Metric: Copy + Send + Sync {
    /// Symmetric, non-negative distance between two points.
    fn distance(&self, other: &Self) -> f64;
}

/// Build/query interface for a nearest-neighbor index over `P`.
pub trait NeighborIndex<P: Metric> {
    /// Builds an index over `points`. The index owns a copy of the points;
    /// returned indices refer to positions in the input slice.
    fn build(points: &[P]) -> Self;

    /// Returns the `k` nearest neighbors of `query`, as `(index, distance)`
    /// pairs sorted by ascending distance.
    fn query(&self, query: &P, k: usize) -> Vec<(usize, f64)>;

    /// Returns every point within `radius` of `query`, as `(index, distance)`
    /// pairs. Order is unspecified.
    fn query_radius(&self, query: &P, radius: f64) -> Vec<(usize, f64)>;
}

/// A leaf-capped ball tree over points of type `P`.
pub struct BallTree<P: Metric> {
    nodes: Vec<Node<P>>,
    root: usize,
}

struct Node<P: Metric> {
    center: P,
    center_idx: usize,
    radius: f64,
    /// `(point, original_index)` pairs, populated only on leaves.
    items: Vec<(P, usize)>,
    children: Option<[usize; 2]>,
}

/// Below this cardinality a node stops splitting and becomes a leaf scanned
/// linearly; matches the reference library's `is_singleton`/leaf-size
/// trade-off between tree depth and per-leaf linear-scan cost.
const LEAF_SIZE: usize = 8;

impl<P: Metric> BallTree<P> {
    fn leaf_from(points: &[(P, usize)]) -> Node<P> {
        let (center, center_idx) = points[0];
        let radius = points
            .iter()
            .map(|(p, _)| center.distance(p))
            .fold(0.0_f64, f64::max);
        Node {
            center,
            center_idx,
            radius,
            items: points.to_vec(),
            children: None,
        }
    }

    fn build_node(nodes: &mut Vec<Node<P>>, points: Vec<(P, usize)>) -> usize {
        if points.len() <= LEAF_SIZE {
            let node = Self::leaf_from(&points);
            nodes.push(node);
            return nodes.len() - 1;
        }

        // Seed pole: farthest point from an arbitrary anchor (the first
        // item); second pole: farthest point from the seed pole.
        let (anchor, _) = points[0];
        let (seed_idx, _) = points
            .iter()
            .enumerate()
            .max_by(|(_, (a, _)), (_, (b, _))| {
                anchor
                    .distance(a)
                    .partial_cmp(&anchor.distance(b))
                    .unwrap_or(core::cmp::Ordering::Equal)
            })
            .unwrap_or((0, &points[0]));
        let (left_pole, left_pole_idx) = points[seed_idx];

        let (right_idx, _) = points
            .iter()
            .enumerate()
            .max_by(|(_, (a, _)), (_, (b, _))| {
                left_pole
                    .distance(a)
                    .partial_cmp(&left_pole.distance(b))
                    .unwrap_or(core::cmp::Ordering::Equal)
            })
            .unwrap_or((0, &points[0]));
        let (right_pole, right_pole_idx) = points[right_idx];

        let mut left_items = Vec::new();
        let mut right_items = Vec::new();
        for &(p, idx) in &points {
            if idx == left_pole_idx {
                continue;
            }
            if idx == right_pole_idx {
                continue;
            }
            let dl = left_pole.distance(&p);
            let dr = right_pole.distance(&p);
            if dl <= dr {
                left_items.push((p, idx));
            } else {
                right_items.push((p, idx));
            }
        }
        left_items.push((left_pole, left_pole_idx));
        right_items.push((right_pole, right_pole_idx));

        let centroid_idx = left_pole_idx;
        let center = left_pole;
        let radius = points
            .iter()
            .map(|(p, _)| center.distance(p))
            .fold(0.0_f64, f64::max);

        let left = Self::build_node(nodes, left_items);
        let right = Self::build_node(nodes, right_items);

        nodes.push(Node {
            center,
            center_idx: centroid_idx,
            radius,
            items: Vec::new(),
            children: Some([left, right]),
        });
        nodes.len() - 1
    }

    fn node(&self, idx: usize) -> &Node<P> {
        &self.nodes[idx]
    }

    fn is_leaf(&self, idx: usize) -> bool {
        self.node(idx).children.is_none()
    }
}

impl<P: Metric> NeighborIndex<P> for BallTree<P> {
    fn build(points: &[P]) -> Self {
        let indexed: Vec<(P, usize)> = points.iter().copied().enumerate().map(|(i, p)| (p, i)).collect();
        if indexed.is_empty() {
            // No points to index; every query short-circuits on
            // `self.nodes.is_empty()`.
            return Self { nodes: Vec::new(), root: 0 };
        }
        let mut nodes = Vec::new();
        let root = Self::build_node(&mut nodes, indexed);
        Self { nodes, root }
    }

    fn query(&self, query: &P, k: usize) -> Vec<(usize, f64)> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut heap = SizedHeap::<usize, f64>::new(Some(k));
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            let d_center = query.distance(&node.center);
            // Lower bound on the distance from `query` to any point in this
            // subtree: if it already exceeds the current k-th best, prune.
            let lower_bound = (d_center - node.radius).max(0.0);
            if heap.is_full() {
                if let Some(&worst) = heap.worst() {
                    if lower_bound > worst {
                        continue;
                    }
                }
            }
            if self.is_leaf(idx) {
                for (p, orig_idx) in &node.items {
                    heap.push((*orig_idx, query.distance(p)));
                }
            } else if let Some([l, r]) = node.children {
                stack.push(l);
                stack.push(r);
            }
        }
        let mut hits: Vec<_> = heap.into_items().collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(core::cmp::Ordering::Equal));
        hits
    }

    fn query_radius(&self, query: &P, radius: f64) -> Vec<(usize, f64)> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            let d_center = query.distance(&node.center);
            if d_center - node.radius > radius {
                continue;
            }
            if self.is_leaf(idx) {
                for (p, orig_idx) in &node.items {
                    let d = query.distance(p);
                    if d <= radius {
                        hits.push((*orig_idx, d));
                    }
                }
            } else if let Some([l, r]) = node.children {
                stack.push(l);
                stack.push(r);
            }
        }
        hits
    }
}

impl Metric for crate::point::Point3f {
    fn distance(&self, other: &Self) -> f64 {
        f64::from(nalgebra::distance(self, other))
    }
}

/// Parallel batch query helper, mirroring the reference library's
/// `par_batch_search`: independent per-query work, concatenated without a
/// shared mutable accumulator.
pub fn par_batch_query<P: Metric, I: NeighborIndex<P> + Sync>(
    index: &I,
    queries: &[P],
    k: usize,
) -> Vec<Vec<(usize, f64)>> {
    queries.par_iter().map(|q| index.query(q, k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct P1(f64);

    impl Metric for P1 {
        fn distance(&self, other: &Self) -> f64 {
            (self.0 - other.0).abs()
        }
    }

    #[test]
    fn knn_matches_linear_scan() {
        let pts: Vec<P1> = (0..200).map(|i| P1(f64::from(i))).collect();
        let tree = BallTree::build(&pts);
        let query = P1(57.3);
        let mut linear: Vec<(usize, f64)> = pts.iter().enumerate().map(|(i, p)| (i, query.distance(p))).collect();
        linear.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let expected: Vec<usize> = linear.iter().take(5).map(|(i, _)| *i).collect();

        let got = tree.query(&query, 5);
        let got_idx: Vec<usize> = got.iter().map(|(i, _)| *i).collect();
        assert_eq!(got_idx, expected);
    }

    #[test]
    fn radius_query_matches_linear_scan() {
        let pts: Vec<P1> = (0..100).map(|i| P1(f64::from(i))).collect();
        let tree = BallTree::build(&pts);
        let query = P1(50.0);
        let mut got: Vec<usize> = tree.query_radius(&query, 3.5).into_iter().map(|(i, _)| i).collect();
        got.sort_unstable();
        assert_eq!(got, vec![47, 48, 49, 50, 51, 52, 53]);
    }
}
