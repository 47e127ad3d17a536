//! C3: the ROBIN graph-theoretic outlier pruner (spec.md §4.3).

use rayon::prelude::*;

use crate::config::RobinMode;
use crate::correspondence::{Correspondence, CorrespondenceSet};
use crate::point::Point3f;

/// An undirected, self-loop-free compatibility graph over correspondences
/// (spec.md §3 Compatibility graph). Vertices are indices into the
/// correspondence slice it was built from.
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    /// `adjacency[v]` is the sorted, deduplicated list of neighbors of `v`.
    adjacency: Vec<Vec<usize>>,
}

impl CompatibilityGraph {
    /// Builds the graph from `corr` and the two promoted keypoint clouds:
    /// an edge `(a, b)` exists iff `||S[a.i]-S[b.i]| - |T[a.j]-T[b.j]|| <= 2*eps`
    /// and the pair is one-to-one at the node level (spec.md §4.3 Graph
    /// construction).
    #[must_use]
    pub fn build(corr: &[Correspondence], src_pts: &[Point3f], tgt_pts: &[Point3f], eps: f64) -> Self {
        let n = corr.len();
        let edges: Vec<(usize, usize)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|a| {
                ((a + 1)..n).filter_map(move |b| {
                    let ca = corr[a];
                    let cb = corr[b];
                    if ca.src == cb.src || ca.tgt == cb.tgt {
                        return None;
                    }
                    let d_src = f64::from(nalgebra::distance(&src_pts[ca.src], &src_pts[cb.src]));
                    let d_tgt = f64::from(nalgebra::distance(&tgt_pts[ca.tgt], &tgt_pts[cb.tgt]));
                    if (d_src - d_tgt).abs() <= 2.0 * eps {
                        Some((a, b))
                    } else {
                        None
                    }
                })
            })
            .collect();

        let mut adjacency = vec![Vec::new(); n];
        for (a, b) in edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }
        Self { adjacency }
    }

    /// The number of vertices (== number of input correspondences).
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// The number of undirected edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// The neighbors of vertex `v`.
    #[must_use]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.adjacency[v]
    }

    fn degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }
}

/// Runs the pruning operator selected by `mode` over `graph`, returning the
/// surviving vertex indices in ascending order (spec.md §4.3 Pruning
/// operators / Output: "the correspondence set induced by the surviving
/// vertices, preserving input order").
#[must_use]
pub fn prune(graph: &CompatibilityGraph, mode: RobinMode, max_clique_vertices: usize) -> Vec<usize> {
    match mode {
        RobinMode::None => (0..graph.num_vertices()).collect(),
        RobinMode::MaxKCore => max_k_core(graph),
        RobinMode::MaxClique => {
            if graph.num_vertices() <= max_clique_vertices {
                max_clique(graph)
            } else {
                log::debug!(
                    "C3: {} vertices exceeds max_clique_vertices ({}); falling back to max-k-core",
                    graph.num_vertices(),
                    max_clique_vertices
                );
                max_k_core(graph)
            }
        }
    }
}

/// Applies `prune` to `corr`/`graph` and returns the induced, order-preserved
/// correspondence set (spec.md §4.3 contract: `prune(corr, S, T, eps) ->
/// corr_pruned`).
#[must_use]
pub fn prune_correspondences(
    corr: &CorrespondenceSet,
    src_pts: &[Point3f],
    tgt_pts: &[Point3f],
    eps: f64,
    mode: RobinMode,
    max_clique_vertices: usize,
) -> CorrespondenceSet {
    let items = corr.as_slice();
    let graph = CompatibilityGraph::build(items, src_pts, tgt_pts, eps);
    let survivors = prune(&graph, mode, max_clique_vertices);
    log::debug!(
        "C3: {} vertices, {} edges -> {} survivors ({:?})",
        graph.num_vertices(),
        graph.num_edges(),
        survivors.len(),
        mode
    );
    CorrespondenceSet::from_iter_dedup(survivors.into_iter().map(|v| items[v]))
}

/// Iteratively removes vertices of degree below the largest `k` for which a
/// non-empty k-core exists (spec.md §4.3 max-k-core): a standard linear-time
/// peeling algorithm, not a search for the exact max clique.
fn max_k_core(graph: &CompatibilityGraph) -> Vec<usize> {
    let n = graph.num_vertices();
    if n == 0 {
        return Vec::new();
    }

    let mut degree: Vec<usize> = (0..n).map(|v| graph.degree(v)).collect();
    let mut alive = vec![true; n];
    let mut core_number = vec![0usize; n];

    // Batagelj-Zaversnik k-core peeling: repeatedly strip the minimum-degree
    // vertex. Its core number is the running maximum of removal degrees seen
    // so far, not its own removal degree: once a vertex has been stripped
    // down to degree `d` inside a surviving `(d+1)`-core, peeling it at a
    // *lower* degree later (after its neighbors are also gone) must not
    // demote it below the core it actually belonged to. The max non-empty
    // k-core is then the set of vertices whose core number equals the
    // maximum core number observed.
    let mut k = 0usize;
    let mut remaining: usize = n;
    while remaining > 0 {
        let Some(v) = (0..n).filter(|&v| alive[v]).min_by_key(|&v| degree[v]) else {
            break;
        };
        k = k.max(degree[v]);
        core_number[v] = k;
        alive[v] = false;
        remaining -= 1;
        for &u in graph.neighbors(v) {
            if alive[u] && degree[u] > 0 {
                degree[u] -= 1;
            }
        }
    }

    let k_max = core_number.iter().copied().max().unwrap_or(0);
    if k_max == 0 {
        return Vec::new();
    }
    (0..n).filter(|&v| core_number[v] >= k_max).collect()
}

/// Exact branch-and-bound maximum clique (spec.md §4.3 max-clique): used
/// only when `|V|` is below `max_clique_vertices`.
fn max_clique(graph: &CompatibilityGraph) -> Vec<usize> {
    let n = graph.num_vertices();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&v| core::cmp::Reverse(graph.degree(v)));

    let mut best: Vec<usize> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let candidates: Vec<usize> = order;

    branch_and_bound(graph, &candidates, &mut current, &mut best);
    best.sort_unstable();
    best
}

fn branch_and_bound(graph: &CompatibilityGraph, candidates: &[usize], current: &mut Vec<usize>, best: &mut Vec<usize>) {
    if current.len() + candidates.len() <= best.len() {
        // Even taking every remaining candidate cannot beat the incumbent.
        return;
    }
    if candidates.is_empty() {
        if current.len() > best.len() {
            *best = current.clone();
        }
        return;
    }

    for (i, &v) in candidates.iter().enumerate() {
        if current.len() + (candidates.len() - i) <= best.len() {
            break;
        }
        current.push(v);
        let next_candidates: Vec<usize> = candidates[(i + 1)..]
            .iter()
            .copied()
            .filter(|&u| graph.adjacency[v].binary_search(&u).is_ok())
            .collect();
        branch_and_bound(graph, &next_candidates, current, best);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point3f> {
        (0..n).map(|i| Point3f::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn identity_correspondences_form_a_clique() {
        let pts = line(6);
        let corr: Vec<Correspondence> = (0..6).map(|i| Correspondence::new(i, i)).collect();
        let graph = CompatibilityGraph::build(&corr, &pts, &pts, 1e-6);
        // Every pair of identity correspondences is exactly length-preserving.
        assert_eq!(graph.num_edges(), 6 * 5 / 2);
        let kept = max_k_core(&graph);
        assert_eq!(kept.len(), 6);
    }

    #[test]
    fn outliers_are_pruned_by_k_core() {
        let src_pts = line(12);
        let mut tgt_pts = line(12);
        // Perturb two target points so every correspondence touching them
        // violates length preservation against the other ten.
        tgt_pts[10] = Point3f::new(1000.0, 7.0, -3.0);
        tgt_pts[11] = Point3f::new(-500.0, 2.0, 9.0);
        let corr: Vec<Correspondence> = (0..12).map(|i| Correspondence::new(i, i)).collect();

        let graph = CompatibilityGraph::build(&corr, &src_pts, &tgt_pts, 1e-6);
        let kept = max_k_core(&graph);
        assert!(kept.len() <= 10);
        assert!(!kept.contains(&10));
        assert!(!kept.contains(&11));
    }

    #[test]
    fn max_clique_matches_k_core_on_a_clean_clique() {
        let pts = line(8);
        let corr: Vec<Correspondence> = (0..8).map(|i| Correspondence::new(i, i)).collect();
        let graph = CompatibilityGraph::build(&corr, &pts, &pts, 1e-6);
        let clique = max_clique(&graph);
        assert_eq!(clique.len(), 8);
    }

    #[test]
    fn empty_graph_prunes_to_empty() {
        let graph = CompatibilityGraph::build(&[], &[], &[], 1e-6);
        assert!(max_k_core(&graph).is_empty());
        assert!(max_clique(&graph).is_empty());
    }
}
