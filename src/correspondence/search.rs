//! C2: correspondence search over descriptor space (spec.md §4.2).

use rand::Rng;
use rayon::prelude::*;

use crate::config::{RegistrationConfig, RobinMode};
use crate::descriptor::{Descriptor, KeypointSet};
use crate::spatial::{BallTree, NeighborIndex};

use super::{Correspondence, CorrespondenceSet};

/// Establishes correspondences between `src` and `tgt` keypoints
/// (spec.md §4.2 contract). This is the "optimized" matcher, the canonical
/// path per spec.md §9 Open Questions: mutual nearest neighbor in descriptor
/// space, optionally cross-checked and ratio-tested, then geometric tuple
/// filtering.
///
/// `cfg.robin_mode` controls whether non-mutual tentative matches are kept
/// for C3 to prune (`MaxKCore`/`MaxClique`) or rejected outright (`None`).
#[must_use]
pub fn establish_correspondences(
    src: &KeypointSet,
    tgt: &KeypointSet,
    cfg: &RegistrationConfig,
    rng: &mut impl Rng,
) -> CorrespondenceSet {
    if src.is_empty() || tgt.is_empty() {
        return CorrespondenceSet::default();
    }

    let cross_check = matches!(cfg.robin_mode, RobinMode::None);
    let mut set = mutual_nn(src.descriptors(), tgt.descriptors(), cfg.use_ratio_test, cross_check);

    if cfg.tuple_scale > 0.0 {
        set = tuple_filter(&set, src.points(), tgt.points(), cfg.tuple_scale, rng);
    }

    set.truncate(cfg.num_max_corr);
    log::debug!(
        "C2: {} source keypoints, {} target keypoints -> {} correspondences",
        src.len(),
        tgt.len(),
        set.len()
    );
    set
}

/// The legacy "advanced" matcher (spec.md §9 Open Questions): always
/// cross-checks and always applies the 3-point tuple filter, regardless of
/// `cfg.robin_mode`/`cfg.tuple_scale`. Kept for compatibility with callers
/// that relied on the older, stricter behavior; `establish_correspondences`
/// is the recommended entry point.
#[must_use]
pub fn advanced_correspondences(
    src: &KeypointSet,
    tgt: &KeypointSet,
    cfg: &RegistrationConfig,
    rng: &mut impl Rng,
) -> CorrespondenceSet {
    if src.is_empty() || tgt.is_empty() {
        return CorrespondenceSet::default();
    }
    let mut set = mutual_nn(src.descriptors(), tgt.descriptors(), cfg.use_ratio_test, true);
    let scale = if cfg.tuple_scale > 0.0 { cfg.tuple_scale } else { 0.9 };
    set = tuple_filter(&set, src.points(), tgt.points(), scale, rng);
    set.truncate(cfg.num_max_corr);
    set
}

/// Mutual-nearest-neighbor search in descriptor space (spec.md §4.2
/// Mutual-NN procedure).
///
/// Internally always queries from the larger side into the smaller side's
/// index (spec.md §4.2 Symmetry invariant), then restores `(src_idx,
/// tgt_idx)` orientation before returning.
fn mutual_nn(src: &[Descriptor], tgt: &[Descriptor], use_ratio: bool, cross_check: bool) -> CorrespondenceSet {
    if tgt.len() > src.len() {
        let swapped = mutual_nn_oriented(tgt, src, use_ratio, cross_check);
        return CorrespondenceSet::from_iter_dedup(
            swapped
                .as_slice()
                .iter()
                .map(|c| Correspondence::new(c.tgt, c.src)),
        );
    }
    mutual_nn_oriented(src, tgt, use_ratio, cross_check)
}

/// Queries from `b` into an index over `a`; returns correspondences in
/// `(a_idx, b_idx)` order.
fn mutual_nn_oriented(a: &[Descriptor], b: &[Descriptor], use_ratio: bool, cross_check: bool) -> CorrespondenceSet {
    let index_a = BallTree::build(a);
    let index_b = BallTree::build(b);

    let pairs: Vec<Correspondence> = b
        .par_iter()
        .enumerate()
        .filter_map(|(j, q)| {
            let nn = index_a.query(q, 2);
            let (i_star, d1) = *nn.first()?;
            if use_ratio {
                if let Some(&(_, d2)) = nn.get(1) {
                    if d2 > 0.0 && d1 / d2 >= 0.9 {
                        return None;
                    }
                }
            }
            if cross_check {
                let back = index_b.query(&a[i_star], 1);
                let mutual = back.first().is_some_and(|&(j_prime, _)| j_prime == j);
                if !mutual {
                    return None;
                }
            }
            Some(Correspondence::new(i_star, j))
        })
        .collect();

    CorrespondenceSet::from_iter_dedup(pairs)
}

/// Geometric tuple-consistency filter (spec.md §4.2 Tuple consistency
/// filter): samples random triples and keeps those whose pairwise distance
/// ratios survive on both clouds.
fn tuple_filter(
    set: &CorrespondenceSet,
    src_pts: &[crate::point::Point3f],
    tgt_pts: &[crate::point::Point3f],
    tuple_scale: f64,
    rng: &mut impl Rng,
) -> CorrespondenceSet {
    let corr = set.as_slice();
    let n = corr.len();
    if n < 3 {
        return CorrespondenceSet::default();
    }

    let max_trials = 100 * n;
    let mut kept = vec![false; n];

    for _ in 0..max_trials {
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        let c = rng.gen_range(0..n);
        if a == b || b == c || a == c {
            continue;
        }
        if triple_is_consistent(corr[a], corr[b], corr[c], src_pts, tgt_pts, tuple_scale) {
            kept[a] = true;
            kept[b] = true;
            kept[c] = true;
        }
    }

    CorrespondenceSet::from_iter_dedup(
        corr.iter()
            .zip(kept.iter())
            .filter_map(|(c, &k)| k.then_some(*c)),
    )
}

fn triple_is_consistent(
    a: Correspondence,
    b: Correspondence,
    c: Correspondence,
    src_pts: &[crate::point::Point3f],
    tgt_pts: &[crate::point::Point3f],
    tuple_scale: f64,
) -> bool {
    [(a, b), (b, c), (c, a)].into_iter().all(|(u, v)| {
        let d_src = nalgebra::distance(&src_pts[u.src], &src_pts[v.src]);
        let d_tgt = nalgebra::distance(&tgt_pts[u.tgt], &tgt_pts[v.tgt]);
        let d_src = f64::from(d_src);
        let d_tgt = f64::from(d_tgt);
        if d_src <= f64::EPSILON {
            return d_tgt <= f64::EPSILON;
        }
        tuple_scale * d_src <= d_tgt && d_tgt <= d_src / tuple_scale
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point3f;

    fn descriptor_set(vals: &[f32]) -> Vec<Descriptor> {
        vals.iter()
            .map(|&v| {
                let mut bins = [0.0_f32; crate::descriptor::DESCRIPTOR_BINS];
                bins[0] = v;
                Descriptor(bins)
            })
            .collect()
    }

    #[test]
    fn mutual_nn_is_symmetric_under_swap() {
        let src_desc = descriptor_set(&[0.0, 10.0, 20.0]);
        let tgt_desc = descriptor_set(&[20.1, 0.1, 10.1]);
        let a = mutual_nn(&src_desc, &tgt_desc, false, true);
        let b = mutual_nn(&tgt_desc, &src_desc, false, true);
        let a_as_b: Vec<_> = a.as_slice().iter().map(|c| Correspondence::new(c.tgt, c.src)).collect();
        let b_sorted = CorrespondenceSet::from_iter_dedup(a_as_b);
        assert_eq!(b_sorted, b);
    }

    #[test]
    fn tuple_filter_keeps_consistent_triple() {
        let src_pts = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        // Same shape, translated: ratios are exactly 1.
        let tgt_pts = vec![
            Point3f::new(5.0, 0.0, 0.0),
            Point3f::new(6.0, 0.0, 0.0),
            Point3f::new(5.0, 1.0, 0.0),
        ];
        let set = CorrespondenceSet::new(vec![
            Correspondence::new(0, 0),
            Correspondence::new(1, 1),
            Correspondence::new(2, 2),
        ]);
        let mut rng = crate::rng::from_seed(42);
        let out = tuple_filter(&set, &src_pts, &tgt_pts, 0.9, &mut rng);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_inputs_yield_empty_correspondences() {
        let cfg = RegistrationConfig::new(0.1).unwrap();
        let mut rng = crate::rng::from_seed(1);
        let empty = KeypointSet::default();
        let out = establish_correspondences(&empty, &empty, &cfg, &mut rng);
        assert!(out.is_empty());
    }
}
