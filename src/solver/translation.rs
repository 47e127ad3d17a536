//! Componentwise adaptive-voting TLS translation estimator (spec.md §4.4
//! Translation estimator).
//!
//! Once rotation is fixed, translation decouples per axis: for each of
//! `x`/`y`/`z`, sweep over the candidate intervals `[r_k - c_hat, r_k +
//! c_hat]` induced by every residual `r_k = t_k - R s_k` and report the
//! centroid of the residuals falling under whichever point is covered by
//! the most intervals (the maximum-overlap consensus set).

use nalgebra::{Matrix3xX, Vector3};

/// Result of the three independent per-axis TLS translation fits.
pub struct TranslationFit {
    /// The estimated translation.
    pub translation: Vector3<f64>,
    /// Indices (into the matched-point columns) whose residual fell inside
    /// the winning consensus interval on *every* axis.
    pub inliers: Vec<usize>,
}

/// `s` and `t` are `3xM` matrices of rotated-source and target points
/// respectively (i.e. `t.column(k) - r * s.column(k)` is the per-point
/// translation residual); `noise_bound` is `c_hat`.
#[must_use]
pub fn solve_translation(s_rotated: &Matrix3xX<f64>, t: &Matrix3xX<f64>, noise_bound: f64) -> TranslationFit {
    let m = s_rotated.ncols();
    if m == 0 {
        return TranslationFit {
            translation: Vector3::zeros(),
            inliers: Vec::new(),
        };
    }

    let residuals: Vec<Vector3<f64>> = (0..m).map(|k| t.column(k) - s_rotated.column(k)).collect();

    let mut translation = Vector3::zeros();
    let mut axis_inliers: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for axis in 0..3 {
        let values: Vec<f64> = residuals.iter().map(|r| r[axis]).collect();
        let (estimate, inliers) = max_overlap_consensus(&values, noise_bound);
        translation[axis] = estimate;
        axis_inliers[axis] = inliers;
    }

    let inliers: Vec<usize> = (0..m)
        .filter(|k| axis_inliers.iter().all(|set| set.binary_search(k).is_ok()))
        .collect();

    TranslationFit { translation, inliers }
}

/// Interval-stabbing sweep: among the intervals `[v_k - c, v_k + c]`, finds a
/// point covered by the most intervals and returns the mean of the
/// contributing `v_k` together with their (sorted) indices.
fn max_overlap_consensus(values: &[f64], c: f64) -> (f64, Vec<usize>) {
    #[derive(Clone, Copy)]
    enum Kind {
        Start,
        End,
    }
    let mut events: Vec<(f64, Kind, usize)> = Vec::with_capacity(values.len() * 2);
    for (k, &v) in values.iter().enumerate() {
        events.push((v - c, Kind::Start, k));
        events.push((v + c, Kind::End, k));
    }
    // Process all starts at a given coordinate before ends at the same
    // coordinate, so a zero-width overlap still counts both endpoints.
    events.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(core::cmp::Ordering::Equal)
            .then_with(|| match (a.1, b.1) {
                (Kind::Start, Kind::End) => core::cmp::Ordering::Less,
                (Kind::End, Kind::Start) => core::cmp::Ordering::Greater,
                _ => core::cmp::Ordering::Equal,
            })
    });

    let mut active: Vec<usize> = Vec::new();
    let mut best: Vec<usize> = Vec::new();
    for (_, kind, k) in events {
        match kind {
            Kind::Start => {
                active.push(k);
                if active.len() > best.len() {
                    best = active.clone();
                }
            }
            Kind::End => {
                if let Some(pos) = active.iter().position(|&x| x == k) {
                    active.remove(pos);
                }
            }
        }
    }

    if best.is_empty() {
        return (0.0, Vec::new());
    }
    best.sort_unstable();
    #[allow(clippy::cast_precision_loss)]
    let mean = best.iter().map(|&k| values[k]).sum::<f64>() / (best.len() as f64);
    (mean, best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_translation_with_outliers() {
        let true_t = Vector3::new(1.5, -2.0, 0.25);
        let mut s = Matrix3xX::<f64>::zeros(20);
        let mut t = Matrix3xX::<f64>::zeros(20);
        for k in 0..20 {
            #[allow(clippy::cast_precision_loss)]
            let v = Vector3::new(k as f64, (k as f64) * 0.3, -(k as f64) * 0.1);
            s.set_column(k, &v);
            t.set_column(k, &(v + true_t));
        }
        // Corrupt a minority with large translation offsets.
        t.set_column(0, &(s.column(0) + Vector3::new(50.0, 0.0, 0.0)));
        t.set_column(19, &(s.column(19) + Vector3::new(0.0, -80.0, 0.0)));

        let fit = solve_translation(&s, &t, 1e-2);
        assert!((fit.translation - true_t).norm() < 1e-6, "{:?}", fit.translation);
        assert!(!fit.inliers.contains(&0));
        assert!(!fit.inliers.contains(&19));
        assert!(fit.inliers.len() >= 17);
    }

    #[test]
    fn empty_input_yields_zero_translation() {
        let s = Matrix3xX::<f64>::zeros(0);
        let t = Matrix3xX::<f64>::zeros(0);
        let fit = solve_translation(&s, &t, 1.0);
        assert_eq!(fit.translation, Vector3::zeros());
        assert!(fit.inliers.is_empty());
    }
}
