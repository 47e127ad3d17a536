//! C4: the robust SE(3) solver (spec.md §4.4).
//!
//! Rotation and translation are decoupled: rotation is estimated from
//! translation-invariant measurements (TIMS, pairwise differences) so that
//! an unknown translation cannot bias it, then translation is estimated
//! per axis against the now-known rotation.

mod gnc;
mod translation;
mod types;

use nalgebra::{Matrix3xX, Vector3};
use rand::Rng;

use crate::config::RegistrationConfig;

pub use types::{RegistrationSolution, SolverState};

/// Above this many matched points, TIMS pairs are randomly subsampled
/// instead of exhaustively enumerated (`M*(M-1)/2` would otherwise grow
/// unmanageably).
const MAX_TIMS_PAIRS: usize = 20_000;
/// A correspondence/point is reported as an inlier once its weight (rotation)
/// or membership (translation) clears this threshold.
const INLIER_WEIGHT_THRESHOLD: f64 = 0.5;
/// Minimum rotation/translation inlier count for a solution to be reported
/// `valid` (spec.md §4.4 Solution validity): below this, the corresponding
/// estimator is underdetermined and its fit is not trustworthy.
const MIN_INLIERS_FOR_VALIDITY: usize = 3;

/// Owns the solver's lifecycle state (spec.md §4.4 State machine) around the
/// stateless estimation functions.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    state: SolverState,
    last: Option<RegistrationSolution>,
}

impl Solver {
    /// Creates a solver in the `Reset` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The solver's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Returns to `Reset`, discarding any fitted solution.
    pub fn reset(&mut self) {
        self.state = SolverState::Reset;
        self.last = None;
    }

    /// Estimates `SE(3)` from `M` matched, double-precision point pairs
    /// (spec.md §4.4 Solver contract): `s_m.column(k)` should map onto
    /// `t_m.column(k)` under the true transform.
    ///
    /// Returns [`RegistrationSolution::invalid`] without running any solver
    /// math when `M < 2`, per spec.md §4.4 edge case: two points constrain
    /// translation but not rotation, and TIMS needs at least one pair.
    pub fn solve(
        &mut self,
        s_m: &Matrix3xX<f64>,
        t_m: &Matrix3xX<f64>,
        cfg: &RegistrationConfig,
        rng: &mut impl Rng,
    ) -> RegistrationSolution {
        self.state = SolverState::Fitted;
        let solution = solve_se3(s_m, t_m, cfg, rng);
        self.last = Some(solution.clone());
        solution
    }

    /// The most recently computed solution, if any.
    #[must_use]
    pub fn last(&self) -> Option<&RegistrationSolution> {
        self.last.as_ref()
    }
}

/// The stateless estimation entry point, usable without a [`Solver`].
#[must_use]
pub fn solve_se3(
    s_m: &Matrix3xX<f64>,
    t_m: &Matrix3xX<f64>,
    cfg: &RegistrationConfig,
    rng: &mut impl Rng,
) -> RegistrationSolution {
    let m = s_m.ncols();
    assert_eq!(m, t_m.ncols());
    if m < 2 {
        log::debug!("C4: {m} matched points, need >= 2; returning invalid solution");
        return RegistrationSolution::invalid();
    }

    let (pairs, a, b) = build_tims(s_m, t_m, rng);
    if pairs.is_empty() {
        log::debug!("C4: no TIMS pairs could be built from {m} matched points");
        return RegistrationSolution::invalid();
    }

    if is_rotation_unobservable(&a) {
        log::debug!("C4: matched points are coplanar (or collinear); rotation is not fully observable");
        return RegistrationSolution::invalid();
    }

    let rot_fit = if cfg.use_quatro {
        gnc::solve_quatro(&a, &b, cfg.solver_noise_bound)
    } else {
        gnc::solve_gnc_tls(&a, &b, cfg.solver_noise_bound)
    };

    let rot_inliers = point_inliers_from_pair_weights(m, &pairs, &rot_fit.weights);

    let s_rotated = Matrix3xX::from_columns(
        &(0..m)
            .map(|k| rot_fit.rotation * s_m.column(k))
            .collect::<Vec<_>>(),
    );
    let trans_fit = translation::solve_translation(&s_rotated, t_m, cfg.solver_noise_bound);

    log::debug!(
        "C4: {} matched points, {} TIMS pairs -> {} rotation inliers, {} translation inliers",
        m,
        pairs.len(),
        rot_inliers.len(),
        trans_fit.inliers.len()
    );

    // A solution is only usable once both estimators have a real consensus
    // behind them: below 3 inliers neither rotation nor translation is
    // actually constrained, so GNC/TLS can return an arbitrary fit.
    if rot_inliers.len() < MIN_INLIERS_FOR_VALIDITY || trans_fit.inliers.len() < MIN_INLIERS_FOR_VALIDITY {
        log::debug!(
            "C4: {} rotation inliers, {} translation inliers below minimum {}; returning invalid solution",
            rot_inliers.len(),
            trans_fit.inliers.len(),
            MIN_INLIERS_FOR_VALIDITY
        );
        return RegistrationSolution::invalid();
    }

    RegistrationSolution {
        rotation: rot_fit.rotation,
        translation: trans_fit.translation,
        valid: true,
        scale: 1.0,
        rot_inliers,
        trans_inliers: trans_fit.inliers,
    }
}

/// Builds TIMS (spec.md §4.4: `a_k = S_m[:,j] - S_m[:,i]`, `b_k = T_m[:,j] -
/// T_m[:,i]`) over all `M*(M-1)/2` pairs, or a uniform random sample of them
/// once that count exceeds [`MAX_TIMS_PAIRS`].
fn build_tims(
    s_m: &Matrix3xX<f64>,
    t_m: &Matrix3xX<f64>,
    rng: &mut impl Rng,
) -> (Vec<(usize, usize)>, Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
    let m = s_m.ncols();
    let total_pairs = m * (m.saturating_sub(1)) / 2;

    let index_pairs: Vec<(usize, usize)> = if total_pairs <= MAX_TIMS_PAIRS {
        (0..m).flat_map(|i| ((i + 1)..m).map(move |j| (i, j))).collect()
    } else {
        log::debug!(
            "C4: {total_pairs} candidate TIMS pairs exceeds cap ({MAX_TIMS_PAIRS}); subsampling"
        );
        (0..MAX_TIMS_PAIRS)
            .map(|_| {
                let i = rng.gen_range(0..m);
                let mut j = rng.gen_range(0..m);
                while j == i {
                    j = rng.gen_range(0..m);
                }
                (i.min(j), i.max(j))
            })
            .collect()
    };

    let a: Vec<Vector3<f64>> = index_pairs
        .iter()
        .map(|&(i, j)| s_m.column(j) - s_m.column(i))
        .collect();
    let b: Vec<Vector3<f64>> = index_pairs
        .iter()
        .map(|&(i, j)| t_m.column(j) - t_m.column(i))
        .collect();

    (index_pairs, a, b)
}

/// Rotation about at least one axis is unobservable when every TIMS vector
/// lies in a common plane (matched points are coplanar) or line (collinear):
/// the span of `a` then has rank < 3. Detected via the smallest singular
/// value of `a` relative to the largest (spec.md §8 end-to-end scenario 3:
/// planar degenerate input must report `valid = false`).
fn is_rotation_unobservable(a: &[Vector3<f64>]) -> bool {
    const RANK_DEFICIENCY_RATIO: f64 = 1e-9;
    let matrix = nalgebra::Matrix3xX::from_columns(a);
    let singular_values = matrix.svd(false, false).singular_values;
    let sigma_max = singular_values.iter().copied().fold(0.0_f64, f64::max);
    if sigma_max <= 0.0 {
        return true;
    }
    let sigma_min = singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    sigma_min <= RANK_DEFICIENCY_RATIO * sigma_max
}

/// Projects pairwise GNC weights back onto point indices: a point is a
/// rotation inlier if its average weight across every TIMS pair touching it
/// clears [`INLIER_WEIGHT_THRESHOLD`].
fn point_inliers_from_pair_weights(m: usize, pairs: &[(usize, usize)], weights: &[f64]) -> Vec<usize> {
    let mut sum = vec![0.0_f64; m];
    let mut count = vec![0usize; m];
    for (&(i, j), &w) in pairs.iter().zip(weights.iter()) {
        sum[i] += w;
        count[i] += 1;
        sum[j] += w;
        count[j] += 1;
    }
    (0..m)
        .filter(|&k| count[k] > 0 && sum[k] / (count[k] as f64) >= INLIER_WEIGHT_THRESHOLD)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn too_few_points_is_invalid() {
        let cfg = RegistrationConfig::new(0.1).unwrap();
        let mut rng = crate::rng::from_seed(0);
        let s = Matrix3xX::<f64>::zeros(1);
        let t = Matrix3xX::<f64>::zeros(1);
        let sol = solve_se3(&s, &t, &cfg, &mut rng);
        assert!(!sol.valid);
        assert_eq!(sol.rotation, nalgebra::Matrix3::identity());
    }

    #[test]
    fn recovers_rigid_transform_with_no_outliers() {
        let cfg = RegistrationConfig::new(0.05).unwrap();
        let mut rng = crate::rng::from_seed(7);

        let axis = nalgebra::Unit::new_normalize(Vector3::new(0.1, 1.0, 0.2));
        let r_true = UnitQuaternion::from_axis_angle(&axis, 0.4).to_rotation_matrix();
        let t_true = Translation3::new(1.0, -0.5, 2.0);

        let pts: Vec<Vector3<f64>> = (0..10)
            .map(|k| Vector3::new(k as f64, (k as f64 * 1.7).sin(), (k as f64 * 0.4).cos()))
            .collect();
        let s = Matrix3xX::from_columns(&pts);
        let t_cols: Vec<Vector3<f64>> = pts.iter().map(|p| r_true * p + t_true.vector).collect();
        let t = Matrix3xX::from_columns(&t_cols);

        let sol = solve_se3(&s, &t, &cfg, &mut rng);
        assert!(sol.valid);
        assert!(sol.rotation_is_valid(1e-6));
        assert!((sol.rotation - r_true.matrix()).norm() < 1e-5);
        assert!((sol.translation - t_true.vector).norm() < 1e-4);
    }
}
