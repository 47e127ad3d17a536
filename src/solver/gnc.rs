//! Rotation estimation: GNC-TLS over full `SO(3)`, or the 2-DoF Quatro
//! variant when roll/pitch are ill-observed (spec.md §4.4 Rotation
//! estimator).
//!
//! The graduated non-convexity schedule starts from the convex surrogate
//! (every weight `1.0`, as if `mu` were infinite) and tightens `mu` by a
//! constant ratio each iteration; convergence is judged on the L1 norm of
//! the weight update, not on residual decrease, because truncated
//! least-squares residuals are not monotone (spec.md §9 design notes).

use nalgebra::{Matrix2, Matrix3, Rotation2, Vector2, Vector3};

/// Constant ratio by which `mu` is divided every GNC iteration.
const MU_DIVISOR: f64 = 1.4;
/// Convergence threshold on the L1 norm of consecutive weight vectors.
const WEIGHT_DELTA_TOL: f64 = 1e-6;
/// Hard cap on GNC iterations.
const MAX_ITERS: usize = 100;

/// Result of a GNC-TLS rotation fit.
pub struct RotationFit {
    /// The estimated rotation.
    pub rotation: Matrix3<f64>,
    /// Final GNC weight of every input pair, same length/order as the input
    /// TIMS.
    pub weights: Vec<f64>,
}

/// Full `SO(3)` GNC-TLS rotation estimation (spec.md §4.4 GNC-TLS).
///
/// `a` and `b` are the TIMS (translation-invariant measurements): `b_k`
/// should be explained by `R * a_k` up to noise bounded by `noise_bound`.
#[must_use]
pub fn solve_gnc_tls(a: &[Vector3<f64>], b: &[Vector3<f64>], noise_bound: f64) -> RotationFit {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return RotationFit {
            rotation: Matrix3::identity(),
            weights: Vec::new(),
        };
    }

    let c_sq = noise_bound * noise_bound;
    let mut weights = vec![1.0_f64; a.len()];
    let mut rotation = weighted_procrustes(a, b, &weights);
    let mut residuals = residuals_sq(a, b, &rotation);

    // The convex surrogate corresponds to `mu = infinity`; pick the first
    // finite `mu` so that the very first re-weighting stays close to 1 for
    // every inlier-sized residual, then tighten by `MU_DIVISOR` each round.
    let r_max = residuals.iter().copied().fold(0.0_f64, f64::max);
    let mut mu = if r_max > c_sq { r_max / c_sq } else { 1.0 };

    for _ in 0..MAX_ITERS {
        let new_weights: Vec<f64> = residuals
            .iter()
            .map(|&r| {
                let denom = r + mu * c_sq;
                if denom <= 0.0 {
                    1.0
                } else {
                    (mu * c_sq / denom).powi(2)
                }
            })
            .collect();

        let delta: f64 = new_weights
            .iter()
            .zip(weights.iter())
            .map(|(n, o)| (n - o).abs())
            .sum();

        weights = new_weights;
        rotation = weighted_procrustes(a, b, &weights);
        residuals = residuals_sq(a, b, &rotation);
        mu /= MU_DIVISOR;

        if delta < WEIGHT_DELTA_TOL {
            break;
        }
    }

    RotationFit { rotation, weights }
}

/// The 2-DoF ("Quatro") rotation estimator (spec.md §4.4 Quatro): assumes
/// roll/pitch are zero, zeroes the z-component of every TIMS, and solves
/// the same GNC schedule for yaw alone.
#[must_use]
pub fn solve_quatro(a: &[Vector3<f64>], b: &[Vector3<f64>], noise_bound: f64) -> RotationFit {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return RotationFit {
            rotation: Matrix3::identity(),
            weights: Vec::new(),
        };
    }

    let a2: Vec<Vector2<f64>> = a.iter().map(|v| Vector2::new(v.x, v.y)).collect();
    let b2: Vec<Vector2<f64>> = b.iter().map(|v| Vector2::new(v.x, v.y)).collect();

    let c_sq = noise_bound * noise_bound;
    let mut weights = vec![1.0_f64; a.len()];
    let mut yaw = weighted_yaw(&a2, &b2, &weights);
    let mut residuals = residuals_sq_2d(&a2, &b2, yaw);

    let r_max = residuals.iter().copied().fold(0.0_f64, f64::max);
    let mut mu = if r_max > c_sq { r_max / c_sq } else { 1.0 };

    for _ in 0..MAX_ITERS {
        let new_weights: Vec<f64> = residuals
            .iter()
            .map(|&r| {
                let denom = r + mu * c_sq;
                if denom <= 0.0 {
                    1.0
                } else {
                    (mu * c_sq / denom).powi(2)
                }
            })
            .collect();

        let delta: f64 = new_weights
            .iter()
            .zip(weights.iter())
            .map(|(n, o)| (n - o).abs())
            .sum();

        weights = new_weights;
        yaw = weighted_yaw(&a2, &b2, &weights);
        residuals = residuals_sq_2d(&a2, &b2, yaw);
        mu /= MU_DIVISOR;

        if delta < WEIGHT_DELTA_TOL {
            break;
        }
    }

    let r2 = Rotation2::new(yaw);
    let mut rotation = Matrix3::identity();
    rotation.fixed_view_mut::<2, 2>(0, 0).copy_from(r2.matrix());

    RotationFit { rotation, weights }
}

/// Weighted Procrustes (spec.md §4.4): `H = sum_k w_k a_k b_k^T`, SVD
/// `H = U Sigma V^T`, `R = V U^T`, with the last column of `V` flipped if
/// that would leave `det(R) < 0`.
fn weighted_procrustes(a: &[Vector3<f64>], b: &[Vector3<f64>], weights: &[f64]) -> Matrix3<f64> {
    let mut h = Matrix3::zeros();
    for ((ak, bk), &w) in a.iter().zip(b.iter()).zip(weights.iter()) {
        h += w * ak * bk.transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.unwrap_or_else(Matrix3::identity);
    let mut v_t = svd.v_t.unwrap_or_else(Matrix3::identity);

    let det = (v_t.transpose() * u.transpose()).determinant();
    if det < 0.0 {
        // Flip the sign of the last column of V, i.e. the last row of V^T.
        for j in 0..3 {
            v_t[(2, j)] = -v_t[(2, j)];
        }
    }
    v_t.transpose() * u.transpose()
}

fn residuals_sq(a: &[Vector3<f64>], b: &[Vector3<f64>], r: &Matrix3<f64>) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(ak, bk)| (bk - r * ak).norm_squared()).collect()
}

/// Closed-form weighted least-squares fit of a single rotation angle in 2D:
/// `theta = atan2(sum w (ax*by - ay*bx), sum w (ax*bx + ay*by))`.
fn weighted_yaw(a: &[Vector2<f64>], b: &[Vector2<f64>], weights: &[f64]) -> f64 {
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    for ((ak, bk), &w) in a.iter().zip(b.iter()).zip(weights.iter()) {
        sin_sum += w * (ak.x * bk.y - ak.y * bk.x);
        cos_sum += w * (ak.x * bk.x + ak.y * bk.y);
    }
    sin_sum.atan2(cos_sum)
}

fn residuals_sq_2d(a: &[Vector2<f64>], b: &[Vector2<f64>], yaw: f64) -> Vec<f64> {
    let r = Matrix2::new(yaw.cos(), -yaw.sin(), yaw.sin(), yaw.cos());
    a.iter().zip(b.iter()).map(|(ak, bk)| (bk - r * ak).norm_squared()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    #[test]
    fn recovers_exact_rotation_with_no_outliers() {
        let axis = nalgebra::Unit::new_normalize(Vector3::new(0.2, 0.8, -0.3));
        let r_true = UnitQuaternion::from_axis_angle(&axis, 0.7).to_rotation_matrix();
        let a: Vec<Vector3<f64>> = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(-1.0, 2.0, 0.5),
        ];
        let b: Vec<Vector3<f64>> = a.iter().map(|v| r_true * v).collect();

        let fit = solve_gnc_tls(&a, &b, 1e-3);
        let diff = (fit.rotation - r_true.matrix()).norm();
        assert!(diff < 1e-6, "diff = {diff}");
        assert!(fit.weights.iter().all(|&w| w > 0.9));
    }

    #[test]
    fn quatro_recovers_yaw_only_rotation() {
        let yaw_true = 0.5_f64;
        let r = Rotation2::new(yaw_true);
        let a: Vec<Vector3<f64>> = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(2.0, -1.0, 0.0),
            Vector3::new(-1.5, 0.3, 0.0),
        ];
        let b: Vec<Vector3<f64>> = a
            .iter()
            .map(|v| {
                let xy = r.matrix() * Vector2::new(v.x, v.y);
                Vector3::new(xy.x, xy.y, v.z)
            })
            .collect();

        let fit = solve_quatro(&a, &b, 1e-3);
        let recovered_yaw = fit.rotation[(1, 0)].atan2(fit.rotation[(0, 0)]);
        assert!((recovered_yaw - yaw_true).abs() < 1e-6);
    }

    #[test]
    fn empty_input_returns_identity() {
        let fit = solve_gnc_tls(&[], &[], 1.0);
        assert_eq!(fit.rotation, Matrix3::identity());
        assert!(fit.weights.is_empty());
    }
}
