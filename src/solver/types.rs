//! Solver output type and state machine (spec.md §3 RegistrationSolution,
//! §4.4 State machine).

use nalgebra::{Matrix3, Vector3};

/// A rigid transform estimate, always either a valid `SE(3)` element or the
/// well-defined invalid identity (spec.md §3 RegistrationSolution
/// invariants).
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSolution {
    /// Estimated rotation. Orthogonal with `det = +1` when `valid`;
    /// identity otherwise.
    pub rotation: Matrix3<f64>,
    /// Estimated translation. Zero when not `valid`.
    pub translation: Vector3<f64>,
    /// Whether a usable transform was found.
    pub valid: bool,
    /// Always `1.0`; this solver does not estimate scale (spec.md §3).
    pub scale: f64,
    /// Indices (into the pruned correspondence slice passed to the solver)
    /// of correspondences whose final GNC weight is `>= w_thr`.
    pub rot_inliers: Vec<usize>,
    /// Indices of correspondences whose translation residual fell in the
    /// largest per-axis consensus set, for every axis.
    pub trans_inliers: Vec<usize>,
}

impl RegistrationSolution {
    /// The canonical invalid solution: identity rotation, zero translation,
    /// `valid = false` (spec.md §3, §7: every recoverable failure surfaces
    /// as this value).
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            valid: false,
            scale: 1.0,
            rot_inliers: Vec::new(),
            trans_inliers: Vec::new(),
        }
    }

    /// Checks the rotation-validity invariant of spec.md §8 property 7:
    /// `||R^T R - I||_inf <= tol` and `det(R) > 0`.
    #[must_use]
    pub fn rotation_is_valid(&self, tol: f64) -> bool {
        let should_be_identity = self.rotation.transpose() * self.rotation;
        let max_dev = (should_be_identity - Matrix3::identity())
            .iter()
            .fold(0.0_f64, |acc, &x| acc.max(x.abs()));
        max_dev <= tol && self.rotation.determinant() > 0.0
    }
}

/// The solver's lifecycle (spec.md §4.4 State machine): `Reset -> Fitted`,
/// with a second `solve` call simply overwriting the fitted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverState {
    /// No solution has been computed yet, or [`crate::solver::Solver::reset`]
    /// was called.
    #[default]
    Reset,
    /// A solution (possibly invalid) has been computed.
    Fitted,
}
