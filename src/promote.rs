//! Float/double promotion at the match/solve boundary (spec.md §9 design
//! notes: "the float/double split at the match/solve boundary is
//! load-bearing for numerical stability; preserve the promotion step").

use nalgebra::Matrix3xX;

use crate::point::{Point3d, Point3f};

/// Promotes a sequence of single-precision matched points to double
/// precision and packs them as a `3xM` matrix, the layout the solver (C4)
/// expects for its TIMS construction.
#[must_use]
pub fn to_matrix(points: &[Point3f]) -> Matrix3xX<f64> {
    Matrix3xX::from_columns(
        &points
            .iter()
            .map(|p| to_point(*p).coords)
            .collect::<Vec<_>>(),
    )
}

/// Promotes a single point from `f32` to `f64`.
#[must_use]
pub fn to_point(p: Point3f) -> Point3d {
    Point3d::new(f64::from(p.x), f64::from(p.y), f64::from(p.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_columns_in_order() {
        let pts = vec![Point3f::new(1.0, 2.0, 3.0), Point3f::new(-1.0, 0.5, 2.0)];
        let m = to_matrix(&pts);
        assert_eq!(m.ncols(), 2);
        assert!((m[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((m[(1, 1)] - 0.5).abs() < 1e-12);
    }
}
