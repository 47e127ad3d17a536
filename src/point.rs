//! The point and point-cloud types shared by every stage (spec.md §3).
//!
//! Raw and keypoint clouds are kept in single precision, as the extractor
//! (C1) only needs enough precision to estimate normals and histogram bins.
//! [`crate::promote`] lifts the matched coordinate arrays to double precision
//! at the boundary into the solver (C4), where the Procrustes SVD is
//! numerically sensitive.

use nalgebra::Point3;

/// A single-precision 3D point, as produced by C1 and consumed by C2/C3.
pub type Point3f = Point3<f32>;

/// A double-precision 3D point, used only inside the solver (C4).
pub type Point3d = Point3<f64>;

/// An ordered, indexable sequence of points. The index of a point in a
/// `PointCloud` is stable for the lifetime of the cloud: stages never
/// reorder or compact the backing `Vec`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3f>,
}

impl PointCloud {
    /// Wraps an owned vector of points as a cloud.
    #[must_use]
    pub fn new(points: Vec<Point3f>) -> Self {
        Self { points }
    }

    /// The number of points in the cloud.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A read-only view of the backing points.
    #[must_use]
    pub fn points(&self) -> &[Point3f] {
        &self.points
    }

    /// The centroid of the cloud. Returns the origin for an empty cloud.
    #[must_use]
    pub fn centroid(&self) -> Point3f {
        if self.points.is_empty() {
            return Point3f::origin();
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.points.len() as f32;
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Point3f::from(sum / n)
    }
}

impl core::ops::Index<usize> for PointCloud {
    type Output = Point3f;

    fn index(&self, i: usize) -> &Point3f {
        &self.points[i]
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3f;
    type IntoIter = core::slice::Iter<'a, Point3f>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl From<Vec<Point3f>> for PointCloud {
    fn from(points: Vec<Point3f>) -> Self {
        Self::new(points)
    }
}
