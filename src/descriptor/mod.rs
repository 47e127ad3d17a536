//! Per-point local geometric descriptors (spec.md §3, §4.1).

pub mod extractor;

/// Number of bins in a descriptor: three 11-bin angle histograms
/// concatenated (spec.md §4.1 step 4).
pub const DESCRIPTOR_BINS: usize = 33;

/// A fixed-length, L1-normalized (to 100) descriptor of a point's local
/// geometry. Treated as opaque by C2/C3: only Euclidean distance between
/// descriptors matters downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descriptor(pub [f32; DESCRIPTOR_BINS]);

impl Descriptor {
    /// A descriptor with every bin at zero.
    #[must_use]
    pub fn zero() -> Self {
        Self([0.0; DESCRIPTOR_BINS])
    }

    /// L1-normalizes the descriptor in place so its bins sum to `100`, the
    /// convention used by FPFH-family descriptors in point-cloud
    /// registration.
    pub fn l1_normalize(&mut self) {
        let sum: f32 = self.0.iter().sum();
        if sum > 0.0 {
            for bin in &mut self.0 {
                *bin = *bin / sum * 100.0;
            }
        }
    }

    /// Squared Euclidean distance in `R^33` between two descriptors.
    #[must_use]
    pub fn distance_sq(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = f64::from(*a) - f64::from(*b);
                d * d
            })
            .sum()
    }

    /// Euclidean distance in `R^33` between two descriptors.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

impl crate::spatial::Metric for Descriptor {
    fn distance(&self, other: &Self) -> f64 {
        Descriptor::distance(self, other)
    }
}

/// The subset of a [`crate::point::PointCloud`] that survived extractor
/// filtering, paired 1:1 with their descriptors. The index of a keypoint in
/// this set is the "keypoint index" used by every [`crate::correspondence`]
/// (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct KeypointSet {
    points: Vec<crate::point::Point3f>,
    descriptors: Vec<Descriptor>,
    /// Index of each keypoint in the original, pre-filtering cloud.
    source_indices: Vec<usize>,
}

impl KeypointSet {
    /// Assembles a keypoint set from parallel, equal-length vectors.
    ///
    /// # Panics
    ///
    /// Panics (a programmer error, not a runtime condition) if the three
    /// vectors have different lengths.
    #[must_use]
    pub fn new(
        points: Vec<crate::point::Point3f>,
        descriptors: Vec<Descriptor>,
        source_indices: Vec<usize>,
    ) -> Self {
        assert_eq!(points.len(), descriptors.len());
        assert_eq!(points.len(), source_indices.len());
        Self {
            points,
            descriptors,
            source_indices,
        }
    }

    /// The number of surviving keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no points survived extraction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keypoint coordinates, in keypoint-index order.
    #[must_use]
    pub fn points(&self) -> &[crate::point::Point3f] {
        &self.points
    }

    /// Descriptors, in keypoint-index order, 1:1 with [`Self::points`].
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Maps a keypoint index back to its index in the original cloud.
    #[must_use]
    pub fn source_index(&self, keypoint_idx: usize) -> usize {
        self.source_indices[keypoint_idx]
    }
}
