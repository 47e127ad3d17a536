//! Correspondences between source and target keypoints (spec.md §3, §4.2).

pub mod search;

/// A hypothesized pairing between a source keypoint (`src`) and a target
/// keypoint (`tgt`). Indices refer to the *keypoint* cloud, not the raw
/// input cloud (spec.md §3 Correspondence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Correspondence {
    /// Index into the source keypoint set.
    pub src: usize,
    /// Index into the target keypoint set.
    pub tgt: usize,
}

impl Correspondence {
    /// Creates a correspondence from raw indices.
    #[must_use]
    pub fn new(src: usize, tgt: usize) -> Self {
        Self { src, tgt }
    }
}

/// An ordered, duplicate-free sequence of [`Correspondence`]s. Order must not
/// influence the final solution (spec.md §3); every public constructor
/// sorts by `(src, tgt)` before returning so two runs that differ only in
/// worker scheduling produce byte-identical output (spec.md §5 Ordering).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet {
    items: Vec<Correspondence>,
}

impl CorrespondenceSet {
    /// Deduplicates and order-normalizes `items` into a new set.
    #[must_use]
    pub fn new(mut items: Vec<Correspondence>) -> Self {
        items.sort_unstable();
        items.dedup();
        Self { items }
    }

    /// The number of correspondences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no correspondences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A read-only view of the correspondences, in sorted order.
    #[must_use]
    pub fn as_slice(&self) -> &[Correspondence] {
        &self.items
    }

    /// Checks the index-validity invariant of spec.md §8 property 6: every
    /// `src` is `< num_src_keypoints` and every `tgt` is `< num_tgt_keypoints`.
    #[must_use]
    pub fn indices_valid(&self, num_src_keypoints: usize, num_tgt_keypoints: usize) -> bool {
        self.items
            .iter()
            .all(|c| c.src < num_src_keypoints && c.tgt < num_tgt_keypoints)
    }

    /// Truncates to at most `cap` correspondences, keeping the first `cap`
    /// in sorted order (deterministic; spec.md §6 `num_max_corr`).
    pub fn truncate(&mut self, cap: usize) {
        self.items.truncate(cap);
    }

    /// Builds a set from an iterator without requiring an intermediate
    /// `Vec` at the call site.
    pub fn from_iter_dedup<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CorrespondenceSet {
    type Item = &'a Correspondence;
    type IntoIter = core::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_and_dedups() {
        let set = CorrespondenceSet::new(vec![
            Correspondence::new(2, 1),
            Correspondence::new(0, 5),
            Correspondence::new(0, 5),
            Correspondence::new(1, 0),
        ]);
        assert_eq!(set.len(), 3);
        let idx: Vec<_> = set.as_slice().iter().map(|c| (c.src, c.tgt)).collect();
        assert_eq!(idx, vec![(0, 5), (1, 0), (2, 1)]);
    }

    #[test]
    fn index_validity_check() {
        let set = CorrespondenceSet::new(vec![Correspondence::new(0, 0), Correspondence::new(4, 2)]);
        assert!(set.indices_valid(5, 3));
        assert!(!set.indices_valid(5, 2));
        assert!(!set.indices_valid(4, 3));
    }
}
