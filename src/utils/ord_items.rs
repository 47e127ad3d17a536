//! Total-order wrappers so `f32`/`f64` distances can be used as heap/sort
//! keys. NaN distances never arise from the metrics in this crate (points
//! are always finite), so the partial order is total in practice; ties in
//! the `partial_cmp` fall back to `Equal` rather than panicking.

use core::cmp::Ordering;

/// Wraps `(A, T)`, ordering only by `T`, ascending. Useful as a min-heap key
/// or with `Iterator::min_by_key`.
#[derive(Debug, Clone, Copy)]
pub struct MinItem<A, T: PartialOrd>(pub A, pub T);

/// Wraps `(A, T)`, ordering only by `T`, descending. Useful as a max-heap key
/// or with `Iterator::max_by_key`.
#[derive(Debug, Clone, Copy)]
pub struct MaxItem<A, T: PartialOrd>(pub A, pub T);

impl<A, T: PartialOrd> PartialEq for MinItem<A, T> {
    fn eq(&self, other: &Self) -> bool {
        self.1.partial_cmp(&other.1) == Some(Ordering::Equal)
    }
}
impl<A, T: PartialOrd> Eq for MinItem<A, T> {}
impl<A, T: PartialOrd> PartialOrd for MinItem<A, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<A, T: PartialOrd> Ord for MinItem<A, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; reversing here makes `SizedHeap` (built
        // on `MinItem`) evict the largest distance first.
        other.1.partial_cmp(&self.1).unwrap_or(Ordering::Equal)
    }
}

impl<A, T: PartialOrd> PartialEq for MaxItem<A, T> {
    fn eq(&self, other: &Self) -> bool {
        self.1.partial_cmp(&other.1) == Some(Ordering::Equal)
    }
}
impl<A, T: PartialOrd> Eq for MaxItem<A, T> {}
impl<A, T: PartialOrd> PartialOrd for MaxItem<A, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<A, T: PartialOrd> Ord for MaxItem<A, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.1.partial_cmp(&other.1).unwrap_or(Ordering::Equal)
    }
}
