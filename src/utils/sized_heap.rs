//! A bounded max-heap, used to retain the `k` closest candidates during a
//! k-NN traversal without sorting every candidate seen.

use std::collections::BinaryHeap;

use rayon::prelude::*;

use super::MaxItem;

/// Retains at most `k` `(item, distance)` pairs, always keeping those with
/// the smallest distances.
///
/// Internally a `BinaryHeap` (a max-heap) keyed by [`MaxItem`], so the item
/// with the *largest* kept distance is always the one on top: that is
/// exactly the one to evict when a closer candidate arrives.
#[derive(Debug)]
pub struct SizedHeap<A, T: PartialOrd> {
    heap: BinaryHeap<MaxItem<A, T>>,
    k: usize,
}

impl<A, T: PartialOrd> SizedHeap<A, T> {
    /// Creates a heap bounded to `k` items, or unbounded if `k` is `None`.
    #[must_use]
    pub fn new(k: Option<usize>) -> Self {
        k.map_or_else(
            || Self {
                heap: BinaryHeap::new(),
                k: usize::MAX,
            },
            |k| Self {
                heap: BinaryHeap::with_capacity(k),
                k,
            },
        )
    }

    /// Pushes an item, evicting the current farthest item if the heap is
    /// already full and `item` is closer.
    pub fn push(&mut self, (a, item): (A, T)) {
        if self.heap.len() < self.k {
            self.heap.push(MinItem(a, item));
        } else if let Some(top) = self.heap.peek() {
            if item < top.1 {
                self.heap.pop();
                self.heap.push(MinItem(a, item));
            }
        }
    }

    /// Pushes several items, then trims back down to `k`.
    pub fn extend<I: IntoIterator<Item = (A, T)>>(&mut self, items: I) {
        for item in items {
            self.push(item);
        }
    }

    /// The farthest (worst) retained distance, if any.
    #[must_use]
    pub fn worst(&self) -> Option<&T> {
        self.heap.peek().map(|MinItem(_, t)| t)
    }

    /// Whether the heap has reached its capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Whether the heap holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The number of items currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Consumes the heap, returning its items in arbitrary order.
    pub fn into_items(self) -> impl Iterator<Item = (A, T)> {
        self.heap.into_iter().map(|MinItem(a, t)| (a, t))
    }

    /// Merges another heap into this one.
    pub fn merge(&mut self, other: Self) {
        self.extend(other.into_items());
    }
}

impl<A, T: PartialOrd> FromIterator<(A, T)> for SizedHeap<A, T> {
    fn from_iter<I: IntoIterator<Item = (A, T)>>(iter: I) -> Self {
        let mut heap = Self::new(None);
        heap.extend(iter);
        heap
    }
}

impl<A: Send + Sync, T: PartialOrd + Send + Sync> FromParallelIterator<(A, T)> for SizedHeap<A, T> {
    fn from_par_iter<I: IntoParallelIterator<Item = (A, T)>>(par_iter: I) -> Self {
        par_iter
            .into_par_iter()
            .fold(
                || Self::new(None),
                |mut acc, item| {
                    acc.push(item);
                    acc
                },
            )
            .reduce(
                || Self::new(None),
                |mut acc, heap| {
                    acc.merge(heap);
                    acc
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retains_k_smallest() {
        let mut heap = SizedHeap::new(Some(3));
        for (i, d) in [5.0, 1.0, 4.0, 2.0, 3.0].into_iter().enumerate() {
            heap.push((i, d));
        }
        let mut kept: Vec<_> = heap.into_items().map(|(_, d)| d).collect();
        kept.sort_by(|a: &f64, b| a.partial_cmp(b).unwrap());
        assert_eq!(kept, vec![1.0, 2.0, 3.0]);
    }
}
