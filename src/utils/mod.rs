//! Small, dependency-free helpers shared across stages.

mod ord_items;
mod sized_heap;

pub use ord_items::{MaxItem, MinItem};
pub use sized_heap::SizedHeap;
