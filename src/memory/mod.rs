//! Allocation and memory management for the runtime
pub mod heap;
pub mod region;

pub use heap::{Heap, HeapStats, SizeClass};
pub use region::{AllocError, HeapAddr};
