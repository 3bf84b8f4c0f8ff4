//! Runtime errors
//!
//! The only two fallible conditions the core surfaces as errors:
//! refused linear memory growth and resolver table exhaustion. Bad
//! resolver or listener ids are deliberately *not* errors — they arrive
//! from outside the trust boundary and degrade to no-ops instead.

use thiserror::Error;

use crate::memory::region::AllocError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Allocation failure from the heap layer
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocError),
    /// Every resolver slot is claimed — the hard cap on concurrently
    /// outstanding asynchronous operations
    #[error("resolver table full ({capacity} operations outstanding)")]
    ResolverTableFull { capacity: usize },
}
