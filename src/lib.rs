//! Freestanding runtime core
//!
//! Self-hosted memory allocation and asynchronous result plumbing for a
//! compiled application that runs with no operating system, no garbage
//! collector and no native event loop. Two coupled subsystems make up
//! the core: a segregated free-list allocator over a single growing
//! linear memory region ([`memory`]) and a manual promise/continuation
//! engine with a bounded resolver table for id-only completion delivery
//! from an external event source ([`promise`], [`runtime`]).
//!
//! All process-wide state lives in an explicit [`runtime::Runtime`]
//! context value; there are no hidden globals and no locks (execution is
//! single-threaded and cooperative).

pub mod error;
pub mod memory;
pub mod promise;
pub mod runtime;
