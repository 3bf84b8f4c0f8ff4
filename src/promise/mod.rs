//! The promise/continuation engine
//!
//! Deferred values ([`engine`]) with single-use continuations
//! ([`callback`]) and a bounded stash table ([`stash`]) that lets an
//! external, id-only event source complete a pending operation.
pub mod callback;
pub mod engine;
pub mod stash;

pub use callback::OnceCallback;
pub use engine::{PromiseRef, Promises};
pub use stash::{ResolverId, ResolverStash, STASH_CAPACITY};
