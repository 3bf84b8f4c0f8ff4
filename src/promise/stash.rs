//! Resolver stash table
//!
//! A pending resolver handed to a host primitive is parked here and
//! only its small integer slot index crosses the trust boundary. The
//! host later presents the id to `fire`; ids are untrusted, so bad,
//! duplicate or late ids must degrade to a no-op rather than fault.
//!
//! Slots follow a consume-once discipline: claimed on stash, cleared on
//! take. The fixed capacity is a hard cap on concurrently outstanding
//! asynchronous operations.

use super::engine::PromiseRef;

/// Number of resolver slots
pub const STASH_CAPACITY: usize = 64;

/// Index of a stashed resolver — the only token that crosses the
/// external boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolverId(u32);

impl ResolverId {
    /// Reconstitute an id received from the external event source
    pub fn from_raw(raw: u32) -> ResolverId {
        ResolverId(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Fixed-capacity table of pending resolvers
pub struct ResolverStash {
    slots: [Option<PromiseRef>; STASH_CAPACITY],
}

impl Default for ResolverStash {
    fn default() -> Self {
        ResolverStash::new()
    }
}

impl ResolverStash {
    pub fn new() -> Self {
        ResolverStash {
            slots: [None; STASH_CAPACITY],
        }
    }

    /// Claim the first free slot for `resolver`
    ///
    /// `None` means the table is full — resource exhaustion the caller
    /// must surface, not swallow.
    pub fn stash(&mut self, resolver: PromiseRef) -> Option<ResolverId> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(resolver);
        Some(ResolverId(index as u32))
    }

    /// Return and clear the slot for `id` (consume-once)
    ///
    /// Out-of-range and already-consumed ids yield `None`.
    pub fn take(&mut self, id: ResolverId) -> Option<PromiseRef> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    /// Number of currently claimed slots
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
