//! Promise slot store
//!
//! Each promise is a record of four things: resolution state (carrying
//! the value once resolved), an optional attached continuation and an
//! optional downstream chain promise. Records live in a growable arena
//! addressed by [`PromiseRef`] indices; they are never reclaimed —
//! ownership of a ref is implicit in who holds it, consistent with an
//! allocator that only recycles and never compacts.
//!
//! This module is only the store; `then` and the propagation loop live
//! on the runtime context, which continuations need access to.

use super::callback::OnceCallback;

/// Index of a promise record in the store
///
/// Only minted by [`Promises`]; refs never cross the external trust
/// boundary (resolver ids do that instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseRef(u32);

#[derive(Debug)]
enum State<V> {
    Pending,
    Resolved(V),
}

#[derive(Debug)]
struct PromiseSlot<V> {
    state: State<V>,
    callback: Option<OnceCallback<V>>,
    chain: Option<PromiseRef>,
}

impl<V> PromiseSlot<V> {
    fn new() -> Self {
        PromiseSlot {
            state: State::Pending,
            callback: None,
            chain: None,
        }
    }
}

/// Arena of promise records
#[derive(Debug)]
pub struct Promises<V> {
    slots: Vec<PromiseSlot<V>>,
}

impl<V> Default for Promises<V> {
    fn default() -> Self {
        Promises::new()
    }
}

impl<V> Promises<V> {
    pub fn new() -> Self {
        Promises { slots: Vec::new() }
    }

    /// A fresh pending promise
    pub fn create(&mut self) -> PromiseRef {
        let index = self.slots.len() as u32;
        self.slots.push(PromiseSlot::new());
        PromiseRef(index)
    }

    /// A fresh promise born already resolved with `value`
    pub fn resolved(&mut self, value: V) -> PromiseRef {
        let p = self.create();
        self.complete(p, value);
        p
    }

    pub fn is_resolved(&self, p: PromiseRef) -> bool {
        matches!(self.slot(p).state, State::Resolved(_))
    }

    /// Mark `p` resolved, storing its value
    ///
    /// Resolving an already-resolved promise is a caller precondition
    /// violation; the engine does not check for it.
    pub fn complete(&mut self, p: PromiseRef, value: V) {
        self.slot_mut(p).state = State::Resolved(value);
    }

    /// Store a continuation and its chain promise for deferred firing
    ///
    /// Replaces any continuation already attached.
    pub fn attach(&mut self, p: PromiseRef, callback: OnceCallback<V>, chain: PromiseRef) {
        let slot = self.slot_mut(p);
        slot.callback = Some(callback);
        slot.chain = Some(chain);
    }

    /// Point `p`'s chain slot at `chain` so that when `p` resolves its
    /// value forwards on
    pub fn forward(&mut self, p: PromiseRef, chain: PromiseRef) {
        self.slot_mut(p).chain = Some(chain);
    }

    /// Take (consume) the continuation pair from `p`
    pub fn take_continuation(
        &mut self,
        p: PromiseRef,
    ) -> (Option<OnceCallback<V>>, Option<PromiseRef>) {
        let slot = self.slot_mut(p);
        (slot.callback.take(), slot.chain.take())
    }

    /// Number of promises ever created
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, p: PromiseRef) -> &PromiseSlot<V> {
        &self.slots[p.0 as usize]
    }

    fn slot_mut(&mut self, p: PromiseRef) -> &mut PromiseSlot<V> {
        &mut self.slots[p.0 as usize]
    }
}

impl<V: Clone> Promises<V> {
    /// Clone of the resolved value, or `None` while pending
    pub fn value(&self, p: PromiseRef) -> Option<V> {
        match &self.slot(p).state {
            State::Resolved(value) => Some(value.clone()),
            State::Pending => None,
        }
    }
}
