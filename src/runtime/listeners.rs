//! Multi-shot event listener registry
//!
//! Unlike a stashed resolver, a listener survives delivery: the host
//! redelivers events under the same application-chosen id until the
//! application clears it. Ids outside the fixed capacity are silently
//! ignored, as with every id arriving over the boundary.
//!
//! Dispatch parks the listener out of its slot while it runs so the
//! registry can be mutated reentrantly — a listener may clear itself,
//! replace itself or register others during its own invocation.

use super::Runtime;

/// Number of listener slots
pub const LISTENER_CAPACITY: usize = 64;

/// Application-chosen listener slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

impl ListenerId {
    pub fn from_raw(raw: u32) -> ListenerId {
        ListenerId(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A re-invocable event callback; listeners exist for their effects
pub type Listener<V> = Box<dyn FnMut(&mut Runtime<V>, V)>;

enum Slot<V> {
    Empty,
    Ready(Listener<V>),
    /// Parked out of the table for the duration of its own dispatch
    InFlight,
}

/// Fixed-capacity listener table
pub struct ListenerTable<V> {
    slots: Vec<Slot<V>>,
}

impl<V> Default for ListenerTable<V> {
    fn default() -> Self {
        ListenerTable::new()
    }
}

impl<V> ListenerTable<V> {
    pub fn new() -> Self {
        ListenerTable {
            slots: (0..LISTENER_CAPACITY).map(|_| Slot::Empty).collect(),
        }
    }

    /// Register (or replace) the listener for `id`; out-of-range ids
    /// are ignored
    pub fn set(&mut self, id: ListenerId, listener: Listener<V>) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            *slot = Slot::Ready(listener);
        }
    }

    /// Clear the slot for `id`, in-flight or not
    pub fn clear(&mut self, id: ListenerId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            *slot = Slot::Empty;
        }
    }

    /// Take the listener for dispatch, leaving the slot in-flight
    pub(super) fn begin_dispatch(&mut self, id: ListenerId) -> Option<Listener<V>> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        match std::mem::replace(slot, Slot::InFlight) {
            Slot::Ready(listener) => Some(listener),
            other => {
                // not dispatchable; put back whatever was there
                *slot = other;
                None
            }
        }
    }

    /// Restore a dispatched listener unless the slot was cleared or
    /// replaced while it ran
    pub(super) fn finish_dispatch(&mut self, id: ListenerId, listener: Listener<V>) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            if matches!(slot, Slot::InFlight) {
                *slot = Slot::Ready(listener);
            }
        }
    }

    /// Whether a listener is currently registered (or running) for `id`
    pub fn is_registered(&self, id: ListenerId) -> bool {
        matches!(
            self.slots.get(id.0 as usize),
            Some(Slot::Ready(_)) | Some(Slot::InFlight)
        )
    }
}
