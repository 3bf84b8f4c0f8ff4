//! The runtime context
//!
//! One explicit context value owns every piece of process-wide state —
//! the heap, the promise store, the resolver stash, the listener table
//! and the bridge registers — and exposes every entry point. Execution
//! is single-threaded and cooperative: nothing here blocks, and no
//! entry point runs while another is in progress, so no locking is
//! needed. Tests construct independent contexts freely.
//!
//! The payload type `V` is caller-chosen. There is no distinct
//! rejection channel: errors, where used, are ordinary values (a host
//! firing a negative status word, say).

pub mod listeners;
pub mod registers;

use crate::error::RuntimeError;
use crate::memory::heap::{Heap, HeapStats};
use crate::memory::region::{AllocError, HeapAddr};
use crate::promise::callback::OnceCallback;
use crate::promise::engine::{PromiseRef, Promises};
use crate::promise::stash::{ResolverId, ResolverStash, STASH_CAPACITY};

use self::listeners::{Listener, ListenerId, ListenerTable};
use self::registers::Registers;

/// The runtime context object
pub struct Runtime<V> {
    heap: Heap,
    promises: Promises<V>,
    stash: ResolverStash,
    listeners: ListenerTable<V>,
    registers: Registers,
}

impl<V: Clone + 'static> Default for Runtime<V> {
    fn default() -> Self {
        Runtime::new()
    }
}

impl<V: Clone + 'static> Runtime<V> {
    pub fn new() -> Self {
        Runtime::over(Heap::new())
    }

    /// A runtime whose heap refuses to commit more than `pages` pages
    /// of linear memory
    pub fn with_memory_limit(pages: usize) -> Self {
        Runtime::over(Heap::with_limit(pages))
    }

    fn over(heap: Heap) -> Self {
        Runtime {
            heap,
            promises: Promises::new(),
            stash: ResolverStash::new(),
            listeners: ListenerTable::new(),
            registers: Registers::new(),
        }
    }

    // ---- memory surface -------------------------------------------------

    /// Allocate at least `size` zero-filled bytes
    pub fn allocate(&mut self, size: usize) -> Result<HeapAddr, AllocError> {
        self.heap.allocate(size)
    }

    /// Return a block for recycling
    pub fn deallocate(&mut self, addr: HeapAddr) -> Result<(), AllocError> {
        self.heap.deallocate(addr)
    }

    /// Set `len` bytes at `addr` to `byte`
    pub fn fill(&mut self, addr: HeapAddr, len: usize, byte: u8) -> Result<(), AllocError> {
        self.heap.fill(addr, len, byte)
    }

    /// Copy `len` bytes from `src` to `dst`
    pub fn copy(&mut self, dst: HeapAddr, src: HeapAddr, len: usize) -> Result<(), AllocError> {
        self.heap.copy(dst, src, len)
    }

    /// Direct access to the heap (byte views, load/store helpers, size
    /// queries)
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Allocator statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // ---- promises -------------------------------------------------------

    /// A fresh pending promise
    pub fn create(&mut self) -> PromiseRef {
        self.promises.create()
    }

    /// A fresh promise born already resolved — what a leaf continuation
    /// returns
    pub fn resolved(&mut self, value: V) -> PromiseRef {
        self.promises.resolved(value)
    }

    pub fn is_resolved(&self, p: PromiseRef) -> bool {
        self.promises.is_resolved(p)
    }

    /// Clone of `p`'s value, or `None` while pending
    pub fn value(&self, p: PromiseRef) -> Option<V> {
        self.promises.value(p)
    }

    /// Attach continuation `f` to `p`, returning the chain promise that
    /// will carry `f`'s eventual result
    ///
    /// If `p` is already resolved, `f` runs immediately; if `f`'s own
    /// result is still pending, the chain promise is wired to follow
    /// it. Continuations compose the same way regardless of timing.
    pub fn then<F>(&mut self, p: PromiseRef, f: F) -> PromiseRef
    where
        F: FnOnce(&mut Runtime<V>, V) -> PromiseRef + 'static,
    {
        let chain = self.promises.create();
        match self.promises.value(p) {
            Some(value) => {
                let inner = f(self, value);
                match self.promises.value(inner) {
                    Some(inner_value) => self.promises.complete(chain, inner_value),
                    None => self.promises.forward(inner, chain),
                }
            }
            None => self.promises.attach(p, OnceCallback::new(f), chain),
        }
        chain
    }

    /// Resolve `p` with `value` and propagate through its chain
    ///
    /// Deliberately an explicit loop, not recursion: chains of
    /// unbounded length must not grow the call stack. Each iteration
    /// marks the current promise resolved and fires its continuation;
    /// a continuation returning an already-resolved promise keeps the
    /// loop walking, one returning a pending promise wires forwarding
    /// and stops — propagation picks up again when that promise
    /// resolves.
    ///
    /// Each promise resolves exactly once; resolving an
    /// already-resolved promise is a caller obligation the engine does
    /// not police.
    pub fn resolve(&mut self, p: PromiseRef, value: V) {
        let mut current = p;
        let mut value = value;
        loop {
            self.promises.complete(current, value.clone());
            match self.promises.take_continuation(current) {
                (Some(callback), Some(chain)) => {
                    let inner = callback.invoke(self, value.clone());
                    match self.promises.value(inner) {
                        Some(inner_value) => {
                            value = inner_value;
                            current = chain;
                        }
                        None => {
                            self.promises.forward(inner, chain);
                            break;
                        }
                    }
                }
                // pure pass-through: no continuation, same value onward
                (None, Some(chain)) => current = chain,
                // terminal resolved leaf
                _ => break,
            }
        }
    }

    // ---- resolver stash -------------------------------------------------

    /// Park a pending resolver and return the id to hand across the
    /// trust boundary
    pub fn stash(&mut self, resolver: PromiseRef) -> Result<ResolverId, RuntimeError> {
        self.stash
            .stash(resolver)
            .ok_or(RuntimeError::ResolverTableFull {
                capacity: STASH_CAPACITY,
            })
    }

    /// Reclaim a stashed resolver (consume-once); bad or consumed ids
    /// yield `None`
    pub fn unstash(&mut self, id: ResolverId) -> Option<PromiseRef> {
        self.stash.take(id)
    }

    /// Resolver slots currently claimed
    pub fn outstanding_resolvers(&self) -> usize {
        self.stash.outstanding()
    }

    /// The completion entry point for external event sources
    ///
    /// Unstash the resolver for `id` and drive resolution with `value`.
    /// Absent ids — out of range, consumed, duplicated or late — are a
    /// silent no-op: delivery is untrusted and must never crash the
    /// core.
    pub fn fire(&mut self, id: ResolverId, value: V) {
        if let Some(resolver) = self.stash.take(id) {
            self.resolve(resolver, value);
        }
    }

    // ---- listeners ------------------------------------------------------

    /// Register (or replace) a multi-shot listener under `id`
    pub fn listen<F>(&mut self, id: ListenerId, f: F)
    where
        F: FnMut(&mut Runtime<V>, V) + 'static,
    {
        self.listeners.set(id, Box::new(f) as Listener<V>);
    }

    /// Remove the listener for `id`
    pub fn unlisten(&mut self, id: ListenerId) {
        self.listeners.clear(id);
    }

    /// Whether a listener is registered for `id`
    pub fn is_listening(&self, id: ListenerId) -> bool {
        self.listeners.is_registered(id)
    }

    /// Deliver an event to the listener for `id`, if any
    ///
    /// The listener is parked out of the table while it runs, so it may
    /// reenter the registry (clearing or replacing itself included) as
    /// well as allocate, stash and fire.
    pub fn dispatch(&mut self, id: ListenerId, value: V) {
        if let Some(mut listener) = self.listeners.begin_dispatch(id) {
            listener(self, value);
            self.listeners.finish_dispatch(id, listener);
        }
    }

    // ---- bridge registers -----------------------------------------------

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    pub fn test_then_on_pending_defers_until_resolve() {
        let mut rt: Runtime<i64> = Runtime::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let p = rt.create();
        let seen = fired.clone();
        let q = rt.then(p, move |rt, v| {
            seen.borrow_mut().push(v);
            rt.resolved(v * 2)
        });
        assert!(fired.borrow().is_empty());
        rt.resolve(p, 42);
        assert_eq!(*fired.borrow(), vec![42]);
        assert_eq!(rt.value(q), Some(84));
    }

    #[test]
    pub fn test_then_on_resolved_fires_immediately() {
        let mut rt: Runtime<i64> = Runtime::new();
        let p = rt.resolved(7);
        let q = rt.then(p, |rt, v| rt.resolved(v + 1));
        assert_eq!(rt.value(q), Some(8));
    }

    #[test]
    pub fn test_callback_runs_exactly_once() {
        let mut rt: Runtime<i64> = Runtime::new();
        let count = Rc::new(RefCell::new(0));
        let p = rt.create();
        let seen = count.clone();
        rt.then(p, move |rt, v| {
            *seen.borrow_mut() += 1;
            rt.resolved(v)
        });
        rt.resolve(p, 1);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    pub fn test_chain_resolves_in_attachment_order() {
        let mut rt: Runtime<i64> = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let p = rt.create();
        let mut q = p;
        for i in 0..5 {
            let seen = order.clone();
            q = rt.then(q, move |rt, v| {
                seen.borrow_mut().push(i);
                rt.resolved(v + 1)
            });
        }
        rt.resolve(p, 0);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
        assert_eq!(rt.value(q), Some(5));
    }

    #[test]
    pub fn test_pending_inner_promise_pauses_propagation() {
        let mut rt: Runtime<i64> = Runtime::new();
        let p = rt.create();
        let gate = rt.create();
        let q = rt.then(p, move |_rt, _v| gate);
        let r = rt.then(q, |rt, v| rt.resolved(v * 10));
        rt.resolve(p, 1);
        // propagation stopped at the pending gate
        assert!(rt.value(q).is_none());
        assert!(rt.value(r).is_none());
        // resolving the gate forwards through the rest of the chain
        rt.resolve(gate, 5);
        assert_eq!(rt.value(q), Some(5));
        assert_eq!(rt.value(r), Some(50));
    }

    #[test]
    pub fn test_then_after_pending_inner_composes() {
        // attach to a chain promise whose input was already resolved
        // but whose continuation returned a pending promise
        let mut rt: Runtime<i64> = Runtime::new();
        let gate = rt.create();
        let p = rt.resolved(3);
        let q = rt.then(p, move |_rt, _v| gate);
        assert!(rt.value(q).is_none());
        rt.resolve(gate, 9);
        assert_eq!(rt.value(q), Some(9));
    }

    #[test]
    pub fn test_deep_chain_flat_stack() {
        // tens of thousands of links; recursive propagation would
        // overflow the stack long before this completes
        let mut rt: Runtime<i64> = Runtime::new();
        let p = rt.create();
        let mut q = p;
        for _ in 0..50_000 {
            q = rt.then(q, |rt, v| rt.resolved(v + 1));
        }
        rt.resolve(p, 0);
        assert_eq!(rt.value(q), Some(50_000));
    }

    #[test]
    pub fn test_fire_routes_through_stash() {
        let mut rt: Runtime<i64> = Runtime::new();
        let p = rt.create();
        let q = rt.then(p, |rt, v| rt.resolved(v - 2));
        let id = rt.stash(p).unwrap();
        rt.fire(id, 44);
        assert_eq!(rt.value(q), Some(42));
        // duplicate delivery is a no-op
        rt.fire(id, 999);
        assert_eq!(rt.value(q), Some(42));
    }

    #[test]
    pub fn test_stash_exhaustion_is_surfaced() {
        let mut rt: Runtime<i64> = Runtime::new();
        for _ in 0..STASH_CAPACITY {
            let p = rt.create();
            rt.stash(p).unwrap();
        }
        let p = rt.create();
        assert_eq!(
            rt.stash(p),
            Err(RuntimeError::ResolverTableFull {
                capacity: STASH_CAPACITY
            })
        );
    }

    #[test]
    pub fn test_callback_may_stash_and_fire_unrelated_promises() {
        let mut rt: Runtime<i64> = Runtime::new();
        let side = rt.create();
        let side_out = rt.then(side, |rt, v| rt.resolved(v));
        let side_id = rt.stash(side).unwrap();

        let p = rt.create();
        let q = rt.then(p, move |rt, v| {
            // reentrant use of unrelated state during propagation
            let buf = rt.allocate(100).unwrap();
            rt.fire(side_id, 10);
            rt.deallocate(buf).unwrap();
            rt.resolved(v)
        });
        rt.resolve(p, 1);
        assert_eq!(rt.value(q), Some(1));
        assert_eq!(rt.value(side_out), Some(10));
    }

    #[test]
    pub fn test_listener_is_multi_shot() {
        let mut rt: Runtime<i64> = Runtime::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let id = ListenerId::from_raw(3);
        let sink = seen.clone();
        rt.listen(id, move |_rt, v| sink.borrow_mut().push(v));
        rt.dispatch(id, 1);
        rt.dispatch(id, 2);
        rt.dispatch(id, 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert!(rt.is_listening(id));
    }

    #[test]
    pub fn test_listener_can_unlisten_itself() {
        let mut rt: Runtime<i64> = Runtime::new();
        let seen = Rc::new(RefCell::new(0));
        let id = ListenerId::from_raw(0);
        let sink = seen.clone();
        rt.listen(id, move |rt, _v| {
            *sink.borrow_mut() += 1;
            rt.unlisten(id);
        });
        rt.dispatch(id, 1);
        rt.dispatch(id, 2);
        assert_eq!(*seen.borrow(), 1);
        assert!(!rt.is_listening(id));
    }

    #[test]
    pub fn test_unknown_listener_ids_ignored() {
        let mut rt: Runtime<i64> = Runtime::new();
        rt.dispatch(ListenerId::from_raw(1), 5);
        rt.dispatch(ListenerId::from_raw(u32::MAX), 5);
        rt.listen(ListenerId::from_raw(u32::MAX), |_rt, _v| {});
        assert!(!rt.is_listening(ListenerId::from_raw(u32::MAX)));
    }
}
