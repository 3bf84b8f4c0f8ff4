//! Bridge scratch registers
//!
//! Completion delivery through `fire` carries a single payload word.
//! Host primitives that finish with more than one word — a byte range,
//! layout measurements, a status tuple — park the extra words in these
//! registers for the application to read after resolution. A cleared
//! register reads as zero or `None`; out-of-range slot indices are
//! ignored, matching the tolerance of the rest of the boundary surface.

use crate::memory::region::HeapAddr;

/// Layout measurement slots (x, y, width, height, scroll offsets)
pub const MEASURE_SLOTS: usize = 6;
/// General-purpose integer slots for multi-word completions
pub const BRIDGE_INT_SLOTS: usize = 4;

/// Fixed scratch registers shared with the host bridge
#[derive(Debug, Default)]
pub struct Registers {
    measure: [i32; MEASURE_SLOTS],
    bridge_ints: [i32; BRIDGE_INT_SLOTS],
    byte_range: Option<(HeapAddr, usize)>,
    root: Option<HeapAddr>,
}

impl Registers {
    pub fn new() -> Self {
        Registers::default()
    }

    pub fn measure(&self, slot: usize) -> i32 {
        self.measure.get(slot).copied().unwrap_or(0)
    }

    pub fn set_measure(&mut self, slot: usize, value: i32) {
        if let Some(s) = self.measure.get_mut(slot) {
            *s = value;
        }
    }

    pub fn bridge_int(&self, slot: usize) -> i32 {
        self.bridge_ints.get(slot).copied().unwrap_or(0)
    }

    pub fn set_bridge_int(&mut self, slot: usize, value: i32) {
        if let Some(s) = self.bridge_ints.get_mut(slot) {
            *s = value;
        }
    }

    /// Byte range most recently published by a host completion
    pub fn byte_range(&self) -> Option<(HeapAddr, usize)> {
        self.byte_range
    }

    pub fn set_byte_range(&mut self, addr: HeapAddr, len: usize) {
        self.byte_range = Some((addr, len));
    }

    pub fn clear_byte_range(&mut self) {
        self.byte_range = None;
    }

    /// Persisted root address surviving across host round trips
    pub fn root(&self) -> Option<HeapAddr> {
        self.root
    }

    pub fn set_root(&mut self, addr: HeapAddr) {
        self.root = Some(addr);
    }
}
