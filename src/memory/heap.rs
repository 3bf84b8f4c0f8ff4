//! The segregated free-list heap
//!
//! Built over the linear [`Region`]: requests are bucketed into fixed
//! size classes with one LIFO free stack each, with an unordered chain
//! of oversized blocks reused by bounded first-fit. Deallocation only
//! recycles — blocks are never coalesced, the region never shrinks.
//!
//! Every allocation path zero-fills the returned user area before
//! handing it out. Callers rely on this; it is a contract, not an
//! optimisation.

use super::region::{AllocError, HeapAddr, Region, MAX_ALLOC_SIZE};

/// Block sizes for the fixed size classes, smallest first
pub const SIZE_CLASSES: [usize; 4] = [32, 128, 512, 4096];

/// A fixed allocation size class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass(usize);

impl SizeClass {
    /// Smallest class able to hold a request of `size` bytes, if any
    pub fn for_request(size: usize) -> Option<SizeClass> {
        SIZE_CLASSES.iter().position(|&c| size <= c).map(SizeClass)
    }

    /// The class whose block size is exactly `size`, if any
    pub fn of_exact(size: usize) -> Option<SizeClass> {
        SIZE_CLASSES.iter().position(|&c| size == c).map(SizeClass)
    }

    /// Block size of this class
    pub fn bytes(self) -> usize {
        SIZE_CLASSES[self.0]
    }

    fn index(self) -> usize {
        self.0
    }
}

/// Heap counters; the observability surface of the allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks carved fresh from the region
    pub bump_allocs: usize,
    /// Allocations satisfied from a free list
    pub reuse_allocs: usize,
    /// Blocks returned for recycling
    pub frees: usize,
    /// Bytes of linear memory committed
    pub bytes_committed: usize,
}

/// Segregated free-list allocator over a linear region
pub struct Heap {
    region: Region,
    /// One LIFO free stack per size class
    classes: [Vec<HeapAddr>; SIZE_CLASSES.len()],
    /// Unordered chain of freed blocks above the largest class
    oversize: Vec<HeapAddr>,
    bump_allocs: usize,
    reuse_allocs: usize,
    frees: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap::over(Region::new())
    }

    /// A heap whose region refuses to commit more than `pages` pages
    pub fn with_limit(pages: usize) -> Self {
        Heap::over(Region::with_limit(pages))
    }

    fn over(region: Region) -> Self {
        Heap {
            region,
            classes: Default::default(),
            oversize: Vec::new(),
            bump_allocs: 0,
            reuse_allocs: 0,
            frees: 0,
        }
    }

    /// Allocate at least `size` usable bytes, zero-filled
    ///
    /// Sizes up to the largest class round up to the smallest enclosing
    /// class and reuse that class's free list LIFO. Larger requests
    /// reuse the first oversized block whose recorded size S satisfies
    /// `size <= S <= 2 * size`, or bump exactly `size` fresh bytes.
    pub fn allocate(&mut self, size: usize) -> Result<HeapAddr, AllocError> {
        let size = size.max(1);
        if size > MAX_ALLOC_SIZE {
            return Err(AllocError::BadRequest);
        }

        let (addr, usable) = match SizeClass::for_request(size) {
            Some(class) => match self.classes[class.index()].pop() {
                Some(addr) => {
                    self.reuse_allocs += 1;
                    (addr, class.bytes())
                }
                None => {
                    self.bump_allocs += 1;
                    (self.region.bump(class.bytes())?, class.bytes())
                }
            },
            None => match self.first_fit(size) {
                Some(index) => {
                    let addr = self.oversize.swap_remove(index);
                    self.reuse_allocs += 1;
                    (addr, self.region.recorded_size(addr)?)
                }
                None => {
                    self.bump_allocs += 1;
                    (self.region.bump(size)?, size)
                }
            },
        };

        // the zero-fill contract: every path, the whole user area
        self.region.fill(addr, usable, 0)?;
        Ok(addr)
    }

    /// Index of the first oversized block with size in `[size, 2 * size]`
    fn first_fit(&self, size: usize) -> Option<usize> {
        self.oversize.iter().position(|&addr| {
            self.region
                .recorded_size(addr)
                .map(|s| s >= size && s <= 2 * size)
                .unwrap_or(false)
        })
    }

    /// Return a block for recycling
    ///
    /// A block whose recorded size is exactly a class size goes back on
    /// that class's stack; anything else joins the oversized chain.
    /// Content is left as-is — no poisoning, no use-after-free
    /// detection at this layer.
    pub fn deallocate(&mut self, addr: HeapAddr) -> Result<(), AllocError> {
        let size = self.region.recorded_size(addr)?;
        match SizeClass::of_exact(size) {
            Some(class) => self.classes[class.index()].push(addr),
            None => self.oversize.push(addr),
        }
        self.frees += 1;
        Ok(())
    }

    /// Usable size recorded for the block at `addr`
    pub fn usable_size(&self, addr: HeapAddr) -> Result<usize, AllocError> {
        self.region.recorded_size(addr)
    }

    /// Set `len` bytes at `addr` to `byte`
    pub fn fill(&mut self, addr: HeapAddr, len: usize, byte: u8) -> Result<(), AllocError> {
        self.region.fill(addr, len, byte)
    }

    /// Copy `len` bytes from `src` to `dst` (overlap per `copy_within`)
    pub fn copy(&mut self, dst: HeapAddr, src: HeapAddr, len: usize) -> Result<(), AllocError> {
        self.region.copy(dst, src, len)
    }

    /// Borrow `len` bytes at `addr`
    pub fn bytes(&self, addr: HeapAddr, len: usize) -> Result<&[u8], AllocError> {
        self.region.bytes(addr, len)
    }

    /// Mutably borrow `len` bytes at `addr`
    pub fn bytes_mut(&mut self, addr: HeapAddr, len: usize) -> Result<&mut [u8], AllocError> {
        self.region.bytes_mut(addr, len)
    }

    /// Store a little-endian i32 at `addr + offset`
    pub fn write_i32(&mut self, addr: HeapAddr, offset: usize, value: i32) -> Result<(), AllocError> {
        self.region.write_i32(addr, offset, value)
    }

    /// Load a little-endian i32 from `addr + offset`
    pub fn read_i32(&self, addr: HeapAddr, offset: usize) -> Result<i32, AllocError> {
        self.region.read_i32(addr, offset)
    }

    /// Store a single byte at `addr + offset`
    pub fn write_u8(&mut self, addr: HeapAddr, offset: usize, value: u8) -> Result<(), AllocError> {
        self.region.write_u8(addr, offset, value)
    }

    /// Statistics
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            bump_allocs: self.bump_allocs,
            reuse_allocs: self.reuse_allocs,
            frees: self.frees,
            bytes_committed: self.region.committed(),
        }
    }
}
