//! The linear memory region and its bump cursor
//!
//! A single byte region committed in whole pages, growing upward and
//! never shrinking. Every block the runtime ever hands out is carved
//! from here by advancing a monotonic cursor; freed blocks are recycled
//! by the heap layer but the region itself only grows.

use thiserror::Error;

/// Machine word size; the cursor and every user area are word aligned
pub const WORD_SIZE_BYTES: usize = 8;
/// Per-block header recording the block's usable size
pub const HEADER_SIZE_BYTES: usize = WORD_SIZE_BYTES;
/// Committed memory grows in whole pages
pub const PAGE_SIZE_BYTES: usize = 1 << 16;
/// Maximum usable size of a single block
pub const MAX_ALLOC_SIZE: usize = u32::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Request too large for any block, or an address outside the region
    #[error("bad allocation request or address")]
    BadRequest,
    /// Growth past the configured page limit was refused
    #[error("linear memory growth refused")]
    OOM,
}

/// Checked index of a block's user area within the region
///
/// Addresses are only ever minted by [`Region::bump`]; the header
/// recording the block's usable size sits in the word below. A stale or
/// fabricated address fails the bounds test on use rather than aliasing
/// live memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapAddr(u32);

impl HeapAddr {
    /// Byte offset of the user area
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    fn header_offset(self) -> usize {
        self.0 as usize - HEADER_SIZE_BYTES
    }
}

/// The linear memory region
pub struct Region {
    bytes: Vec<u8>,
    /// Next free byte; advances only forward
    cursor: usize,
    /// Cap on committed pages; `None` is unbounded
    page_limit: Option<usize>,
}

impl Default for Region {
    fn default() -> Self {
        Region::new()
    }
}

impl Region {
    pub fn new() -> Self {
        Region {
            bytes: Vec::new(),
            cursor: 0,
            page_limit: None,
        }
    }

    /// A region that refuses to commit more than `pages` pages
    pub fn with_limit(pages: usize) -> Self {
        Region {
            bytes: Vec::new(),
            cursor: 0,
            page_limit: Some(pages),
        }
    }

    /// Bytes currently committed
    pub fn committed(&self) -> usize {
        self.bytes.len()
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Commit enough whole pages to make `required` bytes addressable.
    /// Newly committed memory is zeroed.
    fn grow_for(&mut self, required: usize) -> Result<(), AllocError> {
        if required <= self.bytes.len() {
            return Ok(());
        }
        let pages = required.div_ceil(PAGE_SIZE_BYTES);
        if let Some(limit) = self.page_limit {
            if pages > limit {
                return Err(AllocError::OOM);
            }
        }
        self.bytes.resize(pages * PAGE_SIZE_BYTES, 0);
        Ok(())
    }

    /// Reserve a fresh block with `usable` bytes of user area
    ///
    /// Aligns the cursor to the word size, writes the header and
    /// advances past header and user area. Refused growth surfaces as
    /// `Err(OOM)`; the cursor never retreats.
    pub fn bump(&mut self, usable: usize) -> Result<HeapAddr, AllocError> {
        if usable > MAX_ALLOC_SIZE {
            return Err(AllocError::BadRequest);
        }
        let start = align_word(self.cursor);
        let end = start + HEADER_SIZE_BYTES + usable;
        self.grow_for(end)?;

        let user = start + HEADER_SIZE_BYTES;
        let addr = u32::try_from(user).map_err(|_| AllocError::OOM)?;
        self.bytes[start..user].copy_from_slice(&(usable as u64).to_le_bytes());
        self.cursor = end;
        Ok(HeapAddr(addr))
    }

    /// Usable size recorded in the block's header
    pub fn recorded_size(&self, addr: HeapAddr) -> Result<usize, AllocError> {
        let user = addr.offset();
        if user < HEADER_SIZE_BYTES || user % WORD_SIZE_BYTES != 0 || user > self.cursor {
            return Err(AllocError::BadRequest);
        }
        let header = addr.header_offset();
        let mut word = [0u8; HEADER_SIZE_BYTES];
        word.copy_from_slice(&self.bytes[header..user]);
        let size = u64::from_le_bytes(word) as usize;
        if user + size > self.cursor {
            return Err(AllocError::BadRequest);
        }
        Ok(size)
    }

    fn range(&self, addr: HeapAddr, len: usize) -> Result<std::ops::Range<usize>, AllocError> {
        let start = addr.offset();
        let end = start.checked_add(len).ok_or(AllocError::BadRequest)?;
        if end > self.bytes.len() {
            return Err(AllocError::BadRequest);
        }
        Ok(start..end)
    }

    /// Borrow `len` bytes starting at `addr`
    pub fn bytes(&self, addr: HeapAddr, len: usize) -> Result<&[u8], AllocError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Mutably borrow `len` bytes starting at `addr`
    pub fn bytes_mut(&mut self, addr: HeapAddr, len: usize) -> Result<&mut [u8], AllocError> {
        let range = self.range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    /// Set `len` bytes starting at `addr` to `byte`
    pub fn fill(&mut self, addr: HeapAddr, len: usize, byte: u8) -> Result<(), AllocError> {
        self.bytes_mut(addr, len)?.fill(byte);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`. Behaviour for overlapping
    /// ranges follows `copy_within`.
    pub fn copy(&mut self, dst: HeapAddr, src: HeapAddr, len: usize) -> Result<(), AllocError> {
        let src_range = self.range(src, len)?;
        let dst_range = self.range(dst, len)?;
        self.bytes.copy_within(src_range, dst_range.start);
        Ok(())
    }

    /// Store a little-endian i32 at `addr + offset`
    pub fn write_i32(&mut self, addr: HeapAddr, offset: usize, value: i32) -> Result<(), AllocError> {
        let start = addr
            .offset()
            .checked_add(offset)
            .ok_or(AllocError::BadRequest)?;
        let end = start.checked_add(4).ok_or(AllocError::BadRequest)?;
        if end > self.bytes.len() {
            return Err(AllocError::BadRequest);
        }
        self.bytes[start..end].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Load a little-endian i32 from `addr + offset`
    pub fn read_i32(&self, addr: HeapAddr, offset: usize) -> Result<i32, AllocError> {
        let start = addr
            .offset()
            .checked_add(offset)
            .ok_or(AllocError::BadRequest)?;
        let end = start.checked_add(4).ok_or(AllocError::BadRequest)?;
        if end > self.bytes.len() {
            return Err(AllocError::BadRequest);
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[start..end]);
        Ok(i32::from_le_bytes(word))
    }

    /// Store a single byte at `addr + offset`
    pub fn write_u8(&mut self, addr: HeapAddr, offset: usize, value: u8) -> Result<(), AllocError> {
        let at = addr
            .offset()
            .checked_add(offset)
            .ok_or(AllocError::BadRequest)?;
        if at >= self.bytes.len() {
            return Err(AllocError::BadRequest);
        }
        self.bytes[at] = value;
        Ok(())
    }
}

fn align_word(offset: usize) -> usize {
    (offset + WORD_SIZE_BYTES - 1) & !(WORD_SIZE_BYTES - 1)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use matches::assert_matches;

    #[test]
    pub fn test_bump_aligns_user_area() {
        let mut region = Region::new();
        for usable in [1, 3, 7, 8, 13, 32, 100] {
            let addr = region.bump(usable).unwrap();
            assert_eq!(addr.offset() % WORD_SIZE_BYTES, 0);
            assert_eq!(region.recorded_size(addr).unwrap(), usable);
        }
    }

    #[test]
    pub fn test_cursor_only_advances() {
        let mut region = Region::new();
        let a = region.bump(16).unwrap();
        let b = region.bump(16).unwrap();
        assert!(b.offset() > a.offset());
        assert!(region.cursor() >= b.offset() + 16);
    }

    #[test]
    pub fn test_growth_in_whole_pages() {
        let mut region = Region::new();
        region.bump(1).unwrap();
        assert_eq!(region.committed(), PAGE_SIZE_BYTES);
        region.bump(PAGE_SIZE_BYTES).unwrap();
        assert_eq!(region.committed() % PAGE_SIZE_BYTES, 0);
    }

    #[test]
    pub fn test_refused_growth_is_an_error_not_an_abort() {
        let mut region = Region::with_limit(1);
        let addr = region.bump(1024).unwrap();
        assert_matches!(region.bump(2 * PAGE_SIZE_BYTES), Err(AllocError::OOM));
        // the region is still usable after a refused request
        assert_eq!(region.recorded_size(addr).unwrap(), 1024);
        assert!(region.bump(1024).is_ok());
    }

    #[test]
    pub fn test_recorded_size_rejects_garbage_addresses() {
        let mut region = Region::new();
        let addr = region.bump(64).unwrap();
        assert_eq!(region.recorded_size(addr).unwrap(), 64);
        // unaligned, below-header and past-cursor addresses all fail
        assert_matches!(
            region.recorded_size(HeapAddr(addr.0 + 1)),
            Err(AllocError::BadRequest)
        );
        assert_matches!(region.recorded_size(HeapAddr(0)), Err(AllocError::BadRequest));
        assert_matches!(
            region.recorded_size(HeapAddr(1 << 20)),
            Err(AllocError::BadRequest)
        );
    }

    #[test]
    pub fn test_fill_and_copy() {
        let mut region = Region::new();
        let a = region.bump(16).unwrap();
        let b = region.bump(16).unwrap();
        region.fill(a, 16, 0xAB).unwrap();
        region.copy(b, a, 16).unwrap();
        assert_eq!(region.bytes(b, 16).unwrap(), &[0xAB; 16]);
    }

    #[test]
    pub fn test_i32_round_trip() {
        let mut region = Region::new();
        let a = region.bump(32).unwrap();
        region.write_i32(a, 4, -559038737).unwrap();
        assert_eq!(region.read_i32(a, 4).unwrap(), -559038737);
        region.write_u8(a, 0, 0x7F).unwrap();
        assert_eq!(region.bytes(a, 1).unwrap()[0], 0x7F);
    }

    #[test]
    pub fn test_out_of_range_access_rejected() {
        let mut region = Region::new();
        let a = region.bump(8).unwrap();
        let far = region.committed();
        assert_matches!(region.bytes(a, far + 1), Err(AllocError::BadRequest));
        assert_matches!(region.write_i32(a, far, 0), Err(AllocError::BadRequest));
    }
}
