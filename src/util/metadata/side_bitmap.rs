//! A side bitmap with one bit per [`MIN_OBJECT_SIZE`] granule of a fixed address range.

use crate::util::constants::*;
use crate::util::rust_util::zeroed_alloc::new_zeroed_vec;
use crate::util::Address;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One bit per granule, stored in atomic words so it can be read and updated concurrently.
pub struct SideBitmap {
    start: Address,
    end: Address,
    words: Vec<AtomicUsize>,
}

impl SideBitmap {
    /// Create a bitmap covering `[start, end)`. The range must be aligned to the address range
    /// covered by one word of the bitmap.
    pub fn new(start: Address, end: Address) -> Self {
        debug_assert!(start.is_aligned_to(BITS_IN_WORD << LOG_MIN_OBJECT_SIZE));
        debug_assert!(end.is_aligned_to(BITS_IN_WORD << LOG_MIN_OBJECT_SIZE));
        let granules = (end - start) >> LOG_MIN_OBJECT_SIZE;
        let words = granules >> LOG_BITS_IN_WORD;
        Self {
            start,
            end,
            words: unsafe { new_zeroed_vec(words) },
        }
    }

    /// The address of the first word of the bitmap.
    pub fn base_address(&self) -> Address {
        Address::from_ptr(self.words.as_ptr())
    }

    /// Is `addr` in the range this bitmap covers?
    pub fn covers(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    fn locate(&self, addr: Address) -> (&AtomicUsize, usize) {
        debug_assert!(self.covers(addr), "{} is not covered by the bitmap", addr);
        let granule = (addr - self.start) >> LOG_MIN_OBJECT_SIZE;
        let word = &self.words[granule >> LOG_BITS_IN_WORD];
        (word, 1usize << (granule & (BITS_IN_WORD - 1)))
    }

    pub fn is_set(&self, addr: Address) -> bool {
        let (word, mask) = self.locate(addr);
        word.load(Ordering::SeqCst) & mask != 0
    }

    pub fn set(&self, addr: Address) {
        let (word, mask) = self.locate(addr);
        word.fetch_or(mask, Ordering::SeqCst);
    }

    pub fn clear(&self, addr: Address) {
        let (word, mask) = self.locate(addr);
        word.fetch_and(!mask, Ordering::SeqCst);
    }

    /// Set the bit. Returns true if this call changed it from 0 to 1.
    pub fn test_and_set(&self, addr: Address) -> bool {
        let (word, mask) = self.locate(addr);
        word.fetch_or(mask, Ordering::SeqCst) & mask == 0
    }

    /// Clear the bit. Returns true if this call changed it from 1 to 0.
    pub fn test_and_clear(&self, addr: Address) -> bool {
        let (word, mask) = self.locate(addr);
        word.fetch_and(!mask, Ordering::SeqCst) & mask != 0
    }

    /// Clear all the bits for `[start, end)`. Both ends must be granule aligned.
    pub fn clear_range(&self, start: Address, end: Address) {
        let mut cursor = start;
        while cursor < end {
            let granule = (cursor - self.start) >> LOG_MIN_OBJECT_SIZE;
            let bit = granule & (BITS_IN_WORD - 1);
            let remaining = (end - cursor) >> LOG_MIN_OBJECT_SIZE;
            if bit == 0 && remaining >= BITS_IN_WORD {
                self.words[granule >> LOG_BITS_IN_WORD].store(0, Ordering::SeqCst);
                cursor += BITS_IN_WORD << LOG_MIN_OBJECT_SIZE;
            } else {
                self.clear(cursor);
                cursor += MIN_OBJECT_SIZE;
            }
        }
    }

    /// Visit the address of every set bit in `[start, end)`, in address order.
    pub fn for_each_set<F: FnMut(Address)>(&self, start: Address, end: Address, mut f: F) {
        let first = (start - self.start) >> LOG_MIN_OBJECT_SIZE;
        let last = (end - self.start) >> LOG_MIN_OBJECT_SIZE;
        let mut granule = first;
        while granule < last {
            let word_index = granule >> LOG_BITS_IN_WORD;
            let mut bits = self.words[word_index].load(Ordering::SeqCst);
            // Drop the bits below `granule` in the first word.
            bits &= usize::MAX << (granule & (BITS_IN_WORD - 1));
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                let g = (word_index << LOG_BITS_IN_WORD) + bit;
                if g >= last {
                    return;
                }
                f(self.start + (g << LOG_MIN_OBJECT_SIZE));
                bits &= bits - 1;
            }
            granule = (word_index + 1) << LOG_BITS_IN_WORD;
        }
    }

    /// Is any bit in `[start, end)` set?
    pub fn any_set(&self, start: Address, end: Address) -> bool {
        let mut found = false;
        self.for_each_set(start, end, |_| found = true);
        found
    }
}
