use crate::util::Address;

/// The address ranges the host may need to know about: the heap itself, and the base of the
/// valid-object bitmap (one bit per minimal object size, starting at `heap_start`).
///
/// A layout is created once, when the collector instance is built, and never changes afterwards.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapLayout {
    pub heap_start: Address,
    pub heap_end: Address,
    pub vo_bit_base: Address,
}

impl HeapLayout {
    /// Is the address in the heap?
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.heap_start && addr < self.heap_end
    }

    /// Bytes of address space reserved for the heap.
    pub fn reserved_bytes(&self) -> usize {
        self.heap_end - self.heap_start
    }
}
