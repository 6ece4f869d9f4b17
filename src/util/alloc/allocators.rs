use std::mem::size_of;

use memoffset::offset_of;
use strum_macros::EnumIter;

use crate::plan::Mutator;
use crate::util::alloc::{Allocator, BumpAllocator, BumpTarget, LargeObjectAllocator};
use crate::util::VMMutatorThread;
use crate::MMTK;

pub(crate) const MAX_BUMP_ALLOCATORS: usize = 2;
pub(crate) const MAX_LARGE_OBJECT_ALLOCATORS: usize = 1;

/// The bump allocator for the default space.
pub(crate) const DEFAULT_BUMP_ALLOCATOR: u8 = 0;
/// The bump allocator for the immortal space.
pub(crate) const IMMORTAL_BUMP_ALLOCATOR: u8 = 1;

// The allocators set owned by each mutator. This struct is part of the Mutator struct, and it is
// fixed-sized so that hosts can mirror the layout of the bump allocators for their fast paths.
#[repr(C)]
pub struct Allocators {
    pub bump_pointer: [BumpAllocator; MAX_BUMP_ALLOCATORS],
    pub large_object: [LargeObjectAllocator; MAX_LARGE_OBJECT_ALLOCATORS],
}

impl Allocators {
    pub fn new(mutator_tls: VMMutatorThread, mmtk: &'static MMTK) -> Self {
        Allocators {
            bump_pointer: [
                BumpAllocator::new(mutator_tls.0, BumpTarget::Default, mmtk),
                BumpAllocator::new(mutator_tls.0, BumpTarget::Immortal, mmtk),
            ],
            large_object: [LargeObjectAllocator::new(mutator_tls.0, mmtk)],
        }
    }

    fn unsupported(selector: AllocatorSelector) -> ! {
        panic!("Allocator {:?} is not provided by this collector", selector)
    }

    pub fn get_allocator(&self, selector: AllocatorSelector) -> &dyn Allocator {
        match selector {
            AllocatorSelector::BumpPointer(index) if (index as usize) < MAX_BUMP_ALLOCATORS => {
                &self.bump_pointer[index as usize]
            }
            AllocatorSelector::LargeObject(index)
                if (index as usize) < MAX_LARGE_OBJECT_ALLOCATORS =>
            {
                &self.large_object[index as usize]
            }
            _ => Self::unsupported(selector),
        }
    }

    pub fn get_allocator_mut(&mut self, selector: AllocatorSelector) -> &mut dyn Allocator {
        match selector {
            AllocatorSelector::BumpPointer(index) if (index as usize) < MAX_BUMP_ALLOCATORS => {
                &mut self.bump_pointer[index as usize]
            }
            AllocatorSelector::LargeObject(index)
                if (index as usize) < MAX_LARGE_OBJECT_ALLOCATORS =>
            {
                &mut self.large_object[index as usize]
            }
            _ => Self::unsupported(selector),
        }
    }

    /// Retire every thread-local buffer.
    pub fn retire_all(&mut self) {
        for allocator in self.bump_pointer.iter_mut() {
            allocator.retire();
        }
        for allocator in self.large_object.iter_mut() {
            allocator.retire();
        }
    }
}

// This type describes which allocator in the allocators set.
// For hosts, this type is equivalent to the following native types:
// #[repr(C)]
// struct AllocatorSelector {
//   tag: AllocatorSelectorTag,
//   payload: u8,
// }
// #[repr(u8)]
// enum AllocatorSelectorTag {
//   BumpPointer,
//   LargeObject,
//   Malloc,
//   Immix,
//   MarkCompact,
//   FreeList,
//   None,
// }
#[repr(C, u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum AllocatorSelector {
    BumpPointer(u8),
    LargeObject(u8),
    Malloc(u8),
    Immix(u8),
    MarkCompact(u8),
    FreeList(u8),
    #[default]
    None,
}

static_assertions::assert_eq_size!(AllocatorSelector, [u8; 2]);

impl AllocatorSelector {
    /// The tag of the selector, as seen by the host.
    pub const fn tag(&self) -> u8 {
        match self {
            AllocatorSelector::BumpPointer(_) => 0,
            AllocatorSelector::LargeObject(_) => 1,
            AllocatorSelector::Malloc(_) => 2,
            AllocatorSelector::Immix(_) => 3,
            AllocatorSelector::MarkCompact(_) => 4,
            AllocatorSelector::FreeList(_) => 5,
            AllocatorSelector::None => 6,
        }
    }

    /// The index of the allocator among the allocators of the same kind. Zero for `None`.
    pub const fn index(&self) -> u8 {
        match *self {
            AllocatorSelector::BumpPointer(index)
            | AllocatorSelector::LargeObject(index)
            | AllocatorSelector::Malloc(index)
            | AllocatorSelector::Immix(index)
            | AllocatorSelector::MarkCompact(index)
            | AllocatorSelector::FreeList(index) => index,
            AllocatorSelector::None => 0,
        }
    }

    /// Encode as `(tag, index)`.
    pub const fn to_raw(self) -> (u8, u8) {
        (self.tag(), self.index())
    }

    /// Decode `(tag, index)`. Returns `None` for an unknown tag.
    pub const fn from_raw(tag: u8, index: u8) -> Option<Self> {
        Some(match tag {
            0 => AllocatorSelector::BumpPointer(index),
            1 => AllocatorSelector::LargeObject(index),
            2 => AllocatorSelector::Malloc(index),
            3 => AllocatorSelector::Immix(index),
            4 => AllocatorSelector::MarkCompact(index),
            5 => AllocatorSelector::FreeList(index),
            6 => AllocatorSelector::None,
            _ => return None,
        })
    }

    /// Check that the encoding agrees with the in-memory layout hosts rely on, and that every
    /// selector decodes back to itself. Panics on mismatch.
    pub fn verify_encoding() {
        use strum::IntoEnumIterator;
        for (expected_tag, variant) in AllocatorSelector::iter().enumerate() {
            for index in [0u8, 1, 5, u8::MAX] {
                let selector = match variant {
                    AllocatorSelector::None => AllocatorSelector::None,
                    _ => AllocatorSelector::from_raw(variant.tag(), index).unwrap(),
                };
                let (tag, raw_index) = selector.to_raw();
                assert_eq!(
                    tag as usize, expected_tag,
                    "{:?} has tag {}, expected {}",
                    selector, tag, expected_tag
                );
                // The first byte of the value is the tag, and the second byte is the index.
                let bytes = &selector as *const AllocatorSelector as *const u8;
                let memory_tag = unsafe { bytes.read() };
                assert_eq!(memory_tag, tag, "{:?} is laid out with tag {}", selector, memory_tag);
                if selector != AllocatorSelector::None {
                    let memory_index = unsafe { bytes.add(1).read() };
                    assert_eq!(memory_index, index, "{:?} is laid out with index {}", selector, memory_index);
                    assert_eq!(raw_index, index);
                }
                assert_eq!(AllocatorSelector::from_raw(tag, raw_index), Some(selector));
            }
        }
        assert_eq!(AllocatorSelector::from_raw(7, 0), None);
    }
}

/// Where the fast-path fields of an allocator are, as byte offsets from the start of a
/// [`Mutator`]. A host compiler uses this to inline allocation.
#[repr(C, u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AllocatorInfo {
    BumpPointer {
        limit_offset: usize,
        cursor_offset: usize,
    },
    /// The allocator exists but has no fast path a host can inline.
    Unimplemented,
    /// No such allocator.
    #[default]
    None,
}

impl AllocatorInfo {
    /// Return an AllocatorInfo for the given allocator selector.
    pub fn new(selector: AllocatorSelector) -> AllocatorInfo {
        match selector {
            AllocatorSelector::BumpPointer(index) if (index as usize) < MAX_BUMP_ALLOCATORS => {
                let base_offset = offset_of!(Mutator, allocators)
                    + offset_of!(Allocators, bump_pointer)
                    + size_of::<BumpAllocator>() * index as usize;
                AllocatorInfo::BumpPointer {
                    limit_offset: base_offset + offset_of!(BumpAllocator, limit),
                    cursor_offset: base_offset + offset_of!(BumpAllocator, cursor),
                }
            }
            AllocatorSelector::LargeObject(index)
                if (index as usize) < MAX_LARGE_OBJECT_ALLOCATORS =>
            {
                AllocatorInfo::Unimplemented
            }
            _ => AllocatorInfo::None,
        }
    }
}
