//! A binding layer between a managed-language runtime (the host) and a garbage collector, in the
//! style of MMTk.
//!
//! The host drives the collector through [`memory_manager`] (or the process-wide [`api`]), and
//! the collector calls back into the host through the [`vm::Upcalls`] trait:
//!
//! * each host thread that allocates binds a mutator and allocates through it;
//! * when the heap is full, or the host asks, the controller thread stops the mutators through
//!   the host, the workers scan the roots and the objects through the host, and the mutators are
//!   resumed;
//! * finalizable objects, weak references and pins are reported to and requested by the host
//!   around each collection.
//!
//! Behind the binding there is a stop-the-world collector: an evacuating default space that
//! respects pins, a large object space and an immortal space, all sharing one contiguous heap.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod mmtk;
pub use mmtk::MMTKBuilder;
pub use mmtk::MMTK;

pub mod api;
mod build_info;
pub mod memory_manager;
pub mod plan;
pub mod policy;
pub mod scheduler;
pub mod util;
pub mod vm;

pub use crate::plan::{AllocationSemantics, Mutator, MutatorHandle};
pub use crate::util::alloc::{AllocationError, AllocatorSelector};
