//! The host-facing side of the binding: the upcalls a host implements, and the closures and
//! slots that carry references between the host and the collector.
//!
//! A host provides a single [`Upcalls`] implementation. The collector calls it to stop and resume
//! mutators, to scan roots and objects, and to report out-of-memory and finalization events.

pub mod closure;
pub mod reference_glue;
pub mod slot;
mod upcalls;

pub use self::closure::{BufferClosure, RawBufferClosure, RootsClosure, SlotsClosure};
pub use self::reference_glue::ReferenceQuery;
pub use self::slot::Slot;
pub use self::upcalls::{GCThreadContext, Upcalls};

#[cfg(test)]
mod tests;
