//! The reference collector, and the state each mutator keeps for it.

mod global;
pub use global::AllocationSemantics;
pub use global::CollectionState;
pub use global::Plan;

pub(crate) mod gc_requester;

mod mutator_context;
pub use mutator_context::Mutator;
pub use mutator_context::MutatorHandle;
pub use mutator_context::MutatorRegistry;
pub use mutator_context::ALLOCATOR_MAPPING;

mod tracing;
pub use tracing::{ObjectQueue, VectorObjectQueue, VectorQueue};
