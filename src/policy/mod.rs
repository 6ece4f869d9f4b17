//! Memory policies that can be used for spaces.

/// The trait all the spaces implement.
pub mod space;

/// Evacuating space with pinning and opportunistic in-place survival.
pub mod copyspace;
/// Space for objects that are never reclaimed.
pub mod immortalspace;
/// Non-moving space for large objects, one run of blocks per object.
pub mod largeobjectspace;
