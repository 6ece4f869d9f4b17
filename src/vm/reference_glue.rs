//! Queries the host can make about objects while the world is stopped, between the end of the
//! transitive closure and the release of dead objects.

use crate::util::ObjectReference;

/// Liveness and forwarding information of the current collection. An instance is handed to
/// [`crate::vm::Upcalls::weak_ref_stack_nullify`], where the host clears or updates its weak
/// references.
pub trait ReferenceQuery {
    /// Is the object reachable in this collection? Objects outside the collected heap are
    /// always considered live.
    fn is_live(&self, object: ObjectReference) -> bool;

    /// The new address of the object if it was moved in this collection, or `None` if it was not
    /// moved.
    fn get_forwarded_object(&self, object: ObjectReference) -> Option<ObjectReference>;

    /// The address a weak reference to `object` should hold after this collection: the new
    /// address if the object is live, or null if it is dead.
    fn resolve_weak(&self, object: ObjectReference) -> ObjectReference {
        if object.is_null() || !self.is_live(object) {
            ObjectReference::NULL
        } else {
            self.get_forwarded_object(object).unwrap_or(object)
        }
    }
}
