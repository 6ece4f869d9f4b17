use crate::util::ObjectReference;

/// The per-space part of the collector: how objects in a space are traced, what liveness means
/// for them, and what a space does at the start and end of each collection.
///
/// Every block of the heap belongs to at most one space, so the space of an object is found from
/// the state of its block.
pub trait Space: Sync + Send {
    /// The space name, for logs.
    fn name(&self) -> &'static str;

    /// Is the object live, determined by the policy? Only meaningful between the end of a
    /// transitive closure and the next collection.
    fn is_live(&self, object: ObjectReference) -> bool;

    /// Can objects in this space ever move?
    fn is_movable(&self) -> bool;

    /// Get the new address if the object was moved in the current collection.
    fn get_forwarded_object(&self, _object: ObjectReference) -> Option<ObjectReference> {
        None
    }

    /// Get ready for a collection. Called by the controller while mutators are stopped, before
    /// any object is traced.
    fn prepare(&self);

    /// Reclaim the memory of dead objects. Called after the transitive closure (including
    /// finalizer resurrection) is complete.
    fn release(&self);
}
