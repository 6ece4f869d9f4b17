pub mod blockpageresource;
pub mod gc_trigger;
pub mod layout;

pub use self::blockpageresource::{BlockPageResource, BlockState};
pub use self::gc_trigger::GCTrigger;
pub use self::layout::HeapLayout;
