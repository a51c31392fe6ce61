//! OS-facing primitives: handle ownership and ToolHelp snapshot iteration.

pub mod handle;
pub mod snapshot;

pub use handle::Handle;
pub use snapshot::{ModuleEntry, ModuleSnapshot, ProcessEntry, ProcessSnapshot, ThreadEntry, ThreadSnapshot};
