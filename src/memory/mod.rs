//! Process address-space primitives: protection, regions, views and cross-process I/O.

pub mod memory_factory;
pub mod protection;
pub mod protection_operation;
pub mod region;
pub mod view;

pub use memory_factory::{MemoryFactory, MemoryType, WorkingSetInfo};
pub use protection::{Protection, ProtectionFlags};
pub use protection_operation::ScopedProtection;
pub use region::{Region, RegionSequence, RegionState, RegionType};
pub use view::MemoryView;
