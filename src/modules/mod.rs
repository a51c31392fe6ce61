//! PE module loading, export/section lookup, and RTTI object resolution.

pub mod export;
pub mod module;
pub mod object;
pub mod section;

pub use export::Export;
pub use module::Module;
pub use object::{ClassHierarchyDescriptor, CompleteObjectLocator, Object, TypeDescriptor, COL_SIGNATURE_REV1};
pub use section::Section;
