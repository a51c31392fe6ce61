//! MSVC RTTI structures and the vtable-from-mangled-name resolution walk.

use windows::Win32::System::Diagnostics::Debug::UnDecorateSymbolName;

use crate::errors::Result;
use crate::memory::region::Region;
use crate::modules::module::Module;

/// The maximum length of a buffer used to read RTTI structures and demangle names, mirroring
/// the C runtime's `BUFSIZ`.
const RTTI_BUFFER_SIZE: usize = 512;

/// An MSVC `TypeDescriptor`: vtable pointer for `type_info`, an unused spare field, and the
/// mangled type name as a NUL-terminated string.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub type_info_vftable: usize,
    pub spare: usize,
    pub name: String,
}

/// An MSVC `CompleteObjectLocator`. All offsets (except `signature`/`offset`/`cd_offset`) are
/// relative to the owning module's base address.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CompleteObjectLocator {
    pub signature: u32,
    pub offset: u32,
    pub cd_offset: u32,
    pub type_descriptor_offset: i32,
    pub class_descriptor_offset: i32,
    pub self_offset: i32,
}

/// Signature value identifying a 64-bit `CompleteObjectLocator` (`COL_SIG_REV1`).
pub const COL_SIGNATURE_REV1: u32 = 1;

/// An MSVC `ClassHierarchyDescriptor`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ClassHierarchyDescriptor {
    pub signature: u32,
    pub attributes: u32,
    pub num_base_classes: u32,
    pub base_classes_offset: usize,
}

/// A resolved class/struct instance located via RTTI: its vtable address and the complete
/// object locator that pointed to it.
#[derive(Clone)]
pub struct Object {
    module: Module,
    vtable_address: usize,
    col: CompleteObjectLocator,
}

impl Object {
    pub(crate) fn new(module: Module, vtable_address: usize, col: CompleteObjectLocator) -> Self {
        Self {
            module,
            vtable_address,
            col,
        }
    }

    /// Address of the resolved vtable.
    pub fn vtable(&self) -> usize {
        self.vtable_address
    }

    pub fn complete_object_locator(&self) -> CompleteObjectLocator {
        self.col
    }

    /// Reads the type descriptor this object's complete object locator points to.
    pub fn type_descriptor(&self) -> Result<TypeDescriptor> {
        let offset = self.col.type_descriptor_offset as usize;
        let mut buffer = vec![0u8; RTTI_BUFFER_SIZE];
        self.module.read(offset, &mut buffer)?;

        let vftable = usize::from_le_bytes(buffer[0..8].try_into().unwrap());
        let spare = usize::from_le_bytes(buffer[8..16].try_into().unwrap());
        let name_bytes = &buffer[16..];
        let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();

        Ok(TypeDescriptor {
            type_info_vftable: vftable,
            spare,
            name,
        })
    }

    /// Reads the class hierarchy descriptor referenced by this object's complete object locator
    /// (base class count and the image-relative offset to the base class array).
    pub fn class_hierarchy_descriptor(&self) -> Result<ClassHierarchyDescriptor> {
        let offset = self.col.class_descriptor_offset as usize;
        let mut buffer = [0u8; std::mem::size_of::<ClassHierarchyDescriptor>()];
        self.module.read(offset, &mut buffer)?;
        Ok(unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const ClassHierarchyDescriptor) })
    }

    /// Searches the whole address space for a live instance of this object: a committed, private,
    /// read-write region containing this vtable's address as its first 8 bytes. `region_filter`
    /// narrows the candidate regions beyond the type/state/protection check baked into the
    /// search; pass `|_| true` to accept every eligible region. `parallel` selects a concurrent,
    /// cooperatively-cancelled scan across regions versus a sequential one on the caller's
    /// thread.
    pub fn find_instance(
        &self,
        region_filter: impl Fn(&Region) -> bool + Sync,
        parallel: bool,
    ) -> Result<Option<usize>> {
        self.module.factory().find_instance_of(
            0,
            usize::MAX,
            &self.vtable_address.to_le_bytes(),
            region_filter,
            parallel,
        )
    }

    /// Demangled name of the type, via `UnDecorateSymbolName`. Falls back to the raw mangled
    /// name if demangling fails.
    pub fn name(&self) -> Result<String> {
        let type_descriptor = self.type_descriptor()?;

        let mangled = std::ffi::CString::new(type_descriptor.name.clone())
            .unwrap_or_else(|_| std::ffi::CString::new("").unwrap());
        let mut demangled = vec![0u8; RTTI_BUFFER_SIZE];

        let written = unsafe {
            UnDecorateSymbolName(
                windows::core::PCSTR(mangled.as_ptr() as *const u8),
                &mut demangled,
                windows::Win32::System::Diagnostics::Debug::UNDNAME_NAME_ONLY,
            )
        };

        if written == 0 {
            Ok(type_descriptor.name)
        } else {
            let nul = demangled.iter().position(|&b| b == 0).unwrap_or(demangled.len());
            Ok(String::from_utf8_lossy(&demangled[..nul]).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_signature_constant_matches_rev1() {
        assert_eq!(COL_SIGNATURE_REV1, 1);
    }
}
