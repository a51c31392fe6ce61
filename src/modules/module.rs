//! A loaded PE module: header parsing, export/section lookup, and RTTI object discovery.

use std::sync::Arc;

use windows::Win32::System::Diagnostics::Debug::{
    IMAGE_DIRECTORY_ENTRY_EXPORT, IMAGE_EXPORT_DIRECTORY, IMAGE_NT_HEADERS64, IMAGE_SECTION_HEADER,
};
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::SystemServices::IMAGE_DOS_HEADER;

use crate::core::handle::Handle;
use crate::core::snapshot::ModuleEntry;
use crate::errors::Result;
use crate::memory::memory_factory::MemoryFactory;
use crate::memory::view::MemoryView;
use crate::modules::export::Export;
use crate::modules::object::{CompleteObjectLocator, Object, COL_SIGNATURE_REV1};
use crate::modules::section::Section;
use crate::patterns::pattern::Pattern;

/// The first page of a module's image, large enough to hold the DOS header, NT headers and
/// section table for any module this crate targets.
const HEADER_BUFFER_SIZE: usize = 0x1000;

/// A module loaded into a process's address space.
#[derive(Clone)]
pub struct Module {
    factory: Arc<MemoryFactory>,
    entry: ModuleEntry,
    header: Vec<u8>,
    entry_point_rva: usize,
}

impl Module {
    pub(crate) fn load(factory: Arc<MemoryFactory>, process_handle: &Handle, entry: ModuleEntry) -> Result<Self> {
        let mut header = vec![0u8; HEADER_BUFFER_SIZE];
        factory.read(entry.base_address, &mut header)?;

        let mut info = MODULEINFO::default();
        unsafe {
            GetModuleInformation(
                process_handle.native,
                windows::Win32::Foundation::HMODULE(entry.base_address as *mut _),
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
        }
        .map_err(|e| crate::errors::Error::os_failure("GetModuleInformation", e))?;

        let entry_point_rva = (info.EntryPoint as usize).saturating_sub(entry.base_address);

        Ok(Self {
            factory,
            entry,
            header,
            entry_point_rva,
        })
    }

    pub fn address(&self) -> usize {
        self.entry.base_address
    }

    pub fn size(&self) -> usize {
        self.entry.base_size
    }

    pub fn entry_point(&self) -> usize {
        self.address() + self.entry_point_rva
    }

    /// Lowercased module name, matching the convention used when looking modules up by name.
    pub fn name(&self) -> String {
        self.entry.name.to_lowercase()
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub(crate) fn factory(&self) -> &Arc<MemoryFactory> {
        &self.factory
    }

    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.factory.read(self.address() + offset, buffer)
    }

    fn dos_header(&self) -> &IMAGE_DOS_HEADER {
        unsafe { &*(self.header.as_ptr() as *const IMAGE_DOS_HEADER) }
    }

    fn nt_headers(&self) -> &IMAGE_NT_HEADERS64 {
        let offset = self.dos_header().e_lfanew as usize;
        unsafe { &*(self.header.as_ptr().add(offset) as *const IMAGE_NT_HEADERS64) }
    }

    fn section_headers(&self) -> &[IMAGE_SECTION_HEADER] {
        let nt = self.nt_headers();
        let count = nt.FileHeader.NumberOfSections as usize;
        let nt_offset = self.dos_header().e_lfanew as usize;
        let optional_header_size = nt.FileHeader.SizeOfOptionalHeader as usize;
        let first_section_offset =
            nt_offset + std::mem::offset_of!(IMAGE_NT_HEADERS64, OptionalHeader) + optional_header_size;

        unsafe {
            std::slice::from_raw_parts(
                self.header.as_ptr().add(first_section_offset) as *const IMAGE_SECTION_HEADER,
                count,
            )
        }
    }

    /// Looks up an export by name, resolving its ordinal-indexed RVA.
    pub fn fetch_export(&self, name: &str) -> Option<Export> {
        let nt = self.nt_headers();
        let directory = nt.OptionalHeader.DataDirectory[IMAGE_DIRECTORY_ENTRY_EXPORT.0 as usize];
        if directory.VirtualAddress == 0 {
            return None;
        }

        let export_dir =
            unsafe { &*(self.header.as_ptr().add(directory.VirtualAddress as usize) as *const IMAGE_EXPORT_DIRECTORY) };

        let names = unsafe {
            std::slice::from_raw_parts(
                self.header.as_ptr().add(export_dir.AddressOfNames as usize) as *const u32,
                export_dir.NumberOfNames as usize,
            )
        };
        let ordinals = unsafe {
            std::slice::from_raw_parts(
                self.header.as_ptr().add(export_dir.AddressOfNameOrdinals as usize) as *const u16,
                export_dir.NumberOfNames as usize,
            )
        };
        let functions = unsafe {
            std::slice::from_raw_parts(
                self.header.as_ptr().add(export_dir.AddressOfFunctions as usize) as *const u32,
                export_dir.NumberOfFunctions as usize,
            )
        };

        for i in 0..export_dir.NumberOfNames as usize {
            let name_ptr = unsafe { self.header.as_ptr().add(names[i] as usize) };
            let export_name = unsafe { std::ffi::CStr::from_ptr(name_ptr as *const i8) }
                .to_string_lossy()
                .into_owned();

            if export_name == name {
                let ordinal = ordinals[i] as usize;
                let rva = functions[ordinal];
                return Some(Export::new(export_name, rva, ordinal as u16));
            }
        }

        None
    }

    /// Looks up an export by name, returning `NotFound` rather than `None`. `std::ops::Index`
    /// isn't a fit here: resolution walks the export directory fresh each call and produces an
    /// owned `Export` with no storage inside `Module` to borrow from, so a named fallible method
    /// keeps the lookup in the same `Result` chain as every other by-name lookup in this crate.
    pub fn export(&self, name: &str) -> Result<Export> {
        self.fetch_export(name)
            .ok_or_else(|| crate::errors::Error::not_found(format!("export {name}")))
    }

    /// Looks up a section by its 8-byte name (e.g. `.text`, `.rdata`).
    pub fn fetch_section(&self, name: &str) -> Option<Section> {
        for header in self.section_headers() {
            let raw_name = &header.Name;
            let nul = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
            let section_name = String::from_utf8_lossy(&raw_name[..nul]);

            if section_name == name {
                let virtual_size = unsafe { header.Misc.VirtualSize };
                let size = virtual_size.max(header.SizeOfRawData) as usize;
                return Some(Section::new(
                    Arc::clone(&self.factory),
                    section_name.into_owned(),
                    self.address() + header.VirtualAddress as usize,
                    size,
                    header.Characteristics.0,
                ));
            }
        }
        None
    }

    /// Walks the module's `.data`/`.rdata` sections to resolve every RTTI object whose mangled
    /// type name matches `mangled` (typically a `.?AV`/`.?AU` prefixed string).
    ///
    /// The scan proceeds exactly as the underlying MSVC RTTI layout dictates: find the mangled
    /// name string in `.data`, back up two pointer-widths to its `TypeDescriptor`, find every
    /// cross-reference to that descriptor's RVA in `.rdata`, validate each as a
    /// `CompleteObjectLocator` by its signature, then find that locator's own address referenced
    /// in `.rdata` to land on the vtable slot immediately after it.
    pub fn fetch_objects(&self, mangled: &str) -> Result<Vec<Object>> {
        let data = match self.fetch_section(".data") {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        let rdata = match self.fetch_section(".rdata") {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };

        let data_view = MemoryView::Section(data);
        let rdata_view = MemoryView::Section(rdata.clone());

        let name_pattern = Pattern::from_bytes(mangled.as_bytes());
        let name_match = match data_view.find(&name_pattern, 0)? {
            Some(offset) => data_view.address() + offset,
            None => return Ok(Vec::new()),
        };
        log::trace!("{mangled} mangled name found at {name_match:#x}");

        let ptr_size = std::mem::size_of::<usize>();
        let type_descriptor_address = name_match - ptr_size * 2;
        let type_descriptor_rva = (type_descriptor_address - self.address()) as i32;

        let rva_pattern = Pattern::from_bytes(&type_descriptor_rva.to_le_bytes());
        let mut objects = Vec::new();

        for rva_offset in rdata_view.find_all(&rva_pattern)? {
            let reference_address = rdata_view.address() + rva_offset;
            let col_address = reference_address - std::mem::size_of::<u32>() * 3;

            let mut col_bytes = [0u8; std::mem::size_of::<CompleteObjectLocator>()];
            if self.factory.read(col_address, &mut col_bytes).is_err() {
                continue;
            }
            let col = unsafe { std::ptr::read_unaligned(col_bytes.as_ptr() as *const CompleteObjectLocator) };

            if col.signature != COL_SIGNATURE_REV1 {
                continue;
            }

            let col_address_pattern = Pattern::from_bytes(&col_address.to_le_bytes());
            let col_reference = match rdata_view.find(&col_address_pattern, 0)? {
                Some(offset) => rdata_view.address() + offset,
                None => continue,
            };

            let vtable_address = col_reference + ptr_size;
            log::debug!("resolved vtable for {mangled} at {vtable_address:#x}");
            objects.push(Object::new(self.clone(), vtable_address, col));
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    #[test]
    #[ignore = "requires a live Windows process table"]
    fn main_module_parses_its_own_headers() {
        let process = Process::current().unwrap();
        let module = process.main_module().unwrap().expect("process has a main module");

        assert!(module.size() > 0);
        assert!(module.fetch_section(".text").is_some());
        assert!(module.entry_point() >= module.address());
        assert!(module.entry_point() < module.address() + module.size());
    }

    #[test]
    #[ignore = "requires a live Windows process table"]
    fn fetch_section_is_case_sensitive_and_absent_by_default() {
        let process = Process::current().unwrap();
        let module = process.main_module().unwrap().expect("process has a main module");

        assert!(module.fetch_section(".TEXT").is_none());
        assert!(module.fetch_section(".nonexistent").is_none());
    }
}
