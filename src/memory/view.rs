//! The common surface shared by modules, sections and raw regions: a readable/writable, scannable
//! range of a process's address space.

use std::sync::Arc;

use crate::errors::Result;
use crate::memory::memory_factory::MemoryFactory;
use crate::memory::protection::ProtectionFlags;
use crate::memory::protection_operation::ScopedProtection;
use crate::memory::region::RegionSequence;
use crate::modules::module::Module;
use crate::modules::section::Section;
use crate::patterns::pattern::Pattern;
use crate::patterns::scanner::default_scanner;

/// A named, addressable range backed by one of: a loaded module, a PE section within a module,
/// or a raw enumerated region. Kept as a sum type rather than a trait object hierarchy: the set
/// of backings is closed and every variant carries the same `(address, size, factory)` shape.
#[derive(Clone)]
pub enum MemoryView {
    Module(Module),
    Section(Section),
    Region { address: usize, size: usize, factory: Arc<MemoryFactory> },
}

impl MemoryView {
    pub fn address(&self) -> usize {
        match self {
            MemoryView::Module(m) => m.address(),
            MemoryView::Section(s) => s.address(),
            MemoryView::Region { address, .. } => *address,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            MemoryView::Module(m) => m.size(),
            MemoryView::Section(s) => s.size(),
            MemoryView::Region { size, .. } => *size,
        }
    }

    pub fn end(&self) -> usize {
        self.address() + self.size()
    }

    fn factory(&self) -> &Arc<MemoryFactory> {
        match self {
            MemoryView::Module(m) => m.factory(),
            MemoryView::Section(s) => s.factory(),
            MemoryView::Region { factory, .. } => factory,
        }
    }

    /// Inclusive lower bound, exclusive upper bound.
    pub fn contains(&self, address: usize) -> bool {
        address >= self.address() && address < self.end()
    }

    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.factory().read(self.address() + offset, buffer)
    }

    pub fn read_value<T: Copy>(&self, offset: usize) -> Result<T> {
        self.factory().read_value(self.address() + offset)
    }

    pub fn write(&self, offset: usize, buffer: &[u8]) -> Result<()> {
        self.factory().write(self.address() + offset, buffer)
    }

    pub fn write_value<T: Copy>(&self, offset: usize, value: &T) -> Result<()> {
        self.factory().write_value(self.address() + offset, value)
    }

    pub fn protect(&self, new_flags: ProtectionFlags) -> Result<ScopedProtection> {
        self.factory().protect(self.address(), self.size(), new_flags)
    }

    /// Regions covered by this view's address range.
    pub fn regions(&self) -> RegionSequence {
        self.factory().regions(self.address(), self.end())
    }

    fn is_valid_region(region: &crate::memory::region::Region, view_end: usize) -> bool {
        use crate::memory::region::RegionState;
        region.base_address < view_end
            && region.state == RegionState::Commit
            && !region.protection.has(crate::memory::protection::Protection::NoAccess)
            && !region.protection.has(crate::memory::protection::Protection::Guard)
    }

    /// Finds the first match of `pattern` at or after `from_offset` (relative to this view's
    /// base address), scanning region by region.
    ///
    /// A region that fails the validity check (freed, decommitted, guarded or inaccessible) is
    /// skipped rather than treated as the end of the view: only running past `end()` stops the
    /// search. This is deliberately more permissive than simply scanning contiguous bytes, since
    /// unrelated unmapped gaps between regions are common and do not indicate the view itself
    /// has ended.
    pub fn find(&self, pattern: &Pattern, from_offset: usize) -> Result<Option<usize>> {
        let scanner = default_scanner(pattern);
        let view_end = self.end();
        let from_address = self.address() + from_offset;

        for region in self.regions() {
            if region.base_address >= view_end {
                break;
            }
            if !Self::is_valid_region(&region, view_end) {
                continue;
            }

            let scan_start = region.base_address.max(self.address());
            let scan_end = region.end().min(view_end);
            if scan_start >= scan_end {
                continue;
            }

            let mut buffer = vec![0u8; scan_end - scan_start];
            if self.factory().read(scan_start, &mut buffer).is_err() {
                continue;
            }

            let search_from = from_address.saturating_sub(scan_start);
            if search_from >= buffer.len() {
                continue;
            }

            if let Some(offset) = scanner.find(&buffer, pattern, search_from) {
                return Ok(Some(scan_start + offset - self.address()));
            }
        }

        Ok(None)
    }

    /// Finds every match of `pattern` within this view, in ascending order.
    pub fn find_all(&self, pattern: &Pattern) -> Result<Vec<usize>> {
        let mut results = Vec::new();
        let mut offset = 0;

        while let Some(found) = self.find(pattern, offset)? {
            results.push(found);
            offset = found + pattern.len().max(1);
        }

        Ok(results)
    }
}
