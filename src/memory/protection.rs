//! Page protection flags.

use windows::Win32::System::Memory::{
    PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD,
    PAGE_NOACCESS, PAGE_NOCACHE, PAGE_PROTECTION_FLAGS, PAGE_READONLY, PAGE_READWRITE,
    PAGE_TARGETS_INVALID, PAGE_TARGETS_NO_UPDATE, PAGE_WRITECOMBINE, PAGE_WRITECOPY,
};

/// A single named protection constant, as reported by `VirtualQueryEx`/accepted by
/// `VirtualProtectEx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protection {
    NoAccess,
    ReadOnly,
    ReadWrite,
    WriteCopy,
    Execute,
    ExecuteRead,
    ExecuteReadWrite,
    ExecuteWriteCopy,
    Guard,
    NoCache,
    WriteCombine,
    TargetsInvalid,
    TargetsNoUpdate,
}

impl Protection {
    const ALL: [(Protection, u32); 13] = [
        (Protection::NoAccess, PAGE_NOACCESS.0),
        (Protection::ReadOnly, PAGE_READONLY.0),
        (Protection::ReadWrite, PAGE_READWRITE.0),
        (Protection::WriteCopy, PAGE_WRITECOPY.0),
        (Protection::Execute, PAGE_EXECUTE.0),
        (Protection::ExecuteRead, PAGE_EXECUTE_READ.0),
        (Protection::ExecuteReadWrite, PAGE_EXECUTE_READWRITE.0),
        (Protection::ExecuteWriteCopy, PAGE_EXECUTE_WRITECOPY.0),
        (Protection::Guard, PAGE_GUARD.0),
        (Protection::NoCache, PAGE_NOCACHE.0),
        (Protection::WriteCombine, PAGE_WRITECOMBINE.0),
        (Protection::TargetsInvalid, PAGE_TARGETS_INVALID.0),
        (Protection::TargetsNoUpdate, PAGE_TARGETS_NO_UPDATE.0),
    ];

    fn bit(self) -> u32 {
        Self::ALL.iter().find(|(p, _)| *p == self).unwrap().1
    }

    fn name(self) -> &'static str {
        match self {
            Protection::NoAccess => "noaccess",
            Protection::ReadOnly => "readonly",
            Protection::ReadWrite => "readwrite",
            Protection::WriteCopy => "writecopy",
            Protection::Execute => "execute",
            Protection::ExecuteRead => "execute_read",
            Protection::ExecuteReadWrite => "execute_readwrite",
            Protection::ExecuteWriteCopy => "execute_writecopy",
            Protection::Guard => "guard",
            Protection::NoCache => "nocache",
            Protection::WriteCombine => "writecombine",
            Protection::TargetsInvalid => "targets_invalid",
            Protection::TargetsNoUpdate => "targets_no_update",
        }
    }
}

/// A bitset of `Protection` flags, as returned by `MEMORY_BASIC_INFORMATION::Protect` (which can
/// combine an access level with modifier bits such as `PAGE_GUARD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionFlags {
    bits: u32,
}

impl ProtectionFlags {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn from_raw(raw: PAGE_PROTECTION_FLAGS) -> Self {
        Self { bits: raw.0 }
    }

    pub fn to_raw(self) -> PAGE_PROTECTION_FLAGS {
        PAGE_PROTECTION_FLAGS(self.bits)
    }

    pub fn single(protection: Protection) -> Self {
        Self {
            bits: protection.bit(),
        }
    }

    pub fn add(mut self, protection: Protection) -> Self {
        self.bits |= protection.bit();
        self
    }

    pub fn remove(mut self, protection: Protection) -> Self {
        self.bits &= !protection.bit();
        self
    }

    pub fn has(self, protection: Protection) -> bool {
        self.bits & protection.bit() != 0
    }

    pub fn bits(self) -> u32 {
        self.bits
    }

    /// True for any of the writable access levels (`readwrite`, `writecopy`,
    /// `execute_readwrite`, `execute_writecopy`).
    pub fn is_writable(self) -> bool {
        self.has(Protection::ReadWrite)
            || self.has(Protection::WriteCopy)
            || self.has(Protection::ExecuteReadWrite)
            || self.has(Protection::ExecuteWriteCopy)
    }

    /// True for any of the executable access levels.
    pub fn is_executable(self) -> bool {
        self.has(Protection::Execute)
            || self.has(Protection::ExecuteRead)
            || self.has(Protection::ExecuteReadWrite)
            || self.has(Protection::ExecuteWriteCopy)
    }
}

impl std::fmt::Display for ProtectionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = Protection::ALL
            .iter()
            .filter(|(p, _)| self.has(*p))
            .map(|(p, _)| p.name())
            .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_round_trips_through_raw() {
        let flags = ProtectionFlags::single(Protection::ReadWrite);
        assert_eq!(flags.to_raw().0, PAGE_READWRITE.0);
        assert!(flags.has(Protection::ReadWrite));
        assert!(!flags.has(Protection::ReadOnly));
    }

    #[test]
    fn add_and_remove_combine_flags() {
        let flags = ProtectionFlags::single(Protection::ReadWrite).add(Protection::Guard);
        assert!(flags.has(Protection::ReadWrite));
        assert!(flags.has(Protection::Guard));

        let flags = flags.remove(Protection::Guard);
        assert!(!flags.has(Protection::Guard));
    }

    #[test]
    fn display_joins_with_pipes() {
        let flags = ProtectionFlags::single(Protection::ExecuteReadWrite).add(Protection::Guard);
        let text = flags.to_string();
        assert!(text.contains("execute_readwrite"));
        assert!(text.contains("guard"));
        assert!(text.contains('|'));
    }

    #[test]
    fn empty_displays_none() {
        assert_eq!(ProtectionFlags::empty().to_string(), "none");
    }

    #[test]
    fn is_writable_covers_all_writable_levels() {
        assert!(ProtectionFlags::single(Protection::ReadWrite).is_writable());
        assert!(ProtectionFlags::single(Protection::WriteCopy).is_writable());
        assert!(ProtectionFlags::single(Protection::ExecuteReadWrite).is_writable());
        assert!(!ProtectionFlags::single(Protection::ReadOnly).is_writable());
    }

    #[test]
    fn is_executable_covers_all_executable_levels() {
        assert!(ProtectionFlags::single(Protection::Execute).is_executable());
        assert!(ProtectionFlags::single(Protection::ExecuteRead).is_executable());
        assert!(!ProtectionFlags::single(Protection::ReadWrite).is_executable());
    }
}
