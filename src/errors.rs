//! Error types shared across the crate.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by process, memory, module, and pattern operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A Win32 API call failed. `code` is the raw `GetLastError` value.
    #[error("os call failed ({code}): {message}")]
    OsFailure { code: u32, message: String },

    /// A process, module, export, or section could not be located by the given identifier.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A caller-supplied argument was structurally invalid (e.g. malformed pattern text).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Restoring the original page protection on scope exit failed. Never swallowed: the
    /// caller's assumptions about the region's protection may no longer hold.
    #[error("failed to restore original page protection ({code})")]
    ProtectionRestoreFailed { code: u32 },

    /// Transparent wrapper so call sites using the `windows` crate can use `?` directly.
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

impl Error {
    pub(crate) fn os_failure(context: &str, err: windows::core::Error) -> Self {
        Error::OsFailure {
            code: err.code().0 as u32,
            message: format!("{context}: {err}"),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }
}
