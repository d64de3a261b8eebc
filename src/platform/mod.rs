//! Process and socket data sources.
//!
//! The resolution pipeline only talks to [`ProcessSource`]; each platform
//! provides one implementation and [`native`] picks the right one.

use crate::error::WitrError;
use crate::types::{FileContext, ProcessRecord, ResourceContext, SocketInfo};

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod fallback;

#[cfg(test)]
pub(crate) mod fake;

/// Result of looking up who owns a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOwner {
    /// One or more owning pids, deduplicated, in ascending order.
    Owners(Vec<u32>),
    /// Nothing is bound to the port.
    NoSocket,
    /// A socket exists but its owner could not be read (usually privileges).
    OwnerUnknown,
}

/// Read-only access to the live process table.
///
/// Every call performs a fresh read; implementations must not cache across
/// calls since pids are reused.
pub trait ProcessSource: Sync {
    /// Snapshot of one process, or [`WitrError::NotFound`].
    fn get(&self, pid: u32) -> Result<ProcessRecord, WitrError>;

    /// All running processes in process-table enumeration order.
    ///
    /// Records from `list` may omit bound addresses.
    fn list(&self) -> Result<Vec<ProcessRecord>, WitrError>;

    fn owner_of(&self, port: u16) -> Result<SocketOwner, WitrError>;

    /// `KEY=value` environment entries of a process.
    fn environment(&self, pid: u32) -> Result<Vec<String>, WitrError>;

    fn socket_info(&self, _port: u16) -> Option<SocketInfo> {
        None
    }

    fn resource_context(&self, _pid: u32) -> Option<ResourceContext> {
        None
    }

    fn file_context(&self, _pid: u32) -> Option<FileContext> {
        None
    }
}

#[cfg(target_os = "linux")]
pub type NativeSource = linux::LinuxSource;

#[cfg(target_os = "macos")]
pub type NativeSource = macos::MacSource;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub type NativeSource = fallback::FallbackSource;

/// The process source for the running platform.
pub fn native() -> NativeSource {
    NativeSource::default()
}
