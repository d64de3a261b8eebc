//! Error taxonomy for target resolution and ancestry building.

use thiserror::Error;

use crate::types::Candidate;

/// Fixed marker carried by [`WitrError::PermissionDenied`].
///
/// Front ends look for this text to suggest re-running with elevated
/// privileges.
pub const OWNER_UNDETECTED: &str = "socket found but owning process not detected";

#[derive(Error, Debug)]
pub enum WitrError {
    /// No process matches the pid or name, or no socket matches the port.
    #[error("no matching process found: {0}")]
    NotFound(String),

    /// More than one process matched; the caller must disambiguate.
    #[error("multiple matching processes found ({})", .0.len())]
    AmbiguousMatch(Vec<Candidate>),

    /// A socket is bound to the port but its owner could not be read.
    #[error("socket found but owning process not detected (port {port})")]
    PermissionDenied { port: u16 },

    /// The identifier does not parse (non-numeric pid, port out of range...).
    #[error("malformed target: {0}")]
    MalformedTarget(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WitrError {
    /// Whether elevated privileges would likely let the query succeed.
    pub fn suggests_privilege_escalation(&self) -> bool {
        matches!(self, WitrError::PermissionDenied { .. })
    }
}
