//! Core data types shared by the resolver, the ancestry pipeline and the renderers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ancestry::Source;
use crate::error::WitrError;

/// What the user asked about. Built once from command-line input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Pid,
    Port,
    Name,
}

impl Target {
    pub fn pid(value: impl Into<String>) -> Self {
        Target {
            kind: TargetKind::Pid,
            value: value.into(),
        }
    }

    pub fn port(value: impl Into<String>) -> Self {
        Target {
            kind: TargetKind::Port,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Target {
            kind: TargetKind::Name,
            value: value.into(),
        }
    }

    /// Parse the value as a pid: a positive 32-bit integer.
    pub fn parse_pid(&self) -> Result<u32, WitrError> {
        match self.value.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Ok(pid),
            _ => Err(WitrError::MalformedTarget(format!(
                "'{}' is not a valid pid",
                self.value
            ))),
        }
    }

    /// Parse the value as a port in `1..=65535`.
    pub fn parse_port(&self) -> Result<u16, WitrError> {
        match self.value.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(WitrError::MalformedTarget(format!(
                "'{}' is not a valid port",
                self.value
            ))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Pid => write!(f, "pid {}", self.value),
            TargetKind::Port => write!(f, "port {}", self.value),
            TargetKind::Name => write!(f, "'{}'", self.value),
        }
    }
}

/// Coarse health classification of a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Health {
    #[default]
    Running,
    Zombie,
    Stopped,
    HighCpu,
    HighMem,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Running => write!(f, "running"),
            Health::Zombie => write!(f, "zombie"),
            Health::Stopped => write!(f, "stopped"),
            Health::HighCpu => write!(f, "high-cpu"),
            Health::HighMem => write!(f, "high-mem"),
        }
    }
}

/// A point-in-time snapshot of one process.
///
/// Records are never updated; fetching the same pid again yields a new,
/// independent record (pids get reused).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    /// Short process name (`comm` on Linux).
    pub command: String,
    /// Full command line, space-joined. Empty for kernel threads.
    #[serde(default)]
    pub cmdline: String,
    pub user: String,
    pub working_dir: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub health: Health,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bind_addresses: Vec<String>,
    /// Short container id, empty outside containers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,
    /// systemd unit stem or launchd label, empty when not managed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Controlling terminal (`pts/3`, `ttys001`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<String>,
}

impl ProcessRecord {
    /// A running record with only identity fields populated.
    pub fn new(pid: u32, ppid: u32, command: impl Into<String>) -> Self {
        let command = command.into();
        ProcessRecord {
            pid,
            ppid,
            cmdline: command.clone(),
            command,
            user: String::new(),
            working_dir: String::new(),
            started_at: Utc::now(),
            health: Health::Running,
            bind_addresses: Vec::new(),
            container: String::new(),
            service: String::new(),
            tty: None,
        }
    }

    /// The command line if known, otherwise the short name.
    pub fn display_command(&self) -> &str {
        if self.cmdline.is_empty() {
            &self.command
        } else {
            &self.cmdline
        }
    }
}

/// One entry of an ambiguous-match listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub pid: u32,
    pub cmdline: String,
}

/// Socket states observed on a queried port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketInfo {
    pub port: u16,
    /// Socket count keyed by state name (`LISTEN`, `ESTABLISHED`, ...).
    pub states: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Resource usage and host thermal/sleep context for a process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rss_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_seconds: Option<f64>,
    /// Hottest thermal zone, in degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermal_celsius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermal_state: Option<String>,
    /// Whether the process holds a sleep-prevention assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevents_sleep: Option<bool>,
}

impl ResourceContext {
    pub fn is_empty(&self) -> bool {
        *self == ResourceContext::default()
    }
}

/// Open file descriptors and file locks held by a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    pub open_files: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fd_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locks: Vec<String>,
}

/// Everything known about a resolved process; handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub target: Target,
    pub resolved_target: String,
    pub process: ProcessRecord,
    pub restart_count: usize,
    pub ancestry: Vec<ProcessRecord>,
    pub source: Source,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_info: Option<SocketInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_context: Option<ResourceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_context: Option<FileContext>,
}

/// Output of the environment-only mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvReport {
    pub command: String,
    pub env: Vec<String>,
}
