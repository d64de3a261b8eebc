//! Process ancestry and source detection ("why is this running?").
//!
//! Answers the causality question: given a resolved process, walk its parent
//! chain up to the init process, decide which container, supervisor, init
//! system, scheduler or shell is responsible for it, and derive operational
//! warnings from the chain.

mod source;
mod warnings;

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::WitrError;
use crate::platform::ProcessSource;
use crate::types::ProcessRecord;

pub use source::{classify, program_names};
pub use warnings::{is_public_bind, restart_count, warnings, warnings_at};

/// The designated root of the process table.
pub const ROOT_PID: u32 = 1;

/// Detected origin of a process chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Container,
    Supervisor,
    Systemd,
    Launchd,
    Cron,
    Shell,
    Unknown,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Container => write!(f, "container"),
            SourceType::Supervisor => write!(f, "supervisor"),
            SourceType::Systemd => write!(f, "systemd"),
            SourceType::Launchd => write!(f, "launchd"),
            SourceType::Cron => write!(f, "cron"),
            SourceType::Shell => write!(f, "shell"),
            SourceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classified provenance with a fixed, per-type confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Which supervisor, unit, shell... matched, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub confidence: f64,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.source_type, name),
            None => write!(f, "{}", self.source_type),
        }
    }
}

/// Build the ancestry of `pid`, ordered from the root-most ancestor (index 0)
/// to `pid` itself (last).
///
/// Only a failure to read `pid` is an error. The walk stops at [`ROOT_PID`],
/// at a ppid of 0, on a repeated pid, or when a parent cannot be read: the
/// parent may have exited between reads, and the chain simply ends there.
pub fn build<S>(source: &S, pid: u32) -> Result<Vec<ProcessRecord>, WitrError>
where
    S: ProcessSource + ?Sized,
{
    let mut chain = vec![source.get(pid)?];
    let mut visited = HashSet::from([pid]);

    loop {
        let current = &chain[chain.len() - 1];
        if current.pid == ROOT_PID || current.ppid == 0 {
            break;
        }

        let ppid = current.ppid;
        if !visited.insert(ppid) {
            debug!("ancestry cycle at pid {}, stopping", ppid);
            break;
        }

        match source.get(ppid) {
            Ok(parent) => chain.push(parent),
            Err(e) => {
                debug!("parent {} unavailable ({}), treating as root", ppid, e);
                break;
            }
        }
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeSource;

    fn pids(chain: &[ProcessRecord]) -> Vec<u32> {
        chain.iter().map(|r| r.pid).collect()
    }

    #[test]
    fn test_build_orders_root_to_target() {
        let src = FakeSource::new()
            .process(1, 0, "systemd")
            .process(300, 1, "sshd")
            .process(400, 300, "bash")
            .process(500, 400, "node");

        let chain = build(&src, 500).unwrap();
        assert_eq!(pids(&chain), vec![1, 300, 400, 500]);
        for pair in chain.windows(2) {
            assert_eq!(pair[1].ppid, pair[0].pid);
        }
    }

    #[test]
    fn test_build_missing_target_is_error() {
        let src = FakeSource::new().process(1, 0, "init");
        assert!(matches!(build(&src, 42), Err(WitrError::NotFound(_))));
    }

    #[test]
    fn test_build_missing_parent_ends_chain() {
        // 700's parent exited between reads.
        let src = FakeSource::new()
            .process(1, 0, "systemd")
            .process(800, 700, "worker");

        let chain = build(&src, 800).unwrap();
        assert_eq!(pids(&chain), vec![800]);
    }

    #[test]
    fn test_build_root_is_single_entry() {
        let src = FakeSource::new().process(1, 0, "systemd");
        assert_eq!(pids(&build(&src, 1).unwrap()), vec![1]);
    }

    #[test]
    fn test_build_self_parent_cycle() {
        let src = FakeSource::new().process(9, 9, "weird");
        assert_eq!(pids(&build(&src, 9).unwrap()), vec![9]);
    }

    #[test]
    fn test_build_longer_cycle_terminates() {
        let src = FakeSource::new()
            .process(10, 20, "a")
            .process(20, 30, "b")
            .process(30, 10, "c");
        assert_eq!(pids(&build(&src, 10).unwrap()), vec![30, 20, 10]);
    }

    #[test]
    fn test_build_stops_at_root_even_with_ppid() {
        // Some container runtimes report a ppid for pid 1.
        let src = FakeSource::new()
            .process(0, 0, "swapper")
            .process(1, 77, "tini")
            .process(5, 1, "app");
        assert_eq!(pids(&build(&src, 5).unwrap()), vec![1, 5]);
    }

    #[test]
    fn test_source_type_display() {
        assert_eq!(SourceType::Systemd.to_string(), "systemd");
        assert_eq!(SourceType::Launchd.to_string(), "launchd");
        assert_eq!(SourceType::Container.to_string(), "container");
        assert_eq!(SourceType::Shell.to_string(), "shell");
        assert_eq!(SourceType::Supervisor.to_string(), "supervisor");
        assert_eq!(SourceType::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_source_serialization() {
        let src = Source {
            source_type: SourceType::Systemd,
            name: Some("nginx.service".into()),
            confidence: 0.8,
        };
        let json = serde_json::to_string(&src).unwrap();
        assert_eq!(
            json,
            r#"{"type":"systemd","name":"nginx.service","confidence":0.8}"#
        );
        assert_eq!(src.to_string(), "systemd (nginx.service)");
    }
}
