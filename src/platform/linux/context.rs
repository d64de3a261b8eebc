//! Auxiliary context for a resolved process: socket states, resources, files.
//!
//! Every reader returns `None` when its inputs are unreadable; none of them
//! can fail the report.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use super::proc_fd;
use super::proc_net::{NetProto, NetSocket, SocketState};
use super::proc_stat::parse_stat;
use crate::types::{FileContext, ResourceContext, SocketInfo};

pub fn socket_info(sockets: &[NetSocket], port: u16) -> Option<SocketInfo> {
    let mut states: BTreeMap<String, usize> = BTreeMap::new();
    for sock in sockets.iter().filter(|s| s.local.port() == port) {
        let name = match sock.proto {
            NetProto::Tcp => sock.state.to_string(),
            NetProto::Udp => "UDP".to_string(),
        };
        *states.entry(name).or_default() += 1;
    }

    if states.is_empty() {
        return None;
    }

    let mut notes = Vec::new();
    if let Some(n) = states.get(&SocketState::TimeWait.to_string()) {
        notes.push(format!(
            "{n} connection(s) in TIME_WAIT; rebinding right after a restart may fail with 'address already in use'"
        ));
    }
    if let Some(n) = states.get(&SocketState::CloseWait.to_string()) {
        notes.push(format!(
            "{n} connection(s) in CLOSE_WAIT; the owning process may not be closing its sockets"
        ));
    }

    Some(SocketInfo { port, states, notes })
}

pub fn resource_context(
    pid_dir: &Path,
    sys_root: &Path,
    ticks_per_sec: u64,
    page_size: u64,
) -> Option<ResourceContext> {
    let stat = parse_stat(&fs::read_to_string(pid_dir.join("stat")).ok()?)?;

    Some(ResourceContext {
        threads: Some(stat.num_threads),
        rss_bytes: Some(stat.rss_bytes(page_size)),
        cpu_seconds: Some(stat.cpu_seconds(ticks_per_sec)),
        thermal_celsius: max_thermal_zone(sys_root),
        thermal_state: None,
        prevents_sleep: None,
    })
}

/// Hottest `/sys/class/thermal/thermal_zone*/temp` reading.
fn max_thermal_zone(sys_root: &Path) -> Option<f64> {
    fs::read_dir(sys_root.join("class/thermal"))
        .ok()?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("thermal_zone"))
        .filter_map(|e| fs::read_to_string(e.path().join("temp")).ok())
        .filter_map(|raw| raw.trim().parse::<i64>().ok())
        .max()
        .map(|millidegrees| millidegrees as f64 / 1000.0)
}

pub fn file_context(proc_root: &Path, pid: u32) -> Option<FileContext> {
    let pid_dir = proc_root.join(pid.to_string());
    let targets = proc_fd::fd_targets(&pid_dir).ok()?;

    let fd_limit = fs::read_to_string(pid_dir.join("limits"))
        .ok()
        .and_then(|s| parse_open_files_limit(&s));

    let locks = fs::read_to_string(proc_root.join("locks"))
        .map(|content| {
            parse_locks(&content, pid)
                .into_iter()
                .map(|lock| {
                    let path = targets
                        .iter()
                        .filter(|t| t.is_absolute())
                        .find(|t| fs::metadata(t).map(|m| m.ino() == lock.inode).unwrap_or(false))
                        .map(|t| t.display().to_string())
                        .unwrap_or_else(|| format!("inode {}", lock.inode));
                    format!("{} {} {}", lock.kind, lock.mode, path)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(FileContext {
        open_files: targets.len(),
        fd_limit,
        locks,
    })
}

/// Soft limit from the `Max open files` row of `/proc/<pid>/limits`.
fn parse_open_files_limit(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Max open files"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[derive(Debug, PartialEq, Eq)]
struct LockEntry {
    kind: String,
    mode: String,
    inode: u64,
}

/// Rows of `/proc/locks` held (not awaited) by `pid`.
///
/// Row format: `1: POSIX  ADVISORY  WRITE 1234 08:01:1234567 0 EOF`.
fn parse_locks(content: &str, pid: u32) -> Vec<LockEntry> {
    content
        .lines()
        .filter(|line| !line.contains("->"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.get(4)?.parse::<u32>().ok()? != pid {
                return None;
            }
            Some(LockEntry {
                kind: fields.get(1)?.to_string(),
                mode: fields.get(3)?.to_string(),
                inode: fields.get(5)?.rsplit(':').next()?.parse().ok()?,
            })
        })
        .collect()
}
