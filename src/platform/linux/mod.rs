//! `/proc`-backed process source.

mod context;
pub mod proc_fd;
pub mod proc_net;
pub mod proc_stat;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use nix::unistd::{sysconf, SysconfVar, Uid, User};

use super::{ProcessSource, SocketOwner};
use crate::error::WitrError;
use crate::types::{FileContext, ProcessRecord, ResourceContext, SocketInfo};
use proc_net::{parse_net_table, NetProto, NetSocket};
use proc_stat::{parse_boot_time, parse_cgroup, parse_stat, parse_status_uid, split_nul, tty_name};

const NET_TABLES: &[(&str, NetProto)] = &[
    ("tcp", NetProto::Tcp),
    ("tcp6", NetProto::Tcp),
    ("udp", NetProto::Udp),
    ("udp6", NetProto::Udp),
];

pub struct LinuxSource {
    proc_root: PathBuf,
    sys_root: PathBuf,
    ticks_per_sec: u64,
    page_size: u64,
}

impl Default for LinuxSource {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl LinuxSource {
    /// A source reading from alternative `/proc` and `/sys` trees.
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        LinuxSource {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            ticks_per_sec: sysconf_or(SysconfVar::CLK_TCK, 100),
            page_size: sysconf_or(SysconfVar::PAGE_SIZE, 4096),
        }
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    /// Host boot time in epoch seconds, `None` when `btime` cannot be read.
    fn boot_time(&self) -> Option<i64> {
        let btime = fs::read_to_string(self.proc_root.join("stat"))
            .ok()
            .and_then(|s| parse_boot_time(&s));
        if btime.is_none() {
            warn!("boot time unavailable, process start times are approximate");
        }
        btime
    }

    /// Every socket from the tcp/udp tables that can be read.
    fn net_sockets(&self) -> Vec<NetSocket> {
        NET_TABLES
            .iter()
            .filter_map(|(name, proto)| {
                let path = self.proc_root.join("net").join(name);
                match fs::read_to_string(&path) {
                    Ok(content) => Some(parse_net_table(&content, *proto)),
                    Err(e) => {
                        debug!("skipping {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .flatten()
            .collect()
    }

    fn read_record(
        &self,
        pid: u32,
        boot_time: Option<i64>,
        users: &mut HashMap<u32, String>,
        listeners: Option<&HashMap<u64, String>>,
    ) -> Result<ProcessRecord, WitrError> {
        let dir = self.pid_dir(pid);
        let stat_raw = fs::read_to_string(dir.join("stat")).map_err(|e| read_error(pid, e))?;
        let stat = parse_stat(&stat_raw)
            .ok_or_else(|| WitrError::NotFound(format!("unreadable stat for pid {pid}")))?;

        let cmdline = fs::read(dir.join("cmdline"))
            .map(|bytes| split_nul(&bytes).join(" "))
            .unwrap_or_default();

        let user = fs::read_to_string(dir.join("status"))
            .ok()
            .and_then(|s| parse_status_uid(&s))
            .map(|uid| {
                users
                    .entry(uid)
                    .or_insert_with(|| user_name(uid))
                    .clone()
            })
            .unwrap_or_default();

        let working_dir = fs::read_link(dir.join("cwd"))
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let hints = fs::read_to_string(dir.join("cgroup"))
            .map(|s| parse_cgroup(&s))
            .unwrap_or_default();

        // Without btime the start tick has no epoch anchor; report now so no age is inferred.
        let started_at = boot_time
            .and_then(|btime| {
                let secs = btime as f64 + stat.starttime as f64 / self.ticks_per_sec as f64;
                DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64)
            })
            .unwrap_or_else(Utc::now);

        let bind_addresses = match listeners {
            Some(listeners) => proc_fd::socket_inodes(&dir)
                .map(|inodes| {
                    inodes
                        .iter()
                        .filter_map(|inode| listeners.get(inode).cloned())
                        .collect()
                })
                .unwrap_or_else(|e| {
                    debug!("cannot read sockets of pid {}: {}", pid, e);
                    Vec::new()
                }),
            None => Vec::new(),
        };

        Ok(ProcessRecord {
            pid,
            ppid: stat.ppid,
            health: stat.health(self.ticks_per_sec, self.page_size),
            tty: tty_name(stat.tty_nr),
            command: stat.comm,
            cmdline,
            user,
            working_dir,
            started_at,
            bind_addresses,
            container: hints.container,
            service: hints.service,
        })
    }
}

impl ProcessSource for LinuxSource {
    fn get(&self, pid: u32) -> Result<ProcessRecord, WitrError> {
        let listeners: HashMap<u64, String> = self
            .net_sockets()
            .into_iter()
            .filter(|s| s.is_bound_listener())
            .map(|s| (s.inode, s.local_display()))
            .collect();

        self.read_record(pid, self.boot_time(), &mut HashMap::new(), Some(&listeners))
    }

    fn list(&self) -> Result<Vec<ProcessRecord>, WitrError> {
        let pids = proc_fd::list_pids(&self.proc_root)
            .map_err(|e| io::Error::other(format!("{e:#}")))?;
        let boot_time = self.boot_time();
        let mut users = HashMap::new();

        Ok(pids
            .into_iter()
            .filter_map(|pid| match self.read_record(pid, boot_time, &mut users, None) {
                Ok(record) => Some(record),
                Err(e) => {
                    // Processes exit while we enumerate.
                    debug!("skipping pid {}: {}", pid, e);
                    None
                }
            })
            .collect())
    }

    fn owner_of(&self, port: u16) -> Result<SocketOwner, WitrError> {
        let inodes: HashSet<u64> = self
            .net_sockets()
            .into_iter()
            .filter(|s| s.is_bound_listener() && s.local.port() == port)
            .map(|s| s.inode)
            .collect();

        if inodes.is_empty() {
            return Ok(SocketOwner::NoSocket);
        }

        let owners = proc_fd::owners_of_inodes(&self.proc_root, &inodes)
            .map_err(|e| io::Error::other(format!("{e:#}")))?;
        debug!("port {} sockets {:?} owned by {:?}", port, inodes, owners);

        if owners.is_empty() {
            Ok(SocketOwner::OwnerUnknown)
        } else {
            Ok(SocketOwner::Owners(owners))
        }
    }

    fn environment(&self, pid: u32) -> Result<Vec<String>, WitrError> {
        let bytes = fs::read(self.pid_dir(pid).join("environ")).map_err(|e| read_error(pid, e))?;
        Ok(split_nul(&bytes))
    }

    fn socket_info(&self, port: u16) -> Option<SocketInfo> {
        context::socket_info(&self.net_sockets(), port)
    }

    fn resource_context(&self, pid: u32) -> Option<ResourceContext> {
        context::resource_context(
            &self.pid_dir(pid),
            &self.sys_root,
            self.ticks_per_sec,
            self.page_size,
        )
    }

    fn file_context(&self, pid: u32) -> Option<FileContext> {
        context::file_context(&self.proc_root, pid)
    }
}

fn read_error(pid: u32, err: io::Error) -> WitrError {
    match err.kind() {
        io::ErrorKind::NotFound => WitrError::NotFound(format!("no process with pid {pid}")),
        _ => WitrError::Io(err),
    }
}

fn user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn sysconf_or(var: SysconfVar, default: u64) -> u64 {
    match sysconf(var) {
        Ok(Some(value)) if value > 0 => value as u64,
        _ => default,
    }
}
