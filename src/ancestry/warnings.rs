//! Operational warnings derived from an ancestry.
//!
//! Every rule runs independently, in a fixed order, against the target (the
//! last record) unless noted. Duplicates are kept.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

use super::{classify, SourceType};
use crate::types::{Health, ProcessRecord};

/// Consecutive identical commands above which the restart warning fires.
pub const RESTART_THRESHOLD: usize = 5;
pub const LONG_RUNNING_DAYS: i64 = 90;

const SUSPICIOUS_DIRS: &[&str] = &["/", "/tmp", "/var/tmp"];

pub const MSG_RESTARTS: &str = "Process or its ancestors restarted more than 5 times";
pub const MSG_ZOMBIE: &str = "Process is a zombie (defunct)";
pub const MSG_STOPPED: &str = "Process is stopped (T state)";
pub const MSG_HIGH_CPU: &str = "Process is using high CPU (>2h total CPU time)";
pub const MSG_HIGH_MEM: &str = "Process is using high memory (>1GB RSS)";
pub const MSG_PUBLIC_BIND: &str = "Process is listening on a public interface";
pub const MSG_ROOT: &str = "Process is running as root";
pub const MSG_UNKNOWN_SOURCE: &str = "No known supervisor or service manager detected";
pub const MSG_LONG_RUNNING: &str = "Process has been running for over 90 days";
pub const MSG_SUSPICIOUS_DIR: &str = "Process is running from a suspicious working directory";
pub const MSG_NO_HEALTHCHECK: &str = "No health check detected for container";
pub const MSG_SERVICE_MISMATCH: &str = "Service name and process name do not match";

/// Length of the longest run of consecutive identical commands, or 0 when
/// no command repeats back to back.
pub fn restart_count(ancestry: &[ProcessRecord]) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<&str> = None;

    for rec in ancestry {
        run = if previous == Some(rec.command.as_str()) {
            run + 1
        } else {
            1
        };
        longest = longest.max(run);
        previous = Some(&rec.command);
    }

    if longest > 1 {
        longest
    } else {
        0
    }
}

/// Whether any address is reachable from outside the host: a wildcard bind,
/// or a routable address that is neither loopback nor private.
pub fn is_public_bind(addresses: &[String]) -> bool {
    addresses.iter().any(|addr| {
        let host = bind_host(addr);
        if host == "*" {
            return true;
        }
        match host.parse::<IpAddr>() {
            Ok(ip) => is_public_ip(ip),
            Err(_) => false,
        }
    })
}

/// Host part of `1.2.3.4:80`, `[::1]:80`, `*:80` or a bare address.
fn bind_host(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.rsplit_once(':') {
        // A bare IPv6 address has more than one colon.
        Some((host, _)) if !host.contains(':') => host,
        _ => addr,
    }
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_unspecified() || !(v4.is_loopback() || v4.is_private() || v4.is_link_local())
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let unique_local = first & 0xfe00 == 0xfc00;
            let link_local = first & 0xffc0 == 0xfe80;
            v6.is_unspecified() || !(v6.is_loopback() || unique_local || link_local)
        }
    }
}

/// Warnings for an ancestry evaluated at the current time.
pub fn warnings(ancestry: &[ProcessRecord]) -> Vec<String> {
    warnings_at(ancestry, Utc::now())
}

/// Warnings for an ancestry, with `now` as the reference for age checks.
pub fn warnings_at(ancestry: &[ProcessRecord], now: DateTime<Utc>) -> Vec<String> {
    let Some(target) = ancestry.last() else {
        return Vec::new();
    };
    let mut w = Vec::new();

    if restart_count(ancestry) > RESTART_THRESHOLD {
        w.push(MSG_RESTARTS.to_string());
    }

    match target.health {
        Health::Zombie => w.push(MSG_ZOMBIE.to_string()),
        Health::Stopped => w.push(MSG_STOPPED.to_string()),
        Health::HighCpu => w.push(MSG_HIGH_CPU.to_string()),
        Health::HighMem => w.push(MSG_HIGH_MEM.to_string()),
        Health::Running => {}
    }

    if is_public_bind(&target.bind_addresses) {
        w.push(MSG_PUBLIC_BIND.to_string());
    }

    if target.user == "root" {
        w.push(MSG_ROOT.to_string());
    }

    if classify(ancestry).source_type == SourceType::Unknown {
        w.push(MSG_UNKNOWN_SOURCE.to_string());
    }

    if now.signed_duration_since(target.started_at) > Duration::days(LONG_RUNNING_DAYS) {
        w.push(MSG_LONG_RUNNING.to_string());
    }

    if SUSPICIOUS_DIRS.contains(&target.working_dir.as_str()) {
        w.push(format!("{}: {}", MSG_SUSPICIOUS_DIR, target.working_dir));
    }

    // Fires for every containerized target; health checks are not inspected.
    if !target.container.is_empty() {
        w.push(MSG_NO_HEALTHCHECK.to_string());
    }

    if !target.service.is_empty() && !target.command.is_empty() && target.service != target.command
    {
        w.push(MSG_SERVICE_MISMATCH.to_string());
    }

    w
}
