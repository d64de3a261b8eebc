//! macOS process source built on `ps`, `lsof`, `launchctl`, `netstat`,
//! `pmset` and the `listeners` crate.

use std::collections::{BTreeMap, BTreeSet};
use std::process::Command;

use chrono::{Duration, Utc};
use log::debug;
use nix::unistd::{Uid, User};

use super::{ProcessSource, SocketOwner};
use crate::error::WitrError;
use crate::types::{FileContext, Health, ProcessRecord, ResourceContext, SocketInfo};

const HIGH_CPU_SECS: f64 = 7200.0;
const HIGH_MEM_BYTES: u64 = 1 << 30;

/// `ps` columns; `command` is last because it contains spaces.
const PS_FIELDS: &str = "pid=,ppid=,uid=,etime=,stat=,tty=,time=,rss=,command=";

#[derive(Debug, Default)]
pub struct MacSource;

impl MacSource {
    fn ps(&self, extra: &[&str]) -> Result<String, WitrError> {
        let output = Command::new("ps")
            .args(["-ww", "-o", PS_FIELDS])
            .args(extra)
            .output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn bind_addresses(&self, pid: u32) -> Vec<String> {
        match listeners::get_all() {
            Ok(all) => {
                let addrs: BTreeSet<String> = all
                    .into_iter()
                    .filter(|l| l.process.pid == pid)
                    .map(|l| l.socket.to_string())
                    .collect();
                addrs.into_iter().collect()
            }
            Err(e) => {
                debug!("listeners unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

impl ProcessSource for MacSource {
    fn get(&self, pid: u32) -> Result<ProcessRecord, WitrError> {
        let stdout = self.ps(&["-p", &pid.to_string()])?;
        let mut rec = stdout
            .lines()
            .find_map(parse_ps_line)
            .filter(|r| r.pid == pid)
            .ok_or_else(|| WitrError::NotFound(format!("no process with pid {pid}")))?;

        rec.working_dir = working_dir(pid).unwrap_or_default();
        rec.bind_addresses = self.bind_addresses(pid);
        // Only direct launchd children are jobs; everything else inherits a
        // label from its session.
        if rec.ppid == 1 {
            rec.service = launchd_label(pid).unwrap_or_default();
        }
        Ok(rec)
    }

    fn list(&self) -> Result<Vec<ProcessRecord>, WitrError> {
        let stdout = self.ps(&["-A"])?;
        Ok(stdout.lines().filter_map(parse_ps_line).collect())
    }

    fn owner_of(&self, port: u16) -> Result<SocketOwner, WitrError> {
        let owners: BTreeSet<u32> = listeners::get_all()
            .map_err(|e| WitrError::Io(std::io::Error::other(e.to_string())))?
            .into_iter()
            .filter(|l| l.socket.port() == port)
            .map(|l| l.process.pid)
            .collect();

        if !owners.is_empty() {
            return Ok(SocketOwner::Owners(owners.into_iter().collect()));
        }

        // listeners only reports sockets whose owners it can read; netstat
        // sees every socket.
        let table = run("netstat", &["-an"]).unwrap_or_default();
        let bound = parse_netstat(&table)
            .iter()
            .any(|s| s.port == port && (s.udp || s.state == "LISTEN"));
        Ok(if bound {
            SocketOwner::OwnerUnknown
        } else {
            SocketOwner::NoSocket
        })
    }

    fn environment(&self, pid: u32) -> Result<Vec<String>, WitrError> {
        let pid_arg = pid.to_string();
        let plain = run("ps", &["-ww", "-o", "command=", "-p", &pid_arg])
            .ok_or_else(|| WitrError::NotFound(format!("no process with pid {pid}")))?;
        let with_env = run("ps", &["-E", "-ww", "-o", "command=", "-p", &pid_arg])
            .unwrap_or_default();
        Ok(split_env(plain.trim(), with_env.trim()))
    }

    fn socket_info(&self, port: u16) -> Option<SocketInfo> {
        let table = run("netstat", &["-an"])?;
        let mut states: BTreeMap<String, usize> = BTreeMap::new();
        for sock in parse_netstat(&table).into_iter().filter(|s| s.port == port) {
            let state = if sock.udp { "UDP".to_string() } else { sock.state };
            *states.entry(state).or_default() += 1;
        }
        if states.is_empty() {
            return None;
        }

        let mut notes = Vec::new();
        if let Some(n) = states.get("TIME_WAIT") {
            notes.push(format!(
                "{n} connection(s) in TIME_WAIT; rebinding right after a restart may fail with 'address already in use'"
            ));
        }
        if let Some(n) = states.get("CLOSE_WAIT") {
            notes.push(format!(
                "{n} connection(s) in CLOSE_WAIT; the owning process may not be closing its sockets"
            ));
        }
        Some(SocketInfo { port, states, notes })
    }

    fn resource_context(&self, pid: u32) -> Option<ResourceContext> {
        let stdout = self.ps(&["-p", &pid.to_string()]).ok()?;
        let row = stdout.lines().find_map(parse_ps_row)?;

        let threads = run("ps", &["-M", "-p", &pid.to_string()])
            .map(|out| out.lines().count().saturating_sub(1) as u64)
            .filter(|n| *n > 0);
        let prevents_sleep =
            run("pmset", &["-g", "assertions"]).map(|out| holds_sleep_assertion(&out, pid));
        let thermal_state = run("pmset", &["-g", "therm"]).and_then(|out| parse_therm(&out));

        Some(ResourceContext {
            threads,
            rss_bytes: Some(row.rss_kb * 1024),
            cpu_seconds: Some(row.cpu_seconds),
            thermal_celsius: None,
            thermal_state,
            prevents_sleep,
        })
    }

    fn file_context(&self, pid: u32) -> Option<FileContext> {
        let out = run("lsof", &["-n", "-P", "-p", &pid.to_string(), "-F", "f"])?;
        let open_files = out
            .lines()
            .filter_map(|l| l.strip_prefix('f'))
            .filter(|fd| fd.chars().all(|c| c.is_ascii_digit()))
            .count();
        if open_files == 0 {
            return None;
        }
        Some(FileContext {
            open_files,
            fd_limit: None,
            locks: Vec::new(),
        })
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        debug!("{} {:?} exited with {}", program, args, output.status);
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One parsed `ps` row before it becomes a record.
#[derive(Debug, PartialEq)]
struct PsRow {
    pid: u32,
    ppid: u32,
    uid: u32,
    elapsed_secs: i64,
    stat: String,
    tty: Option<String>,
    cpu_seconds: f64,
    rss_kb: u64,
    cmdline: String,
}

fn parse_ps_row(line: &str) -> Option<PsRow> {
    let mut tokens = line.split_whitespace();
    let pid = tokens.next()?.parse().ok()?;
    let ppid = tokens.next()?.parse().ok()?;
    let uid = tokens.next()?.parse().ok()?;
    let elapsed_secs = parse_clock(tokens.next()?)? as i64;
    let stat = tokens.next()?.to_string();
    let tty = match tokens.next()? {
        "??" | "-" => None,
        t => Some(t.to_string()),
    };
    let cpu_seconds = parse_clock(tokens.next()?)?;
    let rss_kb = tokens.next()?.parse().ok()?;
    let cmdline = tokens.collect::<Vec<_>>().join(" ");

    Some(PsRow {
        pid,
        ppid,
        uid,
        elapsed_secs,
        stat,
        tty,
        cpu_seconds,
        rss_kb,
        cmdline,
    })
}

fn parse_ps_line(line: &str) -> Option<ProcessRecord> {
    let row = parse_ps_row(line)?;
    let argv0 = row.cmdline.split_whitespace().next().unwrap_or_default();
    let command = argv0.rsplit('/').next().unwrap_or(argv0).to_string();

    let health = if row.stat.starts_with('Z') {
        Health::Zombie
    } else if row.stat.starts_with('T') {
        Health::Stopped
    } else if row.cpu_seconds > HIGH_CPU_SECS {
        Health::HighCpu
    } else if row.rss_kb * 1024 > HIGH_MEM_BYTES {
        Health::HighMem
    } else {
        Health::Running
    };

    let mut rec = ProcessRecord::new(row.pid, row.ppid, command);
    rec.cmdline = row.cmdline;
    rec.user = user_name(row.uid);
    rec.started_at = Utc::now() - Duration::seconds(row.elapsed_secs);
    rec.health = health;
    rec.tty = row.tty;
    Some(rec)
}

/// Parse `[[dd-]hh:]mm:ss[.cc]` into seconds.
fn parse_clock(value: &str) -> Option<f64> {
    let (days, clock) = match value.split_once('-') {
        Some((d, rest)) => (d.parse::<f64>().ok()?, rest),
        None => (0.0, value),
    };
    let mut secs = 0.0;
    for part in clock.split(':') {
        secs = secs * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(days * 86_400.0 + secs)
}

fn user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn working_dir(pid: u32) -> Option<String> {
    let out = run("lsof", &["-a", "-p", &pid.to_string(), "-d", "cwd", "-F", "n"])?;
    out.lines()
        .find_map(|l| l.strip_prefix('n'))
        .map(str::to_string)
}

fn launchd_label(pid: u32) -> Option<String> {
    let out = run("launchctl", &["procinfo", &pid.to_string()])?;
    out.lines()
        .find_map(|l| l.trim().strip_prefix("label = "))
        .map(str::to_string)
}

/// `ps -E` appends the environment to the command line.
fn split_env(plain: &str, with_env: &str) -> Vec<String> {
    let Some(rest) = with_env.strip_prefix(plain) else {
        return Vec::new();
    };

    let mut env: Vec<String> = Vec::new();
    for token in rest.split_whitespace() {
        let starts_entry = token
            .split_once('=')
            .is_some_and(|(key, _)| !key.is_empty() && !key.contains('/'));
        if starts_entry {
            env.push(token.to_string());
        } else if let Some(last) = env.last_mut() {
            // Values containing spaces arrive as several tokens.
            last.push(' ');
            last.push_str(token);
        }
    }
    env
}

#[derive(Debug, PartialEq)]
struct NetstatSocket {
    udp: bool,
    port: u16,
    state: String,
}

/// Parse `netstat -an` internet rows, e.g.
/// `tcp4  0  0  *.8080  *.*  LISTEN`.
fn parse_netstat(output: &str) -> Vec<NetstatSocket> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let proto = *fields.first()?;
            let udp = proto.starts_with("udp");
            if !udp && !proto.starts_with("tcp") {
                return None;
            }
            let port = fields.get(3)?.rsplit('.').next()?.parse().ok()?;
            let state = if udp {
                String::new()
            } else {
                fields.get(5)?.to_string()
            };
            Some(NetstatSocket { udp, port, state })
        })
        .collect()
}

fn holds_sleep_assertion(assertions: &str, pid: u32) -> bool {
    let marker = format!("pid {pid}(");
    assertions.lines().any(|l| l.contains(&marker))
}

/// Summarise `pmset -g therm`.
fn parse_therm(output: &str) -> Option<String> {
    let limit = output.lines().find_map(|l| {
        let (key, value) = l.split_once('=')?;
        (key.trim() == "CPU_Speed_Limit")
            .then(|| value.trim().parse::<u32>().ok())
            .flatten()
    });
    match limit {
        Some(pct) if pct < 100 => Some(format!("throttled (CPU speed limit {pct}%)")),
        Some(_) => Some("nominal".to_string()),
        None if output.contains("No thermal warning level") => Some("nominal".to_string()),
        None => None,
    }
}
