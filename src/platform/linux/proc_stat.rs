//! Parsers for per-process `/proc/<pid>/*` files.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Health;

/// Cumulative CPU time above which a process counts as `high-cpu`.
pub const HIGH_CPU_SECS: u64 = 2 * 60 * 60;
/// Resident set size above which a process counts as `high-mem`.
pub const HIGH_MEM_BYTES: u64 = 1 << 30;

/// Fields of `/proc/<pid>/stat` used to build a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub tty_nr: u32,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u64,
    /// Start time in clock ticks since boot.
    pub starttime: u64,
    pub rss_pages: u64,
}

impl ProcStat {
    pub fn cpu_seconds(&self, ticks_per_sec: u64) -> f64 {
        (self.utime + self.stime) as f64 / ticks_per_sec.max(1) as f64
    }

    pub fn rss_bytes(&self, page_size: u64) -> u64 {
        self.rss_pages.saturating_mul(page_size)
    }

    pub fn health(&self, ticks_per_sec: u64, page_size: u64) -> Health {
        match self.state {
            'Z' => Health::Zombie,
            'T' | 't' => Health::Stopped,
            _ if self.cpu_seconds(ticks_per_sec) > HIGH_CPU_SECS as f64 => Health::HighCpu,
            _ if self.rss_bytes(page_size) > HIGH_MEM_BYTES => Health::HighMem,
            _ => Health::Running,
        }
    }
}

/// Parse `/proc/<pid>/stat`.
///
/// Format: `pid (comm) state ppid ...`. comm can contain spaces and
/// parentheses, so fields are counted from the LAST `)`.
pub fn parse_stat(content: &str) -> Option<ProcStat> {
    let comm_start = content.find('(')?;
    let comm_end = content.rfind(')')?;
    let comm = content.get(comm_start + 1..comm_end)?.to_string();

    let fields: Vec<&str> = content.get(comm_end + 1..)?.split_whitespace().collect();
    let field = |i: usize| -> Option<u64> { fields.get(i)?.parse().ok() };

    Some(ProcStat {
        comm,
        state: fields.first()?.chars().next()?,
        ppid: fields.get(1)?.parse().ok()?,
        tty_nr: fields.get(4)?.parse::<i64>().ok()? as u32,
        utime: field(11)?,
        stime: field(12)?,
        num_threads: field(17)?,
        starttime: field(19)?,
        rss_pages: fields.get(21)?.parse::<i64>().ok()?.max(0) as u64,
    })
}

/// Real uid from the `Uid:` line of `/proc/<pid>/status`.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Boot time in seconds since the epoch, from the `btime` line of `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Option<i64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime"))?
        .trim()
        .parse()
        .ok()
}

/// Name of the controlling terminal encoded in `tty_nr`, if any.
pub fn tty_name(tty_nr: u32) -> Option<String> {
    if tty_nr == 0 {
        return None;
    }
    let major = (tty_nr >> 8) & 0xfff;
    let minor = (tty_nr & 0xff) | ((tty_nr >> 12) & 0xfff00);
    Some(match major {
        136..=143 => format!("pts/{}", (major - 136) * 256 + minor),
        4 if minor < 64 => format!("tty{minor}"),
        4 => format!("ttyS{}", minor - 64),
        _ => format!("tty({major}:{minor})"),
    })
}

/// NUL-separated file (`cmdline`, `environ`) into its non-empty parts.
pub fn split_nul(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

/// Provenance hints extracted from `/proc/<pid>/cgroup`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupHints {
    /// First 12 hex chars of the container id.
    pub container: String,
    /// Unit stem, e.g. `nginx` for `nginx.service`.
    pub service: String,
}

static CONTAINER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:docker|containerd|kubepods|libpod|crio)[^\n]*?([0-9a-f]{64})")
        .expect("valid container id regex")
});

/// Extract container id and systemd unit from cgroup content.
///
/// Handles both v1 (`4:pids:/docker/<id>`) and v2 (`0::/system.slice/x.service`)
/// layouts. The unit is the last path component ending in `.service`, so a
/// unit running inside `user@1000.service` reports its own name.
pub fn parse_cgroup(content: &str) -> CgroupHints {
    let container = CONTAINER_ID
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str()[..12].to_string())
        .unwrap_or_default();

    let service = content
        .lines()
        .filter_map(|line| line.splitn(3, ':').nth(2))
        .find_map(|path| {
            let unit = path.rsplit('/').next()?;
            unit.strip_suffix(".service").map(str::to_string)
        })
        .unwrap_or_default();

    CgroupHints { container, service }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX_STAT: &str = "812 (nginx: master) S 1 812 812 0 -1 4194624 93 0 0 0 120 45 0 0 20 0 1 0 3050 10854400 350 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";

    #[test]
    fn test_parse_stat_with_spaces_in_comm() {
        let stat = parse_stat(NGINX_STAT).unwrap();
        assert_eq!(stat.comm, "nginx: master");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.ppid, 1);
        assert_eq!(stat.tty_nr, 0);
        assert_eq!(stat.utime, 120);
        assert_eq!(stat.stime, 45);
        assert_eq!(stat.num_threads, 1);
        assert_eq!(stat.starttime, 3050);
        assert_eq!(stat.rss_pages, 350);
    }

    #[test]
    fn test_parse_stat_parenthesis_in_comm() {
        let line = "77 (a) b) R 5 77 77 34816 77 0 0 0 0 0 1 1 0 0 20 0 3 0 99 0 10 0";
        let stat = parse_stat(line).unwrap();
        assert_eq!(stat.comm, "a) b");
        assert_eq!(stat.ppid, 5);
        assert_eq!(stat.num_threads, 3);
        assert_eq!(stat.rss_pages, 10);
        assert_eq!(tty_name(stat.tty_nr).as_deref(), Some("pts/0"));
    }

    #[test]
    fn test_parse_stat_truncated() {
        assert!(parse_stat("1 (init) S 0").is_none());
        assert!(parse_stat("").is_none());
    }

    #[test]
    fn test_health_classification() {
        let mut stat = parse_stat(NGINX_STAT).unwrap();
        assert_eq!(stat.health(100, 4096), Health::Running);

        stat.state = 'Z';
        assert_eq!(stat.health(100, 4096), Health::Zombie);

        stat.state = 'T';
        assert_eq!(stat.health(100, 4096), Health::Stopped);

        stat.state = 'S';
        stat.utime = (HIGH_CPU_SECS + 1) * 100;
        assert_eq!(stat.health(100, 4096), Health::HighCpu);

        stat.utime = 0;
        stat.rss_pages = HIGH_MEM_BYTES / 4096 + 1;
        assert_eq!(stat.health(100, 4096), Health::HighMem);
    }

    #[test]
    fn test_parse_status_uid() {
        let status = "Name:\tsshd\nState:\tS (sleeping)\nUid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\n";
        assert_eq!(parse_status_uid(status), Some(0));
        assert_eq!(parse_status_uid("Name:\tx\n"), None);
    }

    #[test]
    fn test_parse_boot_time() {
        let stat = "cpu  1 2 3\nintr 5\nbtime 1700000000\nprocesses 42\n";
        assert_eq!(parse_boot_time(stat), Some(1_700_000_000));
    }

    #[test]
    fn test_tty_names() {
        assert_eq!(tty_name(0), None);
        assert_eq!(tty_name((136 << 8) | 3).as_deref(), Some("pts/3"));
        assert_eq!(tty_name((4 << 8) | 1).as_deref(), Some("tty1"));
    }

    #[test]
    fn test_split_nul() {
        assert_eq!(
            split_nul(b"node\0app.js\0--port\08080\0"),
            vec!["node", "app.js", "--port", "8080"]
        );
        assert!(split_nul(b"").is_empty());
    }

    #[test]
    fn test_cgroup_v2_service() {
        let hints = parse_cgroup("0::/system.slice/nginx.service\n");
        assert_eq!(hints.service, "nginx");
        assert!(hints.container.is_empty());
    }

    #[test]
    fn test_cgroup_session_scope_has_no_service() {
        let hints = parse_cgroup("0::/user.slice/user-1000.slice/session-3.scope\n");
        assert_eq!(hints, CgroupHints::default());
    }

    #[test]
    fn test_cgroup_user_unit() {
        let hints =
            parse_cgroup("0::/user.slice/user-1000.slice/user@1000.service/app.slice/syncthing.service\n");
        assert_eq!(hints.service, "syncthing");
    }

    #[test]
    fn test_cgroup_docker_v1() {
        let id = "3f4e8a9c1b2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f";
        let content = format!("12:pids:/docker/{id}\n11:memory:/docker/{id}\n");
        let hints = parse_cgroup(&content);
        assert_eq!(hints.container, "3f4e8a9c1b2d");
    }

    #[test]
    fn test_cgroup_docker_scope_v2() {
        let id = "aa".repeat(32);
        let content = format!("0::/system.slice/docker-{id}.scope\n");
        let hints = parse_cgroup(&content);
        assert_eq!(hints.container, "aaaaaaaaaaaa");
        assert!(hints.service.is_empty());
    }

    #[test]
    fn test_cgroup_kubepods() {
        let id = "0123456789abcdef".repeat(4);
        let content = format!("0::/kubepods/burstable/pod1234/{id}\n");
        assert_eq!(parse_cgroup(&content).container, "0123456789ab");
    }
}
