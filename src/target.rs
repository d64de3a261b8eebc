//! Maps a user-supplied [`Target`] to candidate pids.
//!
//! The resolver never picks one of several matches; [`resolve_one`] turns a
//! multi-pid result into [`WitrError::AmbiguousMatch`] so the front end can
//! list the candidates.

use std::collections::HashSet;

use log::debug;

use crate::ancestry::program_names;
use crate::error::WitrError;
use crate::platform::{ProcessSource, SocketOwner};
use crate::types::{Candidate, Target, TargetKind};

/// Resolve a target to one or more pids.
pub fn resolve<S>(source: &S, target: &Target) -> Result<Vec<u32>, WitrError>
where
    S: ProcessSource + ?Sized,
{
    match target.kind {
        TargetKind::Pid => {
            let pid = target.parse_pid()?;
            source.get(pid)?;
            Ok(vec![pid])
        }
        TargetKind::Port => {
            let port = target.parse_port()?;
            match source.owner_of(port)? {
                SocketOwner::Owners(mut pids) if !pids.is_empty() => {
                    pids.sort_unstable();
                    pids.dedup();
                    debug!("port {} owned by {:?}", port, pids);
                    Ok(pids)
                }
                SocketOwner::OwnerUnknown => Err(WitrError::PermissionDenied { port }),
                _ => Err(WitrError::NotFound(format!("nothing is listening on port {port}"))),
            }
        }
        TargetKind::Name => resolve_name(source, &target.value, std::process::id()),
    }
}

/// Programs that run witr on the user's behalf and repeat its arguments.
const LAUNCHERS: &[&str] = &["sudo", "doas", "su", "pkexec", "witr"];

/// `own_pid` plus the launchers directly above it (`sudo witr nginx`).
fn own_invocation<S>(source: &S, own_pid: u32) -> HashSet<u32>
where
    S: ProcessSource + ?Sized,
{
    let mut pids = HashSet::from([own_pid]);
    let mut current = source.get(own_pid).ok();

    while let Some(rec) = current {
        if rec.ppid == 0 || pids.contains(&rec.ppid) {
            break;
        }
        current = match source.get(rec.ppid) {
            Ok(parent)
                if program_names(&parent)
                    .iter()
                    .any(|n| LAUNCHERS.contains(&n.as_str())) =>
            {
                pids.insert(parent.pid);
                Some(parent)
            }
            _ => None,
        };
    }
    pids
}

fn resolve_name<S>(source: &S, name: &str, own_pid: u32) -> Result<Vec<u32>, WitrError>
where
    S: ProcessSource + ?Sized,
{
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Err(WitrError::MalformedTarget("empty process name".to_string()));
    }

    let own = own_invocation(source, own_pid);
    let pids: Vec<u32> = source
        .list()?
        .iter()
        .filter(|rec| !own.contains(&rec.pid))
        .filter(|rec| rec.display_command().to_lowercase().contains(&needle))
        .map(|rec| rec.pid)
        .collect();

    if pids.is_empty() {
        return Err(WitrError::NotFound(format!("no process named '{name}'")));
    }
    debug!("'{}' matched {} process(es)", name, pids.len());
    Ok(pids)
}

/// Resolve a target that must identify exactly one process.
pub fn resolve_one<S>(source: &S, target: &Target) -> Result<u32, WitrError>
where
    S: ProcessSource + ?Sized,
{
    let pids = resolve(source, target)?;
    if let [pid] = pids.as_slice() {
        return Ok(*pid);
    }

    let candidates = pids
        .into_iter()
        .map(|pid| Candidate {
            pid,
            // The candidate may exit between the listing and this read.
            cmdline: source
                .get(pid)
                .map(|rec| rec.display_command().to_string())
                .unwrap_or_default(),
        })
        .collect();
    Err(WitrError::AmbiguousMatch(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OWNER_UNDETECTED;
    use crate::platform::fake::FakeSource;
    use crate::types::ProcessRecord;

    fn node_box() -> FakeSource {
        let mut a = ProcessRecord::new(100, 1, "node");
        a.cmdline = "node /srv/api/server.js".into();
        let mut b = ProcessRecord::new(200, 1, "node");
        b.cmdline = "node /srv/web/index.js".into();
        let mut c = ProcessRecord::new(300, 1, "node");
        c.cmdline = "/usr/bin/NODE worker.js".into();

        FakeSource::new()
            .process(1, 0, "systemd")
            .with(a)
            .with(b)
            .with(c)
            .process(400, 1, "postgres")
    }

    #[test]
    fn test_resolve_pid() {
        let src = node_box();
        assert_eq!(resolve(&src, &Target::pid("400")).unwrap(), vec![400]);
        assert!(matches!(
            resolve(&src, &Target::pid("999")),
            Err(WitrError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_malformed() {
        let src = node_box();
        for target in [
            Target::pid("-1"),
            Target::pid("0"),
            Target::pid("abc"),
            Target::port("0"),
            Target::port("70000"),
            Target::name("   "),
        ] {
            assert!(
                matches!(resolve(&src, &target), Err(WitrError::MalformedTarget(_))),
                "{target}"
            );
        }
    }

    #[test]
    fn test_resolve_name_returns_all_matches_in_order() {
        let src = node_box();
        let pids = resolve(&src, &Target::name("node")).unwrap();
        assert_eq!(pids, vec![100, 200, 300]);
    }

    #[test]
    fn test_resolve_name_is_case_insensitive_substring() {
        let src = node_box();
        assert_eq!(resolve(&src, &Target::name("Index.JS")).unwrap(), vec![200]);
        assert_eq!(resolve(&src, &Target::name("postgres")).unwrap(), vec![400]);
    }

    #[test]
    fn test_resolve_name_not_found() {
        let src = node_box();
        assert!(matches!(
            resolve(&src, &Target::name("nonexistent_xyz")),
            Err(WitrError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_name_skips_own_process() {
        let own = std::process::id();
        let src = FakeSource::new().process(own, 1, "witr-selftest");
        assert!(matches!(
            resolve(&src, &Target::name("witr-selftest")),
            Err(WitrError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_name_skips_sudo_launcher() {
        let mut sudo = ProcessRecord::new(8999, 500, "sudo");
        sudo.cmdline = "sudo witr nginx".into();
        let mut own = ProcessRecord::new(9000, 8999, "witr");
        own.cmdline = "witr nginx".into();
        let src = FakeSource::new()
            .process(1, 0, "systemd")
            .process(500, 1, "bash")
            .with(sudo)
            .with(own)
            .process(600, 1, "nginx");

        assert_eq!(resolve_name(&src, "nginx", 9000).unwrap(), vec![600]);
    }

    #[test]
    fn test_resolve_name_keeps_unrelated_sudo() {
        let mut other = ProcessRecord::new(700, 500, "sudo");
        other.cmdline = "sudo tail -f /var/log/nginx/error.log".into();
        let src = FakeSource::new()
            .process(500, 1, "bash")
            .process(9000, 500, "witr")
            .with(other)
            .process(600, 1, "nginx");

        assert_eq!(resolve_name(&src, "nginx", 9000).unwrap(), vec![700, 600]);
    }

    #[test]
    fn test_resolve_port_owners() {
        let src = node_box().with_port(8080, SocketOwner::Owners(vec![200, 100, 200]));
        assert_eq!(resolve(&src, &Target::port("8080")).unwrap(), vec![100, 200]);
    }

    #[test]
    fn test_resolve_port_without_socket() {
        let src = node_box();
        assert!(matches!(
            resolve(&src, &Target::port("9999")),
            Err(WitrError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_port_owner_unknown_carries_marker() {
        let src = node_box().with_port(443, SocketOwner::OwnerUnknown);
        let err = resolve(&src, &Target::port("443")).unwrap_err();
        assert!(matches!(err, WitrError::PermissionDenied { port: 443 }));
        assert!(err.to_string().contains(OWNER_UNDETECTED));
    }

    #[test]
    fn test_resolve_one_single() {
        let src = node_box();
        assert_eq!(resolve_one(&src, &Target::name("postgres")).unwrap(), 400);
    }

    #[test]
    fn test_resolve_one_ambiguous_lists_candidates() {
        let src = node_box();
        match resolve_one(&src, &Target::name("node")) {
            Err(WitrError::AmbiguousMatch(candidates)) => {
                let pids: Vec<u32> = candidates.iter().map(|c| c.pid).collect();
                assert_eq!(pids, vec![100, 200, 300]);
                assert_eq!(candidates[0].cmdline, "node /srv/api/server.js");
            }
            other => panic!("expected AmbiguousMatch, got {other:?}"),
        }
    }
}
