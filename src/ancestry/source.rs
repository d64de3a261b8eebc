//! Ordered source detection.
//!
//! Detectors run in a fixed priority order and the first match wins:
//!   1. Container  (container id on any record, or a container shim ancestor)
//!   2. Supervisor (known process manager anywhere above the target)
//!   3. Systemd    (target in a service unit, or parented by a systemd manager)
//!   4. Launchd    (target in a launchd job, or parented by launchd)
//!   5. Cron       (scheduler ancestor, no terminal)
//!   6. Shell      (shell ancestor, nearest interactive one named)
//!   Default: Unknown
//!
//! Outer operational wrappers (containers, supervisors) can sit on top of
//! an init system, so they are checked first. Confidence is fixed per type.

use std::collections::HashSet;

use super::{Source, SourceType};
use crate::types::ProcessRecord;

const CONTAINER_CONFIDENCE: f64 = 0.9;
const SUPERVISOR_CONFIDENCE: f64 = 0.85;
const SYSTEMD_CONFIDENCE: f64 = 0.8;
const LAUNCHD_CONFIDENCE: f64 = 0.8;
const CRON_CONFIDENCE: f64 = 0.7;
const SHELL_CONFIDENCE: f64 = 0.5;
const UNKNOWN_CONFIDENCE: f64 = 0.2;

/// Known shell binary names.
const SHELLS: &[&str] = &["bash", "sh", "zsh", "fish", "tcsh", "dash", "ksh", "csh"];

/// Process managers that launch and restart their children.
const SUPERVISORS: &[&str] = &[
    "pm2",
    "supervisord",
    "supervisor",
    "gunicorn",
    "runsv",
    "runsvdir",
    "s6-svscan",
    "s6-supervise",
    "forever",
    "circusd",
    "monit",
    "nodemon",
];

/// Prefixes of per-container runtime processes.
const CONTAINER_SHIMS: &[&str] = &["containerd-shim", "conmon", "runc", "crun", "docker-init"];

/// Cron-related process names.
const CRON_NAMES: &[&str] = &["cron", "crond", "anacron", "cronie"];

/// Service units that belong to a scheduler; processes in them are cron jobs.
const SCHEDULER_UNITS: &[&str] = &["cron", "crond", "anacron", "cronie", "atd"];

/// Runtimes whose first argument names the real program.
const INTERPRETERS: &[&str] = &[
    "node", "nodejs", "python", "ruby", "perl", "php", "java", "bun", "deno",
];

type Detector = fn(&[ProcessRecord]) -> Option<Source>;

/// Priority order of the detectors. Order is policy: do not sort by confidence.
const DETECTORS: &[Detector] = &[
    detect_container,
    detect_supervisor,
    detect_systemd,
    detect_launchd,
    detect_cron,
    detect_shell,
];

/// Classify an ancestry (root first, target last).
///
/// Total and deterministic: any input, including an empty one, yields exactly
/// one [`Source`].
pub fn classify(ancestry: &[ProcessRecord]) -> Source {
    DETECTORS
        .iter()
        .find_map(|detect| detect(ancestry))
        .unwrap_or(Source {
            source_type: SourceType::Unknown,
            name: None,
            confidence: UNKNOWN_CONFIDENCE,
        })
}

/// Lowercased program names a record may be known by: its short command,
/// the basename of argv[0], and for interpreters the script they run.
pub fn program_names(record: &ProcessRecord) -> Vec<String> {
    let mut names = vec![normalize(&record.command)];

    let mut args = record.cmdline.split_whitespace();
    if let Some(argv0) = args.next() {
        let program = normalize(basename(argv0));
        let runtime = program.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
        if INTERPRETERS.contains(&runtime) {
            if let Some(script) = args.find(|a| !a.starts_with('-')) {
                names.push(normalize(basename(script)));
            }
        }
        names.push(program);
    }

    let mut seen = HashSet::new();
    names.retain(|n| !n.is_empty() && seen.insert(n.clone()));
    names
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lowercase, drop a login-shell dash and a trailing colon (`sshd:`).
fn normalize(name: &str) -> String {
    name.trim()
        .trim_start_matches('-')
        .trim_end_matches(':')
        .to_lowercase()
}

fn is_named(record: &ProcessRecord, wanted: &str) -> bool {
    program_names(record).iter().any(|n| n == wanted)
}

fn named_in(record: &ProcessRecord, list: &[&str]) -> Option<String> {
    program_names(record)
        .into_iter()
        .find(|n| list.contains(&n.as_str()))
}

/// Everything above the target.
fn ancestors(ancestry: &[ProcessRecord]) -> &[ProcessRecord] {
    &ancestry[..ancestry.len().saturating_sub(1)]
}

fn found(source_type: SourceType, name: Option<String>, confidence: f64) -> Option<Source> {
    Some(Source {
        source_type,
        name,
        confidence,
    })
}

fn detect_container(ancestry: &[ProcessRecord]) -> Option<Source> {
    if let Some(rec) = ancestry.iter().rev().find(|r| !r.container.is_empty()) {
        return found(
            SourceType::Container,
            Some(rec.container.clone()),
            CONTAINER_CONFIDENCE,
        );
    }

    let shim = ancestors(ancestry).iter().rev().find_map(|rec| {
        program_names(rec)
            .into_iter()
            .find(|n| CONTAINER_SHIMS.iter().any(|shim| n.starts_with(shim)))
    })?;
    found(SourceType::Container, Some(shim), CONTAINER_CONFIDENCE)
}

fn detect_supervisor(ancestry: &[ProcessRecord]) -> Option<Source> {
    // Top-down so the outermost supervisor names the source.
    let name = ancestors(ancestry)
        .iter()
        .find_map(|rec| named_in(rec, SUPERVISORS))?;
    found(SourceType::Supervisor, Some(name), SUPERVISOR_CONFIDENCE)
}

fn detect_systemd(ancestry: &[ProcessRecord]) -> Option<Source> {
    let target = ancestry.last()?;
    if ancestry.first().is_some_and(|root| is_named(root, "launchd")) {
        return None;
    }

    let unit = (!target.service.is_empty()
        && !SCHEDULER_UNITS.contains(&target.service.as_str()))
    .then(|| format!("{}.service", target.service));
    let parent_is_manager = ancestors(ancestry)
        .last()
        .is_some_and(|parent| is_named(parent, "systemd"));

    if unit.is_none() && !parent_is_manager {
        return None;
    }
    found(
        SourceType::Systemd,
        unit.or_else(|| Some("systemd".to_string())),
        SYSTEMD_CONFIDENCE,
    )
}

fn detect_launchd(ancestry: &[ProcessRecord]) -> Option<Source> {
    let target = ancestry.last()?;
    if !ancestry.first().is_some_and(|root| is_named(root, "launchd")) {
        return None;
    }

    let parent_is_launchd = ancestors(ancestry)
        .last()
        .is_some_and(|parent| is_named(parent, "launchd"));

    if !target.service.is_empty() {
        found(
            SourceType::Launchd,
            Some(target.service.clone()),
            LAUNCHD_CONFIDENCE,
        )
    } else if parent_is_launchd {
        found(
            SourceType::Launchd,
            Some("launchd".to_string()),
            LAUNCHD_CONFIDENCE,
        )
    } else {
        None
    }
}

fn detect_cron(ancestry: &[ProcessRecord]) -> Option<Source> {
    let target = ancestry.last()?;
    if target.tty.is_some() {
        return None;
    }
    let name = ancestors(ancestry)
        .iter()
        .find_map(|rec| named_in(rec, CRON_NAMES))?;
    found(SourceType::Cron, Some(name), CRON_CONFIDENCE)
}

fn detect_shell(ancestry: &[ProcessRecord]) -> Option<Source> {
    // Nearest shell ancestor, preferring one attached to a terminal.
    let shells: Vec<(String, bool)> = ancestors(ancestry)
        .iter()
        .rev()
        .filter_map(|rec| named_in(rec, SHELLS).map(|name| (name, rec.tty.is_some())))
        .collect();
    let (name, _) = shells
        .iter()
        .find(|(_, interactive)| *interactive)
        .or_else(|| shells.first())?;
    found(SourceType::Shell, Some(name.clone()), SHELL_CONFIDENCE)
}
