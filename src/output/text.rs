//! Human-readable renderers: standard, single-line, warnings-only, environment.

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::types::{EnvReport, ProcessRecord, Report};

fn label(name: &str) -> String {
    format!("{:<12}:", name).dimmed().to_string()
}

/// `name (pid N)`, bold for the target.
fn node(rec: &ProcessRecord, is_target: bool) -> String {
    let pid = format!("(pid {})", rec.pid);
    if is_target {
        format!("{} {}", rec.command.bold(), pid.yellow())
    } else {
        format!("{} {}", rec.command, pid)
    }
}

/// The ancestry on one line, root first.
pub fn chain(ancestry: &[ProcessRecord]) -> String {
    let last = ancestry.len().saturating_sub(1);
    ancestry
        .iter()
        .enumerate()
        .map(|(i, rec)| node(rec, i == last))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// "3 days ago", "5 minutes ago"...
pub fn relative_age(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(started_at).num_seconds().max(0);
    let (n, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3599 => (secs / 60, "minute"),
        3600..=86_399 => (secs / 3600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    let plural = if n == 1 { "" } else { "s" };
    format!("{n} {unit}{plural} ago")
}

fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    let mb = bytes as f64 / MB;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{:.1} MB", mb)
    }
}

/// `label: value` row.
fn row(name: &str, value: impl std::fmt::Display) -> String {
    format!("{} {}", label(name), value)
}

/// Continuation line aligned under the value column.
fn indented(value: impl std::fmt::Display) -> String {
    format!("{:<14}{}", "", value)
}

pub fn standard(report: &Report) -> String {
    let proc = &report.process;
    let mut lines = vec![
        row("Target", report.resolved_target.bold()),
        row("Process", node(proc, true)),
    ];

    if !proc.user.is_empty() {
        lines.push(row("User", &proc.user));
    }
    lines.push(row("Command", proc.display_command()));
    lines.push(row(
        "Started",
        format!(
            "{} ({})",
            relative_age(proc.started_at, Utc::now()),
            proc.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    ));
    if report.restart_count > 0 {
        lines.push(row("Restarts", report.restart_count));
    }

    lines.push(String::new());
    lines.push("Why It Exists:".cyan().bold().to_string());
    lines.push(format!("  {}", chain(&report.ancestry)));
    lines.push(String::new());

    lines.push(row(
        "Source",
        format!(
            "{} (confidence {:.0}%)",
            report.source.to_string().green(),
            report.source.confidence * 100.0
        ),
    ));
    for (name, value) in [
        ("Working Dir", &proc.working_dir),
        ("Container", &proc.container),
        ("Service", &proc.service),
    ] {
        if !value.is_empty() {
            lines.push(row(name, value));
        }
    }
    if !proc.bind_addresses.is_empty() {
        lines.push(row("Listening", proc.bind_addresses.join(", ")));
    }

    if let Some(sock) = &report.socket_info {
        let states: Vec<String> = sock
            .states
            .iter()
            .map(|(state, n)| format!("{state} ×{n}"))
            .collect();
        lines.push(row("Socket", states.join(", ")));
        lines.extend(sock.notes.iter().map(|note| indented(note.yellow())));
    }

    if let Some(res) = &report.resource_context {
        let mut parts = Vec::new();
        if let Some(t) = res.threads {
            parts.push(format!("{t} threads"));
        }
        if let Some(rss) = res.rss_bytes {
            parts.push(format!("{} RSS", format_bytes(rss)));
        }
        if let Some(cpu) = res.cpu_seconds {
            parts.push(format!("{cpu:.1}s CPU"));
        }
        if let Some(c) = res.thermal_celsius {
            parts.push(format!("host {c:.1}°C"));
        }
        if let Some(state) = &res.thermal_state {
            parts.push(format!("thermal {state}"));
        }
        if res.prevents_sleep == Some(true) {
            parts.push("preventing sleep".to_string());
        }
        if !parts.is_empty() {
            lines.push(row("Resources", parts.join(", ")));
        }
    }

    if let Some(files) = &report.file_context {
        let limit = files
            .fd_limit
            .map(|l| format!(" (limit {l})"))
            .unwrap_or_default();
        lines.push(row("Files", format!("{} open{}", files.open_files, limit)));
        lines.extend(files.locks.iter().map(|lock| indented(format!("lock {lock}"))));
    }

    if !report.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".red().bold().to_string());
        lines.extend(report.warnings.iter().map(|w| format!("  • {}", w.red())));
    }

    lines.join("\n")
}

/// Single-line summary: the ancestry chain.
pub fn short(report: &Report) -> String {
    chain(&report.ancestry)
}

pub fn warnings(warnings: &[String]) -> String {
    if warnings.is_empty() {
        return "No warnings.".green().to_string();
    }
    warnings
        .iter()
        .map(|w| format!("• {}", w.red()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn env(report: &EnvReport) -> String {
    let mut lines = vec![row("Command", report.command.bold()), String::new()];
    if report.env.is_empty() {
        lines.push("No environment variables found.".yellow().to_string());
        return lines.join("\n");
    }

    lines.push("Environment:".cyan().bold().to_string());
    lines.extend(report.env.iter().map(|entry| match entry.split_once('=') {
        Some((key, value)) => format!("  {}={}", key.green(), value),
        None => format!("  {entry}"),
    }));
    lines.join("\n")
}
