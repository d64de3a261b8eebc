use clap::{ArgGroup, Parser};
use clap_complete::Shell;

use crate::types::Target;

#[derive(Parser, Debug)]
#[command(name = "witr")]
#[command(version, about = "Explain why a process is running: its ancestry, origin and warnings")]
#[command(group(ArgGroup::new("target").args(["name", "pid", "port"])))]
pub struct Cli {
    /// Process name (case-insensitive substring of the command line)
    pub name: Option<String>,

    /// Explain a specific PID
    #[arg(long, value_name = "N")]
    pub pid: Option<String>,

    /// Explain the process listening on a port
    #[arg(long, value_name = "N")]
    pub port: Option<String>,

    /// Single-line summary
    #[arg(long)]
    pub short: bool,

    /// Show the full ancestry as a tree
    #[arg(long)]
    pub tree: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show warnings
    #[arg(long)]
    pub warnings: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Only show the environment variables of the process
    #[arg(long)]
    pub env: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

/// Which renderer handles a report; `--json` wins over everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Warnings,
    Tree,
    Short,
    Standard,
}

impl Cli {
    /// The requested target, if any was given.
    pub fn target(&self) -> Option<Target> {
        if let Some(pid) = &self.pid {
            Some(Target::pid(pid.as_str()))
        } else if let Some(port) = &self.port {
            Some(Target::port(port.as_str()))
        } else {
            self.name.as_deref().map(Target::name)
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.warnings {
            OutputMode::Warnings
        } else if self.tree {
            OutputMode::Tree
        } else if self.short {
            OutputMode::Short
        } else {
            OutputMode::Standard
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("witr").chain(args.iter().copied()))
    }

    #[test]
    fn test_target_from_flags() {
        let cli = parse(&["--pid", "42"]).unwrap();
        assert_eq!(cli.target(), Some(Target::pid("42")));

        let cli = parse(&["--port", "8080"]).unwrap();
        assert_eq!(cli.target().unwrap().kind, TargetKind::Port);

        let cli = parse(&["nginx"]).unwrap();
        assert_eq!(cli.target(), Some(Target::name("nginx")));

        assert_eq!(parse(&[]).unwrap().target(), None);
    }

    #[test]
    fn test_flags_after_positional() {
        let cli = parse(&["nginx", "--json", "--no-color"]).unwrap();
        assert!(cli.json);
        assert!(cli.no_color);
    }

    #[test]
    fn test_targets_are_mutually_exclusive() {
        let err = parse(&["--pid", "1", "--port", "80"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(parse(&["nginx", "--pid", "1"]).is_err());
    }

    #[test]
    fn test_output_mode_precedence() {
        let mode = |args: &[&str]| parse(args).unwrap().output_mode();
        assert_eq!(mode(&["x", "--short", "--tree", "--warnings", "--json"]), OutputMode::Json);
        assert_eq!(mode(&["x", "--short", "--tree", "--warnings"]), OutputMode::Warnings);
        assert_eq!(mode(&["x", "--short", "--tree"]), OutputMode::Tree);
        assert_eq!(mode(&["x", "--short"]), OutputMode::Short);
        assert_eq!(mode(&["x"]), OutputMode::Standard);
    }

    #[test]
    fn test_negative_pid_is_accepted_by_parser() {
        // Validation happens in the resolver so the error is reported uniformly.
        let cli = parse(&["--pid=-5"]).unwrap();
        assert_eq!(cli.target(), Some(Target::pid("-5")));
    }
}
