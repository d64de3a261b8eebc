pub mod env;
pub mod why;

use std::process::ExitCode;

use colored::Colorize;

use crate::error::WitrError;
use crate::output;

/// Print a resolution failure with the matching remediation hint.
///
/// `rerun_suffix` is appended to the `witr --pid <pid>` hint shown for
/// ambiguous names (`" --env"` in environment mode).
pub(crate) fn report_failure(err: &WitrError, rerun_suffix: &str) -> ExitCode {
    match err {
        WitrError::AmbiguousMatch(candidates) => {
            println!("{}\n", "Multiple matching processes found:".yellow().bold());
            println!("{}", output::table::candidates(candidates));
            println!("\nRe-run with:");
            println!("  witr --pid <pid>{rerun_suffix}");
        }
        WitrError::PermissionDenied { .. } => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            eprintln!(
                "\nA socket is bound to this port but its owning process could not be read."
            );
            eprintln!("This usually means insufficient permissions. Try:");
            eprintln!("  sudo {}", std::env::args().collect::<Vec<_>>().join(" "));
        }
        _ => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            if let Some(hint) = failure_hint(err) {
                eprintln!("\n{hint}");
            }
            eprintln!("Run 'witr --help' for usage and options.");
        }
    }
    ExitCode::FAILURE
}

/// Remediation text for errors that stem from the query itself.
fn failure_hint(err: &WitrError) -> Option<&'static str> {
    match err {
        WitrError::NotFound(_) | WitrError::MalformedTarget(_) => Some(
            "No matching process or service found. Check your query or try a different name, port or PID.",
        ),
        _ => None,
    }
}
