//! Default mode: explain why a process is running.

use std::process::ExitCode;
use std::thread;

use anyhow::Result;
use log::debug;

use crate::ancestry;
use crate::cli::OutputMode;
use crate::error::WitrError;
use crate::output;
use crate::platform::ProcessSource;
use crate::target;
use crate::types::{Report, Target, TargetKind};

pub fn execute<S>(source: &S, target: &Target, mode: OutputMode) -> Result<ExitCode>
where
    S: ProcessSource + ?Sized,
{
    let report = match target::resolve_one(source, target)
        .and_then(|pid| build_report(source, target, pid))
    {
        Ok(report) => report,
        Err(e) => return Ok(super::report_failure(&e, "")),
    };

    output::print_report(&report, mode)?;
    Ok(ExitCode::SUCCESS)
}

/// Run the ancestry pipeline for a resolved pid and assemble the report.
pub fn build_report<S>(source: &S, target: &Target, pid: u32) -> Result<Report, WitrError>
where
    S: ProcessSource + ?Sized,
{
    let chain = ancestry::build(source, pid)?;
    let process = chain
        .last()
        .cloned()
        .ok_or_else(|| WitrError::NotFound(format!("no process with pid {pid}")))?;

    let classified = ancestry::classify(&chain);
    let warnings = ancestry::warnings(&chain);
    let restart_count = ancestry::restart_count(&chain);
    debug!("pid {} classified as {}", pid, classified);

    let port = match target.kind {
        TargetKind::Port => target.parse_port().ok(),
        _ => None,
    };

    // Each context read is independent; a panic in one only loses that context.
    let (socket_info, resource_context, file_context) = thread::scope(|s| {
        let sockets = s.spawn(|| port.and_then(|p| source.socket_info(p)));
        let resources = s.spawn(|| source.resource_context(pid));
        let files = s.spawn(|| source.file_context(pid));
        (
            sockets.join().ok().flatten(),
            resources.join().ok().flatten().filter(|r| !r.is_empty()),
            files.join().ok().flatten(),
        )
    });

    Ok(Report {
        target: target.clone(),
        resolved_target: process.command.clone(),
        process,
        restart_count,
        ancestry: chain,
        source: classified,
        warnings,
        socket_info,
        resource_context,
        file_context,
    })
}
