//! Environment-only mode: the command line and environment of one process.

use std::process::ExitCode;

use anyhow::Result;

use crate::error::WitrError;
use crate::output;
use crate::platform::ProcessSource;
use crate::target;
use crate::types::{EnvReport, Target};

pub fn execute<S>(source: &S, target: &Target, as_json: bool) -> Result<ExitCode>
where
    S: ProcessSource + ?Sized,
{
    let report = match target::resolve_one(source, target).and_then(|pid| env_report(source, pid))
    {
        Ok(report) => report,
        Err(e) => return Ok(super::report_failure(&e, " --env")),
    };

    output::print_env(&report, as_json)?;
    Ok(ExitCode::SUCCESS)
}

pub fn env_report<S>(source: &S, pid: u32) -> Result<EnvReport, WitrError>
where
    S: ProcessSource + ?Sized,
{
    let process = source.get(pid)?;
    let env = source.environment(pid)?;
    Ok(EnvReport {
        command: process.display_command().to_string(),
        env,
    })
}
