//! Renderers. Each consumes a finished [`Report`] or [`EnvReport`] unchanged.

pub mod json;
pub mod table;
pub mod text;
pub mod tree;

use anyhow::Result;

use crate::cli::OutputMode;
use crate::types::{EnvReport, Report};

pub fn print_report(report: &Report, mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Json => json::print(report)?,
        OutputMode::Warnings => println!("{}", text::warnings(&report.warnings)),
        OutputMode::Tree => println!("{}", tree::render(&report.ancestry)),
        OutputMode::Short => println!("{}", text::short(report)),
        OutputMode::Standard => println!("{}", text::standard(report)),
    }
    Ok(())
}

pub fn print_env(report: &EnvReport, as_json: bool) -> Result<()> {
    if as_json {
        json::print(report)
    } else {
        println!("{}", text::env(report));
        Ok(())
    }
}
