pub mod ancestry;
pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod platform;
pub mod target;
pub mod types;

pub use cli::Cli;
pub use error::WitrError;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::CommandFactory;

pub fn run(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "witr", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(target) = cli.target() else {
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    let source = platform::native();
    if cli.env {
        commands::env::execute(&source, &target, cli.json)
    } else {
        commands::why::execute(&source, &target, cli.output_mode())
    }
}
