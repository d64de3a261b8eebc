use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use env_logger::Env;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::new().filter_or("WITR_LOG", "warn"))
        .format_timestamp(None)
        .init();

    let cli = witr::Cli::parse();
    match witr::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
