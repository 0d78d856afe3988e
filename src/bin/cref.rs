// src/bin/cref.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use cref::{
    cli::{Cli, CliError, handlers},
    constants::RUN_MODE,
};

// --- Command Definition and Registry ---

/// A CLI mode and the handler that runs it. Handlers return the exit code.
struct CommandDefinition {
    name: &'static str,
    handler: fn(Vec<String>) -> Result<i32>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[CommandDefinition {
    name: RUN_MODE,
    handler: handlers::run::handle,
}];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY.iter().find(|cmd| cmd.name == name)
}

/// Sets up logging, parses arguments, dispatches to the handler, and
/// performs centralized error handling.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // --- Centralized Error Handling ---
            if let Some(CliError::Usage) = e.downcast_ref::<CliError>() {
                println!("{}", e);
                std::process::exit(1);
            }
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut args = cli.args.into_iter();
    let mode = args.next().ok_or(CliError::Usage)?;
    let command = find_command(&mode).ok_or(CliError::Usage)?;

    (command.handler)(args.collect())
}
