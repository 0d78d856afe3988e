// src/cli/mod.rs

use clap::Parser;
use std::path::Path;
use thiserror::Error;

pub mod handlers;

/// cref: compile a C file, run it, and recompile it with CTRL+R.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
#[command(override_usage = "cref run <file.c>")]
pub struct Cli {
    /// The mode (`run`) followed by the C source file.
    ///
    /// Kept as a plain list so that any other shape can be answered with the
    /// usage line instead of clap's own error.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{}", t!("cli.usage"))]
    Usage,
    #[error("{}", source_not_found_message(.0))]
    SourceNotFound(std::path::PathBuf),
}

fn source_not_found_message(path: &Path) -> String {
    format!(t!("cli.error.file_not_found"), path = path.display())
}
