// src/cli/handlers/run.rs

use crate::{
    cli::CliError,
    core::{
        config_loader,
        paths,
        session::{Session, SessionInputs},
    },
    system::{
        interrupt,
        keys::KeyStream,
        supervisor::Supervisor,
        terminal::TerminalController,
    },
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Interrupts are rare; a small buffer is plenty.
const INTERRUPT_BUFFER: usize = 4;

///
/// Main entry point for the 'run' mode.
/// `args` are the arguments after `run`: exactly one source path.
/// Returns the exit code for the process.
///
pub fn handle(args: Vec<String>) -> Result<i32> {
    // 1. Validate arguments and the source file before touching the terminal.
    let source = parse_source_arg(args)?;
    let source = ensure_source_exists(source)?;

    // 2. Resolve the compiler command.
    let config = config_loader::load_config().context("Failed to load cref configuration")?;
    let compiler = config_loader::resolve_compiler(&config)?;
    log::debug!("Using compiler: {:?}", compiler);

    let artifact = paths::artifact_path_for(&source);
    log::debug!("Artifact for '{}': {}", source.display(), artifact.display());

    // 3. Run the session on a fresh runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        let (interrupt_tx, interrupt_rx) = mpsc::channel(INTERRUPT_BUFFER);
        let listener = interrupt::spawn_listener(interrupt_tx);

        let session = Session::new(
            source,
            artifact,
            Supervisor::new(compiler),
            TerminalController::new(),
            SessionInputs {
                keys: KeyStream::spawn_reader(),
                interrupts: interrupt_rx,
            },
        );
        let result = session.run().await;

        listener.abort();
        result
    })
}

/// Accepts exactly one argument: the source path.
fn parse_source_arg(args: Vec<String>) -> Result<PathBuf, CliError> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(path), None) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(CliError::Usage),
    }
}

fn ensure_source_exists(source: PathBuf) -> Result<PathBuf, CliError> {
    if !source.is_file() {
        return Err(CliError::SourceNotFound(source));
    }
    Ok(dunce::canonicalize(&source).unwrap_or(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_single_path_is_accepted() {
        let source = parse_source_arg(args(&["hello.c"])).unwrap();
        assert_eq!(source, PathBuf::from("hello.c"));
    }

    #[test]
    fn test_wrong_arity_is_a_usage_error() {
        assert!(matches!(parse_source_arg(args(&[])), Err(CliError::Usage)));
        assert!(matches!(parse_source_arg(args(&[""])), Err(CliError::Usage)));
        assert!(matches!(
            parse_source_arg(args(&["a.c", "b.c"])),
            Err(CliError::Usage)
        ));
    }

    #[test]
    fn test_missing_source_is_reported() {
        let result = ensure_source_exists(PathBuf::from("/definitely/not/here.c"));
        assert!(matches!(result, Err(CliError::SourceNotFound(_))));
    }

    #[test]
    fn test_directory_is_not_a_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = ensure_source_exists(dir.path().to_path_buf());
        assert!(matches!(result, Err(CliError::SourceNotFound(_))));
    }

    #[test]
    fn test_existing_source_is_made_absolute() {
        let file = NamedTempFile::new().unwrap();
        let source = ensure_source_exists(file.path().to_path_buf()).unwrap();
        assert!(source.is_absolute());
        assert!(source.is_file());
    }

    #[test]
    fn test_missing_source_fails_before_any_setup() {
        let result = handle(args(&["/definitely/not/here.c"]));
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::SourceNotFound(_))
        ));
    }
}
