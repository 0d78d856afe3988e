// src/system/supervisor.rs

use crate::models::{CompileReport, CompilerCommand, ExitOutcome};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const CHUNK_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Could not remove stale artifact '{path}': {source}")]
    StaleArtifact {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Command '{program}' could not be executed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Which kind of process currently occupies the child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Compiler,
    Program,
}

/// The single child process a session may have at any instant.
#[derive(Debug, Default)]
pub struct ActiveChild {
    slot: Option<(ChildKind, Child)>,
}

impl ActiveChild {
    /// Puts `child` in the slot. A child already there is killed first, so
    /// two children never coexist even if a caller forgets to clear the slot.
    pub fn attach(&mut self, kind: ChildKind, child: Child) {
        if let Some((old_kind, mut old)) = self.slot.take() {
            log::warn!(
                "{:?} process was still attached when a {:?} started; killing it.",
                old_kind,
                kind
            );
            if let Err(e) = old.start_kill() {
                log::debug!("Failed to kill replaced child: {}", e);
            }
        }
        log::debug!("{:?} process attached (PID: {:?}).", kind, child.id());
        self.slot = Some((kind, child));
    }

    #[cfg(test)]
    fn kind(&self) -> Option<ChildKind> {
        self.slot.as_ref().map(|(kind, _)| *kind)
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    /// Waits for the attached child and clears the slot.
    /// Never resolves when the slot is empty. Safe to cancel.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = match self.slot.as_mut() {
            Some((_, child)) => child.wait().await,
            None => return std::future::pending().await,
        };
        self.slot = None;
        status
    }

    /// Forcefully terminates the attached child, if any, and reaps it.
    /// A no-op on an empty slot; failures are swallowed since the process
    /// may already be gone.
    pub async fn kill(&mut self) {
        let Some((kind, mut child)) = self.slot.take() else {
            return;
        };
        log::debug!("Killing {:?} process (PID: {:?})...", kind, child.id());
        if let Err(e) = child.kill().await {
            log::debug!("Kill of {:?} process failed: {}", kind, e);
        }
    }
}

/// A running compiler together with the task draining its output.
#[derive(Debug)]
pub struct CompileJob {
    pub child: Child,
    pub output: JoinHandle<Vec<u8>>,
}

/// Builds the report once the compiler has exited with `status`.
pub async fn compile_report(
    output: JoinHandle<Vec<u8>>,
    status: io::Result<ExitStatus>,
) -> CompileReport {
    let mut bytes = output.await.unwrap_or_else(|e| {
        log::debug!("Compiler output collector failed: {}", e);
        Vec::new()
    });
    let succeeded = match status {
        Ok(status) => status.success(),
        Err(e) => {
            bytes.extend_from_slice(format!("{}\n", e).as_bytes());
            false
        }
    };
    CompileReport {
        succeeded,
        output: bytes,
    }
}

/// Spawns the compiler and the compiled program.
#[derive(Debug, Clone)]
pub struct Supervisor {
    compiler: CompilerCommand,
}

impl Supervisor {
    pub fn new(compiler: CompilerCommand) -> Self {
        Self { compiler }
    }

    /// Starts `<compiler> <flags...> -o <artifact> <source>`.
    ///
    /// Any artifact left from a previous cycle is removed first, so a failed
    /// compile can never leave an old binary behind to be run. The compiler
    /// gets no stdin; its stdout and stderr are collected together.
    pub fn start_compile(
        &self,
        source: &Path,
        artifact: &Path,
    ) -> Result<CompileJob, SupervisorError> {
        remove_artifact(artifact).map_err(|e| SupervisorError::StaleArtifact {
            path: artifact.display().to_string(),
            source: e,
        })?;

        let mut command = Command::new(&self.compiler.program);
        command
            .args(&self.compiler.args)
            .arg("-o")
            .arg(dunce::simplified(artifact))
            .arg(dunce::simplified(source))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        log::debug!("Spawning compiler: {:?}", command.as_std());

        let mut child = command.spawn().map_err(|e| SupervisorError::Spawn {
            program: self.compiler.program.clone(),
            source: e,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let output = tokio::spawn(collect_combined(stdout, stderr));

        Ok(CompileJob { child, output })
    }

    /// Starts the compiled program on the session's own terminal streams.
    pub fn start_run(&self, artifact: &Path) -> Result<Child, SupervisorError> {
        let mut command = Command::new(dunce::simplified(artifact));
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        log::debug!("Spawning program: {}", artifact.display());

        command.spawn().map_err(|e| SupervisorError::Spawn {
            program: artifact.display().to_string(),
            source: e,
        })
    }
}

/// Deletes the artifact. A missing file counts as success.
pub fn remove_artifact(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed artifact '{}'.", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Maps the status of a finished program to what the session reports.
pub fn exit_outcome(status: io::Result<ExitStatus>) -> ExitOutcome {
    match status {
        Ok(status) => match status.code() {
            Some(code) => ExitOutcome::NormalExit(code),
            None => ExitOutcome::KilledBySignal,
        },
        Err(e) => ExitOutcome::SpawnFailed(e.to_string()),
    }
}

/// Drains both pipes into one buffer, in the order chunks arrive.
async fn collect_combined<O, E>(mut stdout: Option<O>, mut stderr: Option<E>) -> Vec<u8>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut combined = Vec::new();
    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            chunk = read_chunk(&mut stdout) => absorb(&mut stdout, chunk, &mut combined),
            chunk = read_chunk(&mut stderr) => absorb(&mut stderr, chunk, &mut combined),
        }
    }
    combined
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut Option<R>) -> io::Result<Vec<u8>> {
    match reader {
        Some(reader) => {
            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            reader.read_buf(&mut chunk).await?;
            Ok(chunk)
        }
        None => std::future::pending().await,
    }
}

fn absorb<R>(reader: &mut Option<R>, chunk: io::Result<Vec<u8>>, combined: &mut Vec<u8>) {
    match chunk {
        Ok(chunk) if chunk.is_empty() => *reader = None,
        Ok(chunk) => combined.extend_from_slice(&chunk),
        Err(e) => {
            log::debug!("Stopped reading compiler output: {}", e);
            *reader = None;
        }
    }
}
