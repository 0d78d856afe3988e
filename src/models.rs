// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEFAULT_COMPILER;

// --- SESSION STATE MACHINE MODELS ---

/// The lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Before the first compile.
    #[default]
    Idle,
    /// The compiler is running. The recompile key is still observed.
    Compiling,
    /// The last compile failed; waiting for a recompile key.
    CompileFailed,
    /// The target program holds the terminal.
    Running,
    /// The target program exited; waiting for `y` or `n`.
    AwaitingRerun,
    /// Terminal. Nothing is accepted after this.
    Exited,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Compiling => "compiling",
            Self::CompileFailed => "compile-failed",
            Self::Running => "running",
            Self::AwaitingRerun => "awaiting-rerun",
            Self::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// Something that happened to the session, from the terminal, a signal, or a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Kicks off the first compile.
    Start,
    /// A single byte read from the terminal in raw mode.
    Key(u8),
    /// The compiler exited.
    CompileFinished(CompileReport),
    /// The target program exited (or never started).
    RunFinished(ExitOutcome),
    /// SIGINT/SIGTERM, forwarded by the interrupt listener.
    Interrupt,
    /// No more keystrokes will ever arrive (EOF, or no terminal at all).
    InputClosed,
}

/// A side effect requested by a transition. Performed in order by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    KillChild,
    RestoreTerminal,
    EnterRaw,
    LineBreak,
    StartCompile,
    ReportCompileFailure(Vec<u8>),
    ReportWarnings(Vec<u8>),
    StartRun,
    ReportOutcome(ExitOutcome),
    PromptRerun,
    Echo(u8),
    RemoveArtifact,
    NoticeExiting,
    Exit(i32),
}

/// The result of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileReport {
    pub succeeded: bool,
    /// Stdout and stderr of the compiler, interleaved as they arrived.
    pub output: Vec<u8>,
}

impl CompileReport {
    /// True when a successful compile still printed something (warnings).
    pub fn has_warnings(&self) -> bool {
        self.succeeded && !self.output.is_empty()
    }
}

/// How the target program ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    NormalExit(i32),
    KilledBySignal,
    SpawnFailed(String),
}

// --- CONFIGURATION MODELS ---

/// Represents the deserialized structure of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CrefConfig {
    /// The compiler program. `~` and `$VAR` are expanded.
    pub compiler: String,
    /// Extra arguments placed before `-o <artifact> <source>`.
    pub flags: Vec<String>,
}

impl Default for CrefConfig {
    fn default() -> Self {
        Self {
            compiler: DEFAULT_COMPILER.to_string(),
            flags: Vec::new(),
        }
    }
}

/// A fully expanded compiler invocation, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    pub program: String,
    pub args: Vec<String>,
}
