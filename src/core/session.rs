// src/core/session.rs

//! The compile-run orchestrator.
//!
//! A [`Session`] is the single owner of everything that can race: the child
//! process, the terminal mode, and both input channels. The keystroke reader
//! and the interrupt listener only send messages; every kill, restore and
//! file removal happens here, one action at a time, in the order the state
//! machine asks for.

use crate::{
    core::machine,
    models::{Action, CompileReport, Event, ExitOutcome, Phase},
    system::{
        interrupt::Interrupt,
        keys::KeyStream,
        supervisor::{self, ActiveChild, ChildKind, Supervisor},
        terminal::{CrosstermBackend, ModeBackend, TerminalController},
    },
};
use anyhow::Result;
use colored::Colorize;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::sync::{mpsc, watch};

/// Everything that can reach the session from outside while it waits.
#[derive(Debug)]
pub struct SessionInputs {
    pub keys: KeyStream,
    pub interrupts: mpsc::Receiver<Interrupt>,
}

impl SessionInputs {
    /// The next key or interrupt. Interrupts win when both are ready.
    async fn next(&mut self) -> Event {
        tokio::select! {
            biased;
            Some(Interrupt) = self.interrupts.recv() => Event::Interrupt,
            key = self.keys.next() => key.map_or(Event::InputClosed, Event::Key),
        }
    }

    /// An interrupt that has already arrived, if any.
    fn pending_interrupt(&mut self) -> Option<Event> {
        self.interrupts.try_recv().ok().map(|Interrupt| Event::Interrupt)
    }

    async fn next_interrupt(&mut self) -> Event {
        match self.interrupts.recv().await {
            Some(Interrupt) => Event::Interrupt,
            None => std::future::pending().await,
        }
    }
}

/// What performing one action leads to.
enum Step {
    Continue,
    Follow(Event),
    Exit(i32),
}

/// One watch-compile-run session for a single source file.
#[derive(Debug)]
pub struct Session<B: ModeBackend = CrosstermBackend> {
    source: PathBuf,
    artifact: PathBuf,
    phase: Phase,
    supervisor: Supervisor,
    child: ActiveChild,
    terminal: TerminalController<B>,
    inputs: SessionInputs,
    phase_tx: watch::Sender<Phase>,
}

impl<B: ModeBackend> Session<B> {
    pub fn new(
        source: PathBuf,
        artifact: PathBuf,
        supervisor: Supervisor,
        terminal: TerminalController<B>,
        inputs: SessionInputs,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            source,
            artifact,
            phase: Phase::Idle,
            supervisor,
            child: ActiveChild::default(),
            terminal,
            inputs,
            phase_tx,
        }
    }

    /// Follows the phase the session has settled in.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Drives the session until it exits. Returns the process exit code.
    pub async fn run(mut self) -> Result<i32> {
        let raw = self.terminal.enter_raw();
        self.print_banner()?;

        if let Err(e) = raw {
            log::warn!("Raw mode unavailable, keyboard controls disabled: {}", e);
            self.write_line(
                &format!(t!("session.warning.raw_mode_unavailable"), reason = e)
                    .yellow()
                    .to_string(),
            )?;
            self.inputs.keys = KeyStream::closed();
        } else {
            self.inputs.keys.resume();
        }

        let mut event = Event::Start;
        loop {
            if let Some(code) = self.dispatch(event).await? {
                log::debug!("Session finished with exit code {}.", code);
                return Ok(code);
            }
            event = if self.inputs.keys.is_closed() {
                Event::InputClosed
            } else {
                self.inputs.next().await
            };
        }
    }

    /// Feeds `event` to the state machine and performs the resulting actions,
    /// including any events those actions produce.
    async fn dispatch(&mut self, event: Event) -> Result<Option<i32>> {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let transition = machine::transition(self.phase, &event);
            if transition.is_noop(self.phase) {
                log::trace!("Ignoring {:?} in phase {}.", event, self.phase);
                continue;
            }
            log::debug!("{} -> {} on {:?}", self.phase, transition.next, event);
            self.phase = transition.next;

            for action in transition.actions {
                // Long waits are announced before they start; everything else
                // once the whole transition has been applied.
                if matches!(action, Action::StartCompile | Action::StartRun) {
                    self.publish_phase();
                }
                match self.perform(action).await? {
                    Step::Continue => {}
                    Step::Follow(next) => queue.push_back(next),
                    Step::Exit(code) => {
                        self.publish_phase();
                        return Ok(Some(code));
                    }
                }
            }
            self.publish_phase();
        }

        Ok(None)
    }

    async fn perform(&mut self, action: Action) -> Result<Step> {
        match action {
            Action::KillChild => self.child.kill().await,
            Action::RestoreTerminal => self.restore_terminal(),
            Action::EnterRaw => self.enter_raw(),
            Action::LineBreak => self.write_line("")?,
            Action::StartCompile => return Ok(Step::Follow(self.compile().await)),
            Action::ReportCompileFailure(output) => {
                let newline = self.terminal.newline();
                self.write_line(&t!("session.compile.failed").red().to_string())?;
                self.write(&format!("{}{}", output_block(&output, newline), newline))?;
            }
            Action::ReportWarnings(output) => {
                let newline = self.terminal.newline();
                self.write(&warning_block(&output, newline))?;
            }
            Action::StartRun => return Ok(Step::Follow(self.run_program().await)),
            Action::ReportOutcome(outcome) => {
                if let Some(message) = outcome_message(&outcome) {
                    self.write_line(&message.red().to_string())?;
                }
            }
            Action::PromptRerun => {
                if !self.inputs.keys.is_closed() {
                    self.write(&t!("session.prompt.rerun").cyan().to_string())?;
                }
            }
            Action::Echo(key) => self.write_line(&char::from(key).to_string())?,
            Action::RemoveArtifact => {
                if let Err(e) = supervisor::remove_artifact(&self.artifact) {
                    log::warn!(
                        "Could not remove artifact '{}': {}",
                        self.artifact.display(),
                        e
                    );
                }
            }
            Action::NoticeExiting => {
                self.write_line("")?;
                self.write_line(&t!("session.info.exiting").yellow().to_string())?;
            }
            Action::Exit(code) => return Ok(Step::Exit(code)),
        }
        Ok(Step::Continue)
    }

    /// Runs the compiler to completion, unless something that matters in
    /// `Compiling` (the recompile key, an interrupt) arrives first. In that
    /// case the compiler is left attached for the next transition to kill.
    async fn compile(&mut self) -> Event {
        let job = match self.supervisor.start_compile(&self.source, &self.artifact) {
            Ok(job) => job,
            Err(e) => {
                log::debug!("Compile could not start: {}", e);
                return Event::CompileFinished(CompileReport {
                    succeeded: false,
                    output: format!("{}\n", e).into_bytes(),
                });
            }
        };
        self.child.attach(ChildKind::Compiler, job.child);
        let output = job.output;

        loop {
            tokio::select! {
                status = self.child.wait() => {
                    let report = supervisor::compile_report(output, status).await;
                    return Event::CompileFinished(report);
                }
                event = self.inputs.next() => {
                    if machine::preempts(self.phase, &event) {
                        output.abort();
                        return event;
                    }
                    log::trace!("Ignoring {:?} while compiling.", event);
                }
            }
        }
    }

    /// Runs the program with the terminal handed over to it. Keys are not
    /// read meanwhile, so the program sees every byte typed (the recompile
    /// key included); only an interrupt cuts the run short.
    async fn run_program(&mut self) -> Event {
        let child = match self.supervisor.start_run(&self.artifact) {
            Ok(child) => child,
            Err(e) => return Event::RunFinished(ExitOutcome::SpawnFailed(e.to_string())),
        };
        self.child.attach(ChildKind::Program, child);

        tokio::select! {
            biased;
            event = self.inputs.next_interrupt() => event,
            status = self.child.wait() => run_finished(status, &mut self.inputs),
        }
    }

    fn enter_raw(&mut self) {
        if self.inputs.keys.is_closed() {
            return;
        }
        match self.terminal.enter_raw() {
            Ok(()) => self.inputs.keys.resume(),
            Err(e) => log::debug!("Could not re-enter raw mode: {}", e),
        }
    }

    fn restore_terminal(&mut self) {
        self.inputs.keys.pause();
        self.terminal.restore();
    }

    fn publish_phase(&self) {
        self.phase_tx.send_replace(self.phase);
    }

    fn print_banner(&self) -> io::Result<()> {
        self.write_line(&t!("session.banner.title").cyan().to_string())?;
        self.write_line(&format!(
            t!("session.banner.hint"),
            key = "CTRL+R".green()
        ))?;
        self.write_line("")
    }

    fn write(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    fn write_line(&self, text: &str) -> io::Result<()> {
        self.write(&format!("{}{}", text, self.terminal.newline()))
    }
}

/// How a finished run is reported. Ctrl+C reaches the program and cref
/// together, so an interrupt that is already queued wins over the exit status.
fn run_finished(status: io::Result<ExitStatus>, inputs: &mut SessionInputs) -> Event {
    inputs
        .pending_interrupt()
        .unwrap_or_else(|| Event::RunFinished(supervisor::exit_outcome(status)))
}

/// Compiler output with trailing newlines dropped and `newline` between lines.
fn output_block(output: &[u8], newline: &str) -> String {
    String::from_utf8_lossy(output)
        .trim_end_matches(['\r', '\n'])
        .replace("\r\n", "\n")
        .replace('\n', newline)
}

/// Compiler warnings in yellow, ending with exactly one newline.
fn warning_block(output: &[u8], newline: &str) -> String {
    format!("{}{}", output_block(output, newline).yellow(), newline)
}

/// The line printed after a run, if the run did not end cleanly.
pub fn outcome_message(outcome: &ExitOutcome) -> Option<String> {
    match outcome {
        ExitOutcome::NormalExit(0) => None,
        ExitOutcome::NormalExit(code) => {
            Some(format!(t!("session.run.exited_with_code"), code = code))
        }
        ExitOutcome::KilledBySignal => Some(t!("session.run.killed_by_signal").to_string()),
        ExitOutcome::SpawnFailed(reason) => {
            Some(format!(t!("session.run.spawn_failed"), reason = reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_exit_prints_nothing() {
        assert_eq!(outcome_message(&ExitOutcome::NormalExit(0)), None);
    }

    #[test]
    fn test_nonzero_exit_reports_code() {
        let message = outcome_message(&ExitOutcome::NormalExit(3)).unwrap();
        assert!(message.contains("exited with code 3"));
    }

    #[test]
    fn test_output_block_trims_and_translates_newlines() {
        assert_eq!(output_block(b"a.c:1: warning\nnote\n\n", "\r\n"), "a.c:1: warning\r\nnote");
        assert_eq!(output_block(b"one\r\ntwo\r\n", "\n"), "one\ntwo");
        assert_eq!(output_block(b"", "\n"), "");
    }

    #[test]
    fn test_colored_warnings_end_with_a_single_newline() {
        colored::control::set_override(true);
        let block = warning_block(b"a.c:2:5: warning: unused variable\n", "\r\n");
        colored::control::unset_override();

        assert!(block.ends_with("\x1b[0m\r\n"));
        assert_eq!(block.matches('\n').count(), 1);
    }

    #[test]
    fn test_signal_and_spawn_failures_are_reported() {
        assert!(outcome_message(&ExitOutcome::KilledBySignal).is_some());
        let message = outcome_message(&ExitOutcome::SpawnFailed("denied".to_string())).unwrap();
        assert!(message.contains("denied"));
    }
}
