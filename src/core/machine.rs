// src/core/machine.rs

//! The session state machine.
//!
//! `transition` is pure: it maps the current phase and an event to the next
//! phase and the ordered list of side effects the session must perform. It
//! never touches the terminal or a process, so every rule below can be tested
//! without either.

use crate::{
    constants::{INTERRUPT_KEY, RECOMPILE_KEY},
    models::{Action, Event, Phase},
};

/// The phase to move to and what to do on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Phase,
    pub actions: Vec<Action>,
}

impl Transition {
    fn stay(phase: Phase) -> Self {
        Self {
            next: phase,
            actions: Vec::new(),
        }
    }

    fn to(next: Phase, actions: Vec<Action>) -> Self {
        Self { next, actions }
    }

    /// True when the event changed nothing.
    pub fn is_noop(&self, from: Phase) -> bool {
        self.next == from && self.actions.is_empty()
    }
}

/// Computes the transition for `event` arriving in `phase`.
pub fn transition(phase: Phase, event: &Event) -> Transition {
    if phase == Phase::Exited {
        return Transition::stay(phase);
    }

    match (phase, event) {
        (_, Event::Interrupt) | (_, Event::Key(INTERRUPT_KEY)) => Transition::to(
            Phase::Exited,
            vec![
                Action::KillChild,
                Action::RestoreTerminal,
                Action::RemoveArtifact,
                Action::NoticeExiting,
                Action::Exit(0),
            ],
        ),

        (_, Event::Key(RECOMPILE_KEY)) => Transition::to(
            Phase::Compiling,
            vec![
                Action::KillChild,
                Action::RestoreTerminal,
                Action::LineBreak,
                Action::EnterRaw,
                Action::StartCompile,
            ],
        ),

        (Phase::Idle, Event::Start) => Transition::to(Phase::Compiling, vec![Action::StartCompile]),

        (Phase::Compiling, Event::CompileFinished(report)) if report.succeeded => {
            let mut actions = vec![Action::RestoreTerminal];
            if report.has_warnings() {
                actions.push(Action::ReportWarnings(report.output.clone()));
            }
            actions.push(Action::StartRun);
            Transition::to(Phase::Running, actions)
        }
        (Phase::Compiling, Event::CompileFinished(report)) => Transition::to(
            Phase::CompileFailed,
            vec![
                Action::RestoreTerminal,
                Action::ReportCompileFailure(report.output.clone()),
                Action::EnterRaw,
            ],
        ),

        (Phase::Running, Event::RunFinished(outcome)) => Transition::to(
            Phase::AwaitingRerun,
            vec![
                Action::EnterRaw,
                Action::ReportOutcome(outcome.clone()),
                Action::PromptRerun,
            ],
        ),

        (Phase::AwaitingRerun, Event::Key(key @ (b'y' | b'Y'))) => Transition::to(
            Phase::Running,
            vec![Action::RestoreTerminal, Action::Echo(*key), Action::StartRun],
        ),
        (Phase::AwaitingRerun, Event::Key(key @ (b'n' | b'N'))) => Transition::to(
            Phase::Exited,
            vec![
                Action::RestoreTerminal,
                Action::Echo(*key),
                Action::KillChild,
                Action::RemoveArtifact,
                Action::Exit(0),
            ],
        ),

        // A child in the foreground finishes on its own; the input going away
        // only matters once the session would wait for a key.
        (Phase::Idle | Phase::CompileFailed | Phase::AwaitingRerun, Event::InputClosed) => {
            Transition::to(
                Phase::Exited,
                vec![
                    Action::KillChild,
                    Action::RestoreTerminal,
                    Action::RemoveArtifact,
                    Action::Exit(0),
                ],
            )
        }

        _ => Transition::stay(phase),
    }
}

/// Whether `event`, arriving while a child runs in `phase`, must cut the wait short.
pub fn preempts(phase: Phase, event: &Event) -> bool {
    !transition(phase, event).is_noop(phase)
}
