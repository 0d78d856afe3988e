// src/system/terminal.rs

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("no controlling terminal: {0}")]
    NoTty(#[source] io::Error),
}

/// The primitive that actually flips the terminal between raw and cooked mode.
pub trait ModeBackend: Send {
    fn enable_raw(&mut self) -> io::Result<()>;
    fn disable_raw(&mut self) -> io::Result<()>;
}

/// Raw mode through crossterm (termios on unix, console modes on Windows).
#[derive(Debug, Default)]
pub struct CrosstermBackend;

impl ModeBackend for CrosstermBackend {
    fn enable_raw(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw(&mut self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }
}

/// Proof that raw mode is currently on. Only the controller creates one.
#[derive(Debug)]
struct RawHandle(());

/// Owns the terminal mode for the session.
///
/// `enter_raw` and `restore` are both idempotent, so every code path can
/// call them without tracking what the previous path did. Dropping the
/// controller puts the terminal back in cooked mode.
#[derive(Debug)]
pub struct TerminalController<B: ModeBackend = CrosstermBackend> {
    backend: B,
    handle: Option<RawHandle>,
}

impl TerminalController<CrosstermBackend> {
    /// A controller for the process's real terminal.
    pub fn new() -> Self {
        Self::with_backend(CrosstermBackend)
    }
}

impl Default for TerminalController<CrosstermBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ModeBackend> TerminalController<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            handle: None,
        }
    }

    /// Switches to raw mode. A no-op when raw mode is already held.
    pub fn enter_raw(&mut self) -> Result<(), TerminalError> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.backend.enable_raw().map_err(TerminalError::NoTty)?;
        self.handle = Some(RawHandle(()));
        log::trace!("Terminal switched to raw mode.");
        Ok(())
    }

    /// Returns the terminal to the mode it had before `enter_raw`.
    /// Safe to call any number of times; errors are logged, never raised.
    pub fn restore(&mut self) {
        if self.handle.take().is_none() {
            return;
        }
        if let Err(e) = self.backend.disable_raw() {
            log::debug!("Failed to restore terminal mode: {}", e);
        } else {
            log::trace!("Terminal restored to cooked mode.");
        }
    }

    pub fn is_raw(&self) -> bool {
        self.handle.is_some()
    }

    /// The line terminator to use for output right now. Raw mode turns off
    /// the `\n` → `\r\n` translation.
    pub fn newline(&self) -> &'static str {
        if self.is_raw() { "\r\n" } else { "\n" }
    }
}

impl<B: ModeBackend> Drop for TerminalController<B> {
    fn drop(&mut self) {
        self.restore();
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;

    #[test]
    fn test_enter_raw_is_idempotent() {
        let backend = FakeBackend::default();
        let mut terminal = TerminalController::with_backend(backend.clone());

        terminal.enter_raw().unwrap();
        terminal.enter_raw().unwrap();

        assert!(terminal.is_raw());
        assert_eq!(backend.calls(), vec!["enable"]);
    }

    #[test]
    fn test_restore_without_handle_is_a_noop() {
        let backend = FakeBackend::default();
        let mut terminal = TerminalController::with_backend(backend.clone());

        terminal.restore();
        terminal.restore();

        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_repeated_restore_disables_once() {
        let backend = FakeBackend::default();
        let mut terminal = TerminalController::with_backend(backend.clone());

        terminal.enter_raw().unwrap();
        terminal.restore();
        terminal.restore();
        terminal.enter_raw().unwrap();
        terminal.restore();

        assert_eq!(backend.calls(), vec!["enable", "disable", "enable", "disable"]);
    }

    #[test]
    fn test_no_tty_is_reported_and_leaves_mode_untouched() {
        let mut terminal = TerminalController::with_backend(FakeBackend::without_tty());

        let result = terminal.enter_raw();

        assert!(matches!(result, Err(TerminalError::NoTty(_))));
        assert!(!terminal.is_raw());
        terminal.restore();
    }

    #[test]
    fn test_drop_restores_raw_mode() {
        let backend = FakeBackend::default();
        {
            let mut terminal = TerminalController::with_backend(backend.clone());
            terminal.enter_raw().unwrap();
        }
        assert_eq!(backend.calls(), vec!["enable", "disable"]);
    }

    #[test]
    fn test_newline_follows_mode() {
        let mut terminal = TerminalController::with_backend(FakeBackend::default());
        assert_eq!(terminal.newline(), "\n");
        terminal.enter_raw().unwrap();
        assert_eq!(terminal.newline(), "\r\n");
    }
}
