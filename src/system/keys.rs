// src/system/keys.rs

use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How long one poll may hold the gate. Bounds how long `pause` can block.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How often a paused reader checks whether it was resumed.
const PAUSED_INTERVAL: Duration = Duration::from_millis(20);

/// Where the reader thread gets terminal events from.
pub trait EventSource: Send + 'static {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<TermEvent>;
}

/// The process's terminal, through crossterm's global event queue.
#[derive(Debug, Default)]
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<TermEvent> {
        event::read()
    }
}

/// Switch shared between the session and the reader thread.
///
/// The reader holds the lock for the whole of each poll/read, so once
/// `close` returns no read is in flight and none will start.
#[derive(Debug, Clone, Default)]
struct KeyGate {
    open: Arc<Mutex<bool>>,
}

impl KeyGate {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, open: bool) {
        *self.lock() = open;
    }
}

/// The session's end of the keystroke channel.
#[derive(Debug)]
pub struct KeyStream {
    rx: UnboundedReceiver<u8>,
    gate: Option<KeyGate>,
    closed: bool,
}

impl KeyStream {
    /// Starts the reader thread on the process's terminal. The reader starts paused.
    pub fn spawn_reader() -> Self {
        Self::spawn_reader_with(CrosstermEvents)
    }

    pub fn spawn_reader_with<S: EventSource>(source: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = KeyGate::default();
        let thread_gate = gate.clone();

        let spawned = thread::Builder::new()
            .name("cref-keys".to_string())
            .spawn(move || read_keys(source, &thread_gate, &tx));
        if let Err(e) = spawned {
            // The sender went down with the closure, so the stream reads as closed.
            log::warn!("Could not start the keystroke reader: {}", e);
        }

        Self {
            rx,
            gate: Some(gate),
            closed: false,
        }
    }

    /// A stream fed by hand instead of a terminal.
    pub fn channel() -> (Self, UnboundedSender<u8>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Self {
            rx,
            gate: None,
            closed: false,
        };
        (stream, tx)
    }

    /// A stream that never yields a key. Used when there is no terminal.
    pub fn closed() -> Self {
        let (stream, tx) = Self::channel();
        drop(tx);
        stream
    }

    /// The next byte, or `None` once the source is gone. After that it never resolves again.
    pub async fn next(&mut self) -> Option<u8> {
        if self.closed {
            return std::future::pending().await;
        }
        match self.rx.recv().await {
            Some(byte) => Some(byte),
            None => {
                self.closed = true;
                None
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed || (self.rx.is_closed() && self.rx.is_empty())
    }

    /// Stops the reader from touching the terminal. Blocks until any in-flight poll ends.
    pub fn pause(&self) {
        if let Some(gate) = &self.gate {
            gate.set(false);
        }
    }

    /// Lets the reader poll again. Keys buffered before the pause are dropped,
    /// both here and in the terminal layer's own queue.
    pub fn resume(&mut self) {
        while self.rx.try_recv().is_ok() {}
        if let Some(gate) = &self.gate {
            gate.set(true);
        }
    }
}

fn read_keys<S: EventSource>(mut source: S, gate: &KeyGate, tx: &UnboundedSender<u8>) {
    let mut was_open = false;
    loop {
        if tx.is_closed() {
            return;
        }

        let open = gate.lock();
        if !*open {
            drop(open);
            was_open = false;
            thread::sleep(PAUSED_INTERVAL);
            continue;
        }

        // crossterm may have parsed input ahead of the pause; it is stale now.
        if !was_open {
            if let Err(e) = discard_pending(&mut source) {
                log::debug!("Keystroke reader stopped while discarding input: {}", e);
                return;
            }
            was_open = true;
        }

        match source.poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log::debug!("Keystroke reader stopped while polling: {}", e);
                return;
            }
        }

        match source.read() {
            Ok(TermEvent::Key(key)) => {
                if let Some(byte) = key_to_byte(&key) {
                    log::trace!("Key byte {} read from terminal.", byte);
                    if tx.send(byte).is_err() {
                        return;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("Keystroke reader stopped while reading: {}", e);
                return;
            }
        }
    }
}

fn discard_pending<S: EventSource>(source: &mut S) -> io::Result<()> {
    let mut discarded = 0usize;
    while source.poll(Duration::ZERO)? {
        source.read()?;
        discarded += 1;
    }
    if discarded > 0 {
        log::trace!("Discarded {} buffered terminal events.", discarded);
    }
    Ok(())
}

/// Maps a decoded key back to the byte a raw terminal would have sent.
pub fn key_to_byte(key: &KeyEvent) -> Option<u8> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let lower = c.to_ascii_lowercase();
            if lower.is_ascii_lowercase() {
                u8::try_from(lower).ok().map(|b| b & 0x1f)
            } else {
                None
            }
        }
        KeyCode::Char(c) => u8::try_from(c).ok().filter(u8::is_ascii),
        KeyCode::Enter => Some(b'\r'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x7f),
        KeyCode::Esc => Some(0x1b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{INTERRUPT_KEY, RECOMPILE_KEY};
    use std::collections::VecDeque;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_ctrl_r_maps_to_recompile_byte() {
        let key = press(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(key_to_byte(&key), Some(RECOMPILE_KEY));
        let shifted = press(KeyCode::Char('R'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(key_to_byte(&shifted), Some(RECOMPILE_KEY));
    }

    #[test]
    fn test_ctrl_c_maps_to_interrupt_byte() {
        let key = press(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_byte(&key), Some(INTERRUPT_KEY));
    }

    #[test]
    fn test_plain_ascii_passes_through() {
        assert_eq!(key_to_byte(&press(KeyCode::Char('y'), KeyModifiers::NONE)), Some(b'y'));
        assert_eq!(key_to_byte(&press(KeyCode::Char('N'), KeyModifiers::SHIFT)), Some(b'N'));
        assert_eq!(key_to_byte(&press(KeyCode::Char(' '), KeyModifiers::NONE)), Some(b' '));
        assert_eq!(key_to_byte(&press(KeyCode::Enter, KeyModifiers::NONE)), Some(b'\r'));
    }

    #[test]
    fn test_unmappable_keys_are_dropped() {
        assert_eq!(key_to_byte(&press(KeyCode::Char('é'), KeyModifiers::NONE)), None);
        assert_eq!(key_to_byte(&press(KeyCode::Up, KeyModifiers::NONE)), None);
        assert_eq!(key_to_byte(&press(KeyCode::F(5), KeyModifiers::NONE)), None);

        let mut release = press(KeyCode::Char('y'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_byte(&release), None);
    }

    /// Terminal events fed by the test instead of a tty.
    #[derive(Debug, Clone, Default)]
    struct ScriptedEvents {
        queue: Arc<Mutex<VecDeque<TermEvent>>>,
    }

    impl ScriptedEvents {
        fn type_char(&self, c: char) {
            let key = press(KeyCode::Char(c), KeyModifiers::NONE);
            self.queue.lock().unwrap().push_back(TermEvent::Key(key));
        }

        fn is_drained(&self) -> bool {
            self.queue.lock().unwrap().is_empty()
        }
    }

    impl EventSource for ScriptedEvents {
        fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
            if self.is_drained() {
                thread::sleep(timeout.min(Duration::from_millis(5)));
            }
            Ok(!self.is_drained())
        }

        fn read(&mut self) -> io::Result<TermEvent> {
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::other("no event queued"))
        }
    }

    #[tokio::test]
    async fn test_input_queued_while_paused_is_discarded_on_resume() {
        let events = ScriptedEvents::default();
        events.type_char('n');
        events.type_char('n');

        let mut keys = KeyStream::spawn_reader_with(events.clone());
        keys.resume();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !events.is_drained() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        events.type_char('y');
        let key = tokio::time::timeout(Duration::from_secs(5), keys.next()).await.unwrap();
        assert_eq!(key, Some(b'y'));
    }

    #[tokio::test]
    async fn test_paused_reader_leaves_input_alone() {
        let events = ScriptedEvents::default();
        let keys = KeyStream::spawn_reader_with(events.clone());

        events.type_char('y');
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!events.is_drained());
        drop(keys);
    }

    #[tokio::test]
    async fn test_closed_stream_reports_closed() {
        let mut keys = KeyStream::closed();
        assert!(keys.is_closed());
        assert_eq!(keys.next().await, None);
        assert!(keys.is_closed());
    }

    #[tokio::test]
    async fn test_resume_drops_buffered_keys() {
        let (mut keys, tx) = KeyStream::channel();
        tx.send(b'y').unwrap();
        tx.send(b'y').unwrap();

        keys.resume();
        tx.send(b'n').unwrap();

        assert_eq!(keys.next().await, Some(b'n'));
        assert!(!keys.is_closed());
    }
}
