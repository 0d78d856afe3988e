// src/system/interrupt.rs

use std::io;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A termination request from outside the keystroke loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupt;

/// Starts listening for SIGINT (and SIGTERM on unix).
///
/// The listener never touches the session: it only sends an [`Interrupt`]
/// per signal and lets the session owner do the cleanup. It stops when the
/// receiver is dropped or the signal handlers cannot be installed.
pub fn spawn_listener(tx: mpsc::Sender<Interrupt>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = wait_for_termination().await {
                log::warn!("Could not listen for interrupt signals: {}", e);
                return;
            }
            log::debug!("Termination signal received.");
            if tx.send(Interrupt).await.is_err() {
                return;
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
