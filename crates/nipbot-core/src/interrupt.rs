//! Ctrl+C handling.
//!
//! While a turn is running, Ctrl+C cancels that turn's token and nothing
//! else. With no turn running it sets the process-wide interrupt flag; a
//! second Ctrl+C before the flag is reset exits with code 130.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Exit code used when the user interrupts the program.
pub const EXIT_CODE: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();
static NEXT_TURN_ID: AtomicU64 = AtomicU64::new(1);
static ACTIVE_TURN: Mutex<Option<(u64, CancellationToken)>> = Mutex::new(None);

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler.
///
/// # Errors
/// Returns an error if a handler is already installed.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger_ctrl_c).context("Error setting Ctrl+C handler")
}

fn notify_waiters() {
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

fn active_turn() -> std::sync::MutexGuard<'static, Option<(u64, CancellationToken)>> {
    ACTIVE_TURN.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handles one Ctrl+C press.
pub fn trigger_ctrl_c() {
    if let Some((_, turn)) = active_turn().take() {
        tracing::info!("turn cancelled by Ctrl+C");
        turn.cancel();
        return;
    }
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        std::process::exit(EXIT_CODE);
    }
    notify_waiters();
}

/// Checks if an interrupt has been requested while idle.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an idle interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        if is_interrupted() {
            return;
        }
        INTERRUPT_NOTIFY.get_or_init(Notify::new).notified().await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Registers a new turn; Ctrl+C cancels it until the guard drops.
pub fn begin_turn() -> TurnGuard {
    let id = NEXT_TURN_ID.fetch_add(1, Ordering::SeqCst);
    let token = CancellationToken::new();
    *active_turn() = Some((id, token.clone()));
    TurnGuard { id, token }
}

/// Keeps a turn's token registered with the Ctrl+C handler.
pub struct TurnGuard {
    id: u64,
    token: CancellationToken,
}

impl TurnGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let mut active = active_turn();
        if active.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Process-wide state: exercised in a single test.
    #[tokio::test]
    async fn test_ctrl_c_cancels_turn_then_flags_idle() {
        reset();

        let guard = begin_turn();
        trigger_ctrl_c();
        assert!(guard.token().is_cancelled());
        assert!(!is_interrupted());
        drop(guard);

        trigger_ctrl_c();
        assert!(is_interrupted());
        wait_for_interrupt().await;

        reset();
        assert!(!is_interrupted());

        let guard = begin_turn();
        drop(guard);
        assert!(active_turn().is_none());
    }
}
