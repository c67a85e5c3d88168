use std::io;
use std::sync::Mutex;

use anyhow::{Context, Result};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

// Attributes captured on first raw-mode entry, reachable from the SIGINT
// handler so the terminal is restored on every exit path.
static ORIGINAL: Mutex<Option<Termios>> = Mutex::new(None);

/// Scoped raw-mode acquisition: canonical input and echo are disabled for
/// the guard's lifetime; the saved attributes are restored on drop.
pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        let saved = termios::tcgetattr(io::stdin()).context("stdin is not a terminal")?;
        remember(&saved);

        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw)
            .context("failed to enter raw mode")?;
        Ok(Self { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.saved);
    }
}

fn remember(saved: &Termios) {
    let mut slot = ORIGINAL.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
        *slot = Some(saved.clone());
    }
}

/// Restore the attributes captured on first raw-mode entry. A no-op if raw
/// mode was never entered.
pub fn restore_original() {
    let slot = ORIGINAL.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(saved) = slot.as_ref() {
        let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, saved);
    }
}

/// Terminate on SIGINT with the terminal put back in its original state.
/// Running pipelines are not cancelled; this shell exposes no job control.
pub fn install_signal_restore() -> Result<()> {
    ctrlc::set_handler(|| {
        restore_original();
        std::process::exit(130);
    })
    .context("failed to install signal handler")
}
