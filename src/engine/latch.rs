// src/engine/latch.rs

//! Pause/resume gate for the dispatcher.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// Dispatching allowed.
    Open,
    /// Paused: the dispatcher waits before taking a batch.
    Closed,
}

/// Two-state latch shared by the coordinator and the dispatcher.
///
/// The dispatcher only ever waits for the latch to be open; it never holds
/// it, so pausing cannot deadlock against a blocked queue wait.
#[derive(Debug, Clone)]
pub struct PauseLatch {
    tx: Arc<watch::Sender<LatchState>>,
}

impl Default for PauseLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LatchState::Open);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LatchState {
        *self.tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == LatchState::Closed
    }

    pub fn pause(&self) {
        if self.tx.send_replace(LatchState::Closed) == LatchState::Open {
            info!("paused; changes will be held until resumed");
        }
    }

    pub fn resume(&self) {
        if self.tx.send_replace(LatchState::Open) == LatchState::Closed {
            info!("resumed");
        }
    }

    /// Flip the state; returns `true` if now paused.
    pub fn toggle(&self) -> bool {
        let mut paused = false;
        self.tx.send_modify(|state| {
            *state = match *state {
                LatchState::Open => LatchState::Closed,
                LatchState::Closed => LatchState::Open,
            };
            paused = *state == LatchState::Closed;
        });
        if paused {
            info!("paused; changes will be held until resumed");
        } else {
            info!("resumed");
        }
        paused
    }

    /// Wait until the latch is open. Returns immediately if it already is.
    pub async fn wait_open(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives inside `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == LatchState::Open).await;
    }
}
