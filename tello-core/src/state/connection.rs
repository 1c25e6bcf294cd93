//! Connection lifecycle with the device.
//!
//! ```text
//!                 ConnectRequested            HandshakeAck
//!  Disconnected ──────────────────► Connecting ────────────► Connected
//!       │                            ▲   │  ▲                   │
//!       │                  Timeout   └───┘  └───────────────────┘
//!       │                  (resend)  │          Timeout
//!       │ QuitRequested              │ QuitRequested            │ QuitRequested
//!       ▼                            ▼                          ▼
//!      Quit ◄──────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are pure ([`ConnectionState::on`]) and return the side
//! effects to perform. [`ConnectionStateMachine`] applies them under its
//! lock and hands the effects back, so notifications are published only
//! after the lock is gone.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::event::Event;

// ── ConnectionState ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Terminal.
    Quit,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Work a transition asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SendHandshake,
    SendTimeSync,
    Notify(Event),
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Next state and effects for `event`. Pairs outside the table
    /// leave the state alone and do nothing.
    pub fn on(self, event: Event) -> (Self, Vec<Effect>) {
        use ConnectionState::*;
        use Effect::*;
        match (self, event) {
            (Quit, _) => (Quit, vec![]),
            (Disconnected, Event::ConnectRequested) => (Connecting, vec![SendHandshake]),
            (Disconnected, Event::QuitRequested) => (Quit, vec![Notify(Event::Disconnected)]),
            (Connecting, Event::HandshakeAck) => {
                (Connected, vec![Notify(Event::Connected), SendTimeSync])
            }
            (Connecting, Event::Timeout) => (Connecting, vec![SendHandshake]),
            (Connecting, Event::QuitRequested) => (Quit, vec![]),
            (Connected, Event::Timeout) => {
                (Connecting, vec![SendHandshake, Notify(Event::Disconnected)])
            }
            (Connected, Event::QuitRequested) => (Quit, vec![Notify(Event::Disconnected)]),
            (state, _) => (state, vec![]),
        }
    }
}

// ── ConnectionStateMachine ───────────────────────────────────────

/// Shared, lock-guarded [`ConnectionState`] with a watch channel for
/// loops that need to notice changes.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
    changes: watch::Sender<ConnectionState>,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(ConnectionState::default());
        Self {
            state: Mutex::new(ConnectionState::default()),
            changes,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `event`; the caller performs the returned effects.
    pub fn handle(&self, event: Event) -> Vec<Effect> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, effects) = state.on(event);
        let prev = *state;
        if next != prev {
            debug!(from = %prev, to = %next, %event, "connection state change");
            *state = next;
            self.changes.send_replace(next);
        }
        effects
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.changes.subscribe()
    }
}

// ── Tests ────────────────────────────────────────────────────────
