//! Transport ready state and its transition graph.

use std::fmt;
use thiserror::Error;

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Constructed, never opened.
    #[default]
    Unopened,
    /// Connect in progress.
    Opening,
    /// Connected; packets may be sent.
    Open,
    /// Disconnect in progress.
    Closing,
    /// Disconnected.
    Closed,
}

impl ReadyState {
    /// Get the state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Unopened => "unopened",
            ReadyState::Opening => "opening",
            ReadyState::Open => "open",
            ReadyState::Closing => "closing",
            ReadyState::Closed => "closed",
        }
    }

    /// Apply a trigger, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the graph has no edge for this
    /// state and trigger.
    pub fn transition(self, trigger: Trigger) -> Result<ReadyState, InvalidTransition> {
        use ReadyState::*;

        match (self, trigger) {
            (Unopened | Closed, Trigger::Open) => Ok(Opening),
            (Opening, Trigger::Opened) => Ok(Open),
            (Opening | Open, Trigger::Close) => Ok(Closing),
            (Opening | Open | Closing, Trigger::Closed) => Ok(Closed),
            (from, trigger) => Err(InvalidTransition { from, trigger }),
        }
    }

    /// Check whether decoded packets are forwarded in this state.
    ///
    /// Only an open transport forwards packets, so `Open` always precedes
    /// the first `Packet` event.
    #[must_use]
    pub fn accepts_data(self) -> bool {
        self == ReadyState::Open
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive the ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The owner called `open`.
    Open,
    /// The driver finished connecting.
    Opened,
    /// The owner called `close`.
    Close,
    /// The connection is gone.
    Closed,
}

/// A trigger that has no edge from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No transition from {from} on {trigger:?}")]
pub struct InvalidTransition {
    /// State the trigger was applied to.
    pub from: ReadyState,
    /// The rejected trigger.
    pub trigger: Trigger,
}
