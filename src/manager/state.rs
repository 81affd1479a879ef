//! Connection state machine.
//!
//! All lifecycle logic lives in one pure function, [`Machine::apply`]:
//! `(machine, event) -> (machine, effects)`. The manager runtime feeds it
//! events from the public API, the transport and its timers, and executes
//! the returned [`Effect`]s in order.
//!
//! # States
//!
//! ```text
//!            connect                 opened
//!   Idle ─────────────► Connecting ─────────► Open
//!    ▲                   ▲    │                 │
//!    │ reconnect /       │    │ closed          │ closed
//!    │ disconnect  retry │    ▼                 │
//!    │             timer └─ Closed ◄────────────┘
//!    │                        │
//!    │                        │ budget exhausted
//!    └──── reconnect ──── Abandoned
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::ChannelMessage;

use super::retry::RetryBudget;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No link, nothing scheduled by the retry policy.
    #[default]
    Idle,
    /// A link exists and is connecting.
    Connecting,
    /// A link exists and carries frames.
    Open,
    /// The link was lost; a retry may be pending.
    Closed,
    /// Retry budget exhausted. Only an explicit reconnect leaves this state.
    Abandoned,
}

impl ConnectionState {
    /// Returns `true` while a link exists (Connecting or Open).
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Returns `true` when messages can be sent.
    #[inline]
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TimerKind
// ============================================================================

/// The two delays the manager can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Automatic reconnection after a close.
    Retry,
    /// Delay before connecting after an explicit reconnect.
    Reconnect,
}

// ============================================================================
// Event
// ============================================================================

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `connect()` was called.
    Connect,
    /// The transport refused to create a link.
    ///
    /// The machine returns to the state it connected from.
    OpenFailed,
    /// The link is established.
    Opened,
    /// A well-formed inbound message arrived.
    MessageReceived(ChannelMessage),
    /// A local message was handed to the link.
    RequestSent(ChannelMessage),
    /// The link reported an error.
    ErrorObserved(String),
    /// The link is gone.
    Closed,
    /// A scheduled timer elapsed.
    TimerFired(TimerKind),
    /// `disconnect()` was called.
    Disconnect,
    /// `reconnect()` was called.
    Reconnect,
}

impl Event {
    /// Short name used in logs and rejections.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::OpenFailed => "open_failed",
            Self::Opened => "opened",
            Self::MessageReceived(_) => "message_received",
            Self::RequestSent(_) => "request_sent",
            Self::ErrorObserved(_) => "error_observed",
            Self::Closed => "closed",
            Self::TimerFired(TimerKind::Retry) => "retry_timer_fired",
            Self::TimerFired(TimerKind::Reconnect) => "reconnect_timer_fired",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
        }
    }
}

// ============================================================================
// Effect
// ============================================================================

/// Side effect requested by a transition, executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new link to the configured address.
    OpenTransport,
    /// Close the current link, then release it.
    CloseTransport,
    /// Release the current link (it is already closed).
    ReleaseTransport,
    /// Replace any pending timer with a new one.
    Schedule {
        /// Which timer.
        kind: TimerKind,
        /// Delay before it fires.
        delay: Duration,
    },
    /// Cancel the pending timer, if any.
    CancelTimer,
    /// Append to the message sequence.
    AppendMessage(ChannelMessage),
    /// Call the `on_open` hook.
    NotifyOpen,
    /// Call the `on_close` hook.
    NotifyClose,
    /// Call the `on_error` hook.
    NotifyError(String),
    /// The retry budget ran out.
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

// ============================================================================
// Transition
// ============================================================================

/// Result of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Machine after the event.
    pub next: Machine,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
}

/// An event that is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event '{event}' is not valid in state '{state}'")]
pub struct IllegalTransition {
    /// State the machine was in.
    pub state: ConnectionState,
    /// Name of the rejected event.
    pub event: &'static str,
}

// ============================================================================
// Machine
// ============================================================================

/// Connection state, retry budget and pending-request gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Machine {
    state: ConnectionState,
    connected_from: ConnectionState,
    retry: RetryBudget,
    awaiting_response: bool,
    reconnect_delay: Duration,
}

impl Machine {
    /// Creates an idle machine.
    #[must_use]
    pub const fn new(retry: RetryBudget, reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Idle,
            connected_from: ConnectionState::Idle,
            retry,
            awaiting_response: false,
            reconnect_delay,
        }
    }

    /// Current connection state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current retry budget.
    #[inline]
    #[must_use]
    pub const fn retry(&self) -> RetryBudget {
        self.retry
    }

    /// Whether a sent message still awaits its response.
    #[inline]
    #[must_use]
    pub const fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Applies `event`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the event is not valid in the current
    /// state. The machine is unchanged in that case.
    pub fn apply(&self, event: Event) -> Result<Transition, IllegalTransition> {
        use ConnectionState::{Abandoned, Closed, Connecting, Idle, Open};

        let mut next = *self;
        let mut effects = Vec::new();

        match (self.state, event) {
            // The firing timer is already consumed
            (Idle, Event::TimerFired(TimerKind::Reconnect)) => {
                next.state = Connecting;
                next.connected_from = Idle;
                effects.push(Effect::OpenTransport);
            }

            (Idle | Closed, Event::Connect) | (Closed, Event::TimerFired(TimerKind::Retry)) => {
                next.state = Connecting;
                next.connected_from = self.state;
                effects.push(Effect::CancelTimer);
                effects.push(Effect::OpenTransport);
            }

            (Connecting, Event::OpenFailed) => {
                next.state = self.connected_from;
                effects.push(Effect::ReleaseTransport);
            }

            (Connecting, Event::Opened) => {
                next.state = Open;
                next.retry.reset();
                effects.push(Effect::NotifyOpen);
            }

            (Open, Event::MessageReceived(message)) => {
                next.awaiting_response = false;
                effects.push(Effect::AppendMessage(message));
            }

            (Open, Event::RequestSent(message)) => {
                next.awaiting_response = true;
                effects.push(Effect::AppendMessage(message));
            }

            (_, Event::ErrorObserved(info)) => {
                next.awaiting_response = false;
                effects.push(Effect::NotifyError(info));
            }

            (Connecting | Open, Event::Closed) => {
                next.state = Closed;
                next.awaiting_response = false;
                effects.push(Effect::ReleaseTransport);
                effects.push(Effect::NotifyClose);

                if next.retry.try_consume() {
                    effects.push(Effect::Schedule {
                        kind: TimerKind::Retry,
                        delay: next.retry.interval(),
                    });
                } else {
                    next.state = Abandoned;
                    effects.push(Effect::RetriesExhausted {
                        attempts: next.retry.attempts(),
                    });
                }
            }

            (Abandoned, Event::Disconnect) => {
                effects.push(Effect::CancelTimer);
            }

            (_, Event::Disconnect) => {
                next.state = Idle;
                next.awaiting_response = false;
                effects.push(Effect::CancelTimer);
                effects.push(Effect::CloseTransport);
                if self.state.is_active() {
                    effects.push(Effect::NotifyClose);
                }
            }

            (_, Event::Reconnect) => {
                next.state = Idle;
                next.awaiting_response = false;
                next.retry.reset();
                effects.push(Effect::CancelTimer);
                effects.push(Effect::CloseTransport);
                if self.state.is_active() {
                    effects.push(Effect::NotifyClose);
                }
                effects.push(Effect::Schedule {
                    kind: TimerKind::Reconnect,
                    delay: self.reconnect_delay,
                });
            }

            (state, event) => {
                return Err(IllegalTransition {
                    state,
                    event: event.name(),
                });
            }
        }

        Ok(Transition { next, effects })
    }
}

// ============================================================================
// Tests
// ============================================================================
