// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle state machine.
//!
//! [`Machine::handle`] is a pure transition table: it takes the current
//! state and an [`Input`] and returns the new state's side effects as a list
//! of [`Effect`]s. The driver in `manager` performs the effects; nothing here
//! touches I/O or timers.
//!
//! ```text
//!              Connect / RetryDue
//! Disconnected ──────────────────► Connecting ──Opened──► Open
//!      ▲  ▲                            │                   │
//!      │  └──────── DialFailed ────────┘                   │
//!      └──────────── Lost / HeartbeatLost ─────────────────┘
//!
//! any ──Close──► Closing ──Closed──► Disconnected (terminal)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::backoff::Backoff;
use crate::error::TransportError;

/// Close code of an intentional close. Suppresses auto-reconnect.
pub const NORMAL_CLOSE: u16 = 1000;

/// Lifecycle state of the persistent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Closing => f.write_str("closing"),
        }
    }
}

/// Observable connection events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The channel opened and the queue was flushed.
    Connected,
    /// The channel went away.
    Disconnected { code: Option<u16> },
    /// No heartbeat within the liveness window; the channel was dropped.
    HeartbeatLost,
    /// A reconnect attempt is scheduled after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Retries are exhausted; new requests fail until the next explicit connect.
    ReconnectExhausted { attempts: u32 },
    /// The manager was closed on purpose.
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A caller needs the channel.
    Connect,
    /// Explicit warm-up: clears an exhausted retry budget.
    Reset,
    /// The dial succeeded.
    Opened,
    /// The dial failed.
    DialFailed,
    /// The open channel closed or broke.
    Lost { code: Option<u16> },
    /// The watchdog saw no heartbeat within the window.
    HeartbeatLost,
    /// The backoff delay elapsed.
    RetryDue,
    /// Intentional close requested.
    Close,
    /// Intentional close finished.
    Closed,
}

/// Side effects of a transition, performed by the driver in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start opening a channel.
    Dial,
    /// Abandon an in-progress dial.
    AbortDial,
    /// Write queued messages in FIFO order.
    FlushQueue,
    /// Drop the current channel without a close handshake.
    DropChannel,
    /// Send an intentional close frame and drop the channel.
    SendClose,
    /// Fail requests written to the lost channel.
    RejectInFlight(TransportError),
    /// Fail every pending and queued request.
    RejectAll(TransportError),
    /// Arm the reconnect timer.
    ScheduleReconnect { attempt: u32, delay: Duration },
    /// Disarm the reconnect timer.
    CancelReconnect,
    /// Publish an event.
    Notify(ConnectionEvent),
}

/// Connection state plus the reconnect bookkeeping.
#[derive(Debug, Clone)]
pub struct Machine {
    state: ConnectionState,
    attempt: u32,
    delay: Duration,
    max_attempts: u32,
    backoff: Backoff,
    retry_pending: bool,
    exhausted: bool,
    closed: bool,
}

impl Machine {
    /// `max_attempts` of 0 retries forever.
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Machine {
            state: ConnectionState::Disconnected,
            attempt: 0,
            delay: backoff.base,
            max_attempts,
            backoff,
            retry_pending: false,
            exhausted: false,
            closed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the channel was last open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Current reconnect delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies one input and returns the effects of the transition.
    ///
    /// Inputs with no transition from the current state are ignored.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        use ConnectionState::*;

        if self.closed {
            return Vec::new();
        }

        match (self.state, input) {
            (_, Input::Reset) => {
                if self.exhausted {
                    self.exhausted = false;
                    self.attempt = 0;
                    self.delay = self.backoff.base;
                }
                Vec::new()
            }

            (Disconnected, Input::Connect) => {
                if self.exhausted {
                    return vec![Effect::RejectAll(self.exhausted_error())];
                }
                if self.retry_pending {
                    // Wait for the scheduled attempt.
                    return Vec::new();
                }
                self.state = Connecting;
                vec![Effect::Dial]
            }
            (Disconnected, Input::RetryDue) if self.retry_pending => {
                self.retry_pending = false;
                self.state = Connecting;
                vec![Effect::Dial]
            }

            (Connecting, Input::Opened) => {
                self.state = Open;
                self.attempt = 0;
                self.delay = self.backoff.base;
                vec![Effect::FlushQueue, Effect::Notify(ConnectionEvent::Connected)]
            }
            (Connecting, Input::DialFailed) => {
                self.state = Disconnected;
                self.retry_or_give_up(Vec::new())
            }

            (Open, Input::Lost { code }) => {
                self.state = Disconnected;
                let mut effects = vec![
                    Effect::RejectInFlight(TransportError::ConnectionClosed),
                    Effect::Notify(ConnectionEvent::Disconnected { code }),
                ];
                if code == Some(NORMAL_CLOSE) {
                    effects.push(Effect::RejectAll(TransportError::ConnectionClosed));
                    return effects;
                }
                self.retry_or_give_up(effects)
            }
            (Open, Input::HeartbeatLost) => {
                self.state = Disconnected;
                let effects = vec![
                    Effect::DropChannel,
                    Effect::RejectInFlight(TransportError::ConnectionClosed),
                    Effect::Notify(ConnectionEvent::HeartbeatLost),
                ];
                self.retry_or_give_up(effects)
            }

            (Open, Input::Close) => {
                self.state = Closing;
                vec![Effect::SendClose]
            }
            (Connecting, Input::Close) => {
                self.state = Closing;
                vec![Effect::AbortDial]
            }
            (Disconnected, Input::Close) => {
                self.state = Closing;
                self.retry_pending = false;
                vec![Effect::CancelReconnect]
            }
            (Closing, Input::Closed) => {
                self.state = Disconnected;
                self.closed = true;
                vec![
                    Effect::RejectAll(TransportError::ConnectionClosed),
                    Effect::Notify(ConnectionEvent::Closed),
                ]
            }

            _ => Vec::new(),
        }
    }

    fn retry_or_give_up(&mut self, mut effects: Vec<Effect>) -> Vec<Effect> {
        self.attempt += 1;
        if self.max_attempts > 0 && self.attempt > self.max_attempts {
            self.exhausted = true;
            self.retry_pending = false;
            effects.push(Effect::RejectAll(self.exhausted_error()));
            effects.push(Effect::Notify(ConnectionEvent::ReconnectExhausted {
                attempts: self.max_attempts,
            }));
            return effects;
        }
        self.delay = self.backoff.delay(self.attempt);
        self.retry_pending = true;
        effects.push(Effect::ScheduleReconnect {
            attempt: self.attempt,
            delay: self.delay,
        });
        effects.push(Effect::Notify(ConnectionEvent::ReconnectScheduled {
            attempt: self.attempt,
            delay: self.delay,
        }));
        effects
    }

    fn exhausted_error(&self) -> TransportError {
        TransportError::ReconnectExhausted {
            attempts: self.max_attempts,
        }
    }
}

/// Lock-free view of the connection state, readable from any handle.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState {
    inner: Arc<SharedInner>,
}

#[derive(Debug, Default)]
struct SharedInner {
    state: AtomicU8,
    attempt: AtomicU32,
}

impl SharedConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn attempt(&self) -> u32 {
        self.inner.attempt.load(Ordering::Acquire)
    }

    pub fn set(&self, state: ConnectionState, attempt: u32) {
        self.inner.attempt.store(attempt, Ordering::Release);
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }

    /// Human-readable status, e.g. `connecting (attempt 2)`.
    pub fn status_string(&self) -> String {
        match (self.get(), self.attempt()) {
            (state, 0) => state.to_string(),
            (state, attempt) => format!("{} (attempt {})", state, attempt),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
