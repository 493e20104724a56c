// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager for the persistent channel.
//!
//! A single driver task owns the channel, the pending-request registry, and
//! the outbound queue. Handles talk to it over an mpsc command channel, so
//! every mutation happens inside one task and no state is shared across
//! suspension points.
//!
//! The driver feeds lifecycle inputs to the [`Machine`] and performs the
//! returned effects: dialing, flushing queued requests in FIFO order,
//! failing requests tied to a lost channel, and arming the reconnect timer.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use kl_core::{BatchItem, ClientMessage, Request, ServerMessage};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

use crate::batch::BatchPlan;
use crate::connection::backoff::Backoff;
use crate::connection::channel::{Channel, Dialer, Inbound};
use crate::connection::state::{
    ConnectionEvent, ConnectionState, Effect, Input, Machine, SharedConnectionState,
    NORMAL_CLOSE,
};
use crate::error::{ClientError, ClientResult, TransportError, TransportResult};
use crate::id::correlation_id;
use crate::registry::PendingRegistry;

const EVENT_CAPACITY: usize = 64;

/// Settings for the persistent channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Channel endpoint.
    pub url: String,
    /// Reconnect attempts before giving up. 0 = unlimited.
    pub max_attempts: u32,
    /// Backoff base delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Watchdog period.
    pub heartbeat_check_interval: Duration,
    /// Max silence before the channel is declared dead. Zero disables the watchdog.
    pub heartbeat_timeout: Duration,
    /// Fail requests instead of holding them while a reconnect is pending.
    /// Set when another transport can take the request.
    pub fail_fast: bool,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ConnectionConfig {
            url: url.into(),
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            heartbeat_check_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            fail_fast: false,
        }
    }
}

/// What the channel answered for a request id.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    Batch(Vec<BatchItem>),
}

enum Command {
    Submit {
        id: String,
        message: ClientMessage,
        timeout: Duration,
        reply: oneshot::Sender<ClientResult<Reply>>,
    },
    Connect {
        done: oneshot::Sender<TransportResult<()>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the connection driver.
///
/// Cheap to clone. The driver stops on [`close`](Self::close) or when the
/// last handle is dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ConnectionEvent>,
    state: SharedConnectionState,
}

impl ConnectionManager {
    /// Spawns the driver task. Must be called within a tokio runtime.
    ///
    /// Nothing is dialed until the first request or [`connect`](Self::connect).
    pub fn spawn(config: ConnectionConfig, dialer: Arc<dyn Dialer>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SharedConnectionState::new();

        let driver_events = events.clone();
        let driver_state = state.clone();
        tokio::spawn(async move {
            Driver::new(config, dialer, rx, driver_events, driver_state)
                .run()
                .await;
        });

        ConnectionManager {
            commands,
            events,
            state,
        }
    }

    /// Opens the channel if it is not open or opening.
    ///
    /// Concurrent callers share one attempt. Clears an exhausted retry
    /// budget, so this is also how a caller revives a manager that gave up.
    pub async fn connect(&self) -> TransportResult<()> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { done })
            .map_err(|_| TransportError::ConnectionClosed)?;
        rx.await.unwrap_or(Err(TransportError::ConnectionClosed))
    }

    /// Sends one request and waits for its response.
    ///
    /// Queued if the channel is not open; fails with a timeout if no
    /// response arrives within `timeout`.
    pub async fn request(&self, request: &Request, timeout: Duration) -> ClientResult<Value> {
        let id = correlation_id();
        let message = ClientMessage::request(id.clone(), request.command.clone(), request.body.clone());
        match self.submit(id, message, timeout).await? {
            Reply::Value(value) => Ok(value),
            Reply::Batch(_) => Err(ClientError::Protocol(
                "batch_response for a single request".to_string(),
            )),
        }
    }

    /// Sends a whole batch as one message and waits for its batch response.
    pub async fn batch(&self, plan: &BatchPlan, timeout: Duration) -> ClientResult<Vec<BatchItem>> {
        let id = plan.outer_id().to_string();
        match self.submit(id, plan.to_message(), timeout).await? {
            Reply::Batch(items) => Ok(items),
            Reply::Value(_) => Err(ClientError::Protocol(
                "single response for a batch".to_string(),
            )),
        }
    }

    async fn submit(
        &self,
        id: String,
        message: ClientMessage,
        timeout: Duration,
    ) -> ClientResult<Reply> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                id,
                message,
                timeout,
                reply,
            })
            .map_err(|_| ClientError::Transport(TransportError::ConnectionClosed))?;
        rx.await
            .unwrap_or(Err(ClientError::Transport(TransportError::ConnectionClosed)))
    }

    /// Closes the channel on purpose and stops the driver.
    ///
    /// Suppresses reconnection and fails everything still pending.
    pub async fn close(&self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(Command::Close { done }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn shared_state(&self) -> SharedConnectionState {
        self.state.clone()
    }

    /// Subscribes to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

struct Outbound {
    id: String,
    message: ClientMessage,
}

type Dialing = BoxFuture<'static, TransportResult<Box<dyn Channel>>>;

struct Driver {
    config: ConnectionConfig,
    dialer: Arc<dyn Dialer>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<ConnectionEvent>,
    shared: SharedConnectionState,
    machine: Machine,
    registry: PendingRegistry<Reply>,
    queue: VecDeque<Outbound>,
    channel: Option<Box<dyn Channel>>,
    dialing: Option<Dialing>,
    retry_at: Option<Instant>,
    watchdog: Option<Interval>,
    last_heartbeat: Instant,
    connect_waiters: Vec<oneshot::Sender<TransportResult<()>>>,
}

impl Driver {
    fn new(
        config: ConnectionConfig,
        dialer: Arc<dyn Dialer>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<ConnectionEvent>,
        shared: SharedConnectionState,
    ) -> Self {
        let machine = Machine::new(
            Backoff::new(config.base_delay, config.max_delay),
            config.max_attempts,
        );
        let period = config.heartbeat_check_interval;
        let watchdog = (!period.is_zero() && !config.heartbeat_timeout.is_zero())
            .then(|| interval_at(Instant::now() + period, period));

        Driver {
            config,
            dialer,
            commands,
            events,
            shared,
            machine,
            registry: PendingRegistry::new(),
            queue: VecDeque::new(),
            channel: None,
            dialing: None,
            retry_at: None,
            watchdog,
            last_heartbeat: Instant::now(),
            connect_waiters: Vec::new(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Submit { id, message, timeout, reply }) => {
                        self.submit(id, message, timeout, reply).await;
                    }
                    Some(Command::Connect { done }) => self.connect(done).await,
                    Some(Command::Close { done }) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                result = dial_progress(self.dialing.as_mut()) => {
                    self.dialing = None;
                    self.on_dial(result).await;
                }
                inbound = recv_from(self.channel.as_mut()) => self.on_inbound(inbound).await,
                _ = sleep_until(self.retry_at) => {
                    self.retry_at = None;
                    self.dispatch(Input::RetryDue).await;
                }
                _ = tick(self.watchdog.as_mut()) => self.check_heartbeat().await,
                Some(id) = self.registry.next_expired() => {
                    // Timed out before the channel opened.
                    self.queue.retain(|outbound| outbound.id != id);
                }
            }
        }
        debug!("connection driver stopped");
    }

    async fn submit(
        &mut self,
        id: String,
        message: ClientMessage,
        timeout: Duration,
        reply: oneshot::Sender<ClientResult<Reply>>,
    ) {
        if self.config.fail_fast && self.reconnecting() {
            let error = TransportError::ConnectionFailed("channel is reconnecting".to_string());
            let _ = reply.send(Err(ClientError::Transport(error)));
            return;
        }
        if !self.registry.register(id.clone(), reply, timeout) {
            return;
        }
        if self.machine.state() == ConnectionState::Open {
            if let Err(e) = self.write(&id, message).await {
                self.on_write_error(&id, e).await;
            }
        } else {
            debug!(id = %id, state = %self.machine.state(), "queued request until channel opens");
            self.queue.push_back(Outbound { id, message });
            self.dispatch(Input::Connect).await;
        }
    }

    async fn connect(&mut self, done: oneshot::Sender<TransportResult<()>>) {
        self.dispatch(Input::Reset).await;
        if self.machine.state() == ConnectionState::Open {
            let _ = done.send(Ok(()));
            return;
        }
        self.connect_waiters.push(done);
        self.dispatch(Input::Connect).await;
    }

    fn reconnecting(&self) -> bool {
        self.machine.state() != ConnectionState::Open
            && (self.machine.attempt() > 0 || self.machine.is_exhausted())
    }

    async fn shutdown(&mut self) {
        self.dispatch(Input::Close).await;
        self.dispatch(Input::Closed).await;
    }

    /// Runs an input and every input its effects produce.
    async fn dispatch(&mut self, input: Input) {
        let mut inputs = VecDeque::from([input]);
        while let Some(input) = inputs.pop_front() {
            let from = self.machine.state();
            let effects = self.machine.handle(input.clone());
            if !effects.is_empty() {
                debug!(?input, %from, to = %self.machine.state(), "connection transition");
            }
            for effect in effects {
                if let Some(next) = self.apply(effect).await {
                    inputs.push_back(next);
                }
            }
        }
        self.shared.set(self.machine.state(), self.machine.attempt());
    }

    async fn apply(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::Dial => {
                info!(url = %self.config.url, attempt = self.machine.attempt(), "connecting");
                self.dialing = Some(self.dialer.dial(&self.config.url));
            }
            Effect::AbortDial => self.dialing = None,
            Effect::FlushQueue => return self.flush_queue().await,
            Effect::DropChannel => self.channel = None,
            Effect::SendClose => {
                if let Some(mut channel) = self.channel.take() {
                    if let Err(e) = channel.close(NORMAL_CLOSE).await {
                        debug!(error = %e, "close handshake failed");
                    }
                }
            }
            Effect::RejectInFlight(error) => {
                let rejected = self.registry.reject_in_flight(error);
                if rejected > 0 {
                    warn!(rejected, "failed requests written to lost channel");
                }
            }
            Effect::RejectAll(error) => {
                let rejected = self.registry.reject_all(error.clone());
                self.queue.clear();
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(error.clone()));
                }
                if rejected > 0 {
                    warn!(rejected, error = %error, "failed all pending requests");
                }
            }
            Effect::ScheduleReconnect { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.retry_at = Some(Instant::now() + delay);
            }
            Effect::CancelReconnect => self.retry_at = None,
            Effect::Notify(event) => {
                match &event {
                    ConnectionEvent::Connected => {
                        info!(url = %self.config.url, "channel open");
                        for waiter in self.connect_waiters.drain(..) {
                            let _ = waiter.send(Ok(()));
                        }
                    }
                    ConnectionEvent::ReconnectExhausted { attempts } => {
                        warn!(attempts, "giving up on reconnection");
                    }
                    ConnectionEvent::HeartbeatLost => warn!("heartbeat lost, dropped channel"),
                    other => debug!(event = ?other, "connection event"),
                }
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
        }
        None
    }

    async fn flush_queue(&mut self) -> Option<Input> {
        let mut flushed = 0usize;
        while let Some(Outbound { id, message }) = self.queue.pop_front() {
            if !self.registry.contains(&id) {
                continue;
            }
            match self.write(&id, message).await {
                Ok(()) => flushed += 1,
                Err(TransportError::Serialization(e)) => {
                    self.registry.reject(&id, ClientError::Serialization(e));
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "flush failed, channel lost");
                    self.channel = None;
                    return Some(Input::Lost { code: None });
                }
            }
        }
        if flushed > 0 {
            debug!(flushed, "flushed queued requests");
        }
        None
    }

    fn reject_queued(&mut self, error: TransportError) {
        let mut rejected = 0usize;
        for Outbound { id, .. } in self.queue.drain(..) {
            if self.registry.reject(&id, ClientError::Transport(error.clone())) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            debug!(rejected, "failed queued requests after dial failure");
        }
    }

    async fn write(&mut self, id: &str, message: ClientMessage) -> TransportResult<()> {
        let channel = self
            .channel
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;
        self.registry.mark_in_flight(id);
        channel.send(message).await
    }

    async fn on_write_error(&mut self, id: &str, error: TransportError) {
        if let TransportError::Serialization(e) = error {
            self.registry.reject(id, ClientError::Serialization(e));
            return;
        }
        warn!(id, error = %error, "send failed, channel lost");
        self.channel = None;
        self.dispatch(Input::Lost { code: None }).await;
    }

    async fn on_dial(&mut self, result: TransportResult<Box<dyn Channel>>) {
        match result {
            Ok(channel) => {
                self.channel = Some(channel);
                self.last_heartbeat = Instant::now();
                self.dispatch(Input::Opened).await;
            }
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "dial failed");
                self.dispatch(Input::DialFailed).await;
                // Waiters share one attempt, not the whole retry cycle.
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(e.clone()));
                }
                if self.config.fail_fast {
                    self.reject_queued(e);
                }
            }
        }
    }

    async fn on_inbound(&mut self, inbound: TransportResult<Inbound>) {
        match inbound {
            Ok(Inbound::Message(message)) => self.on_message(message).await,
            Ok(Inbound::Malformed { text, error }) => {
                warn!(error = %error, len = text.len(), "dropping malformed message");
            }
            Ok(Inbound::Closed { code }) => {
                info!(?code, "channel closed by peer");
                self.channel = None;
                self.dispatch(Input::Lost { code }).await;
            }
            Err(e) => {
                warn!(error = %e, "channel receive failed");
                self.channel = None;
                self.dispatch(Input::Lost { code: None }).await;
            }
        }
    }

    async fn on_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Response { id, data, .. } => {
                self.registry.resolve(&id, Reply::Value(data));
            }
            ServerMessage::BatchResponse { id, data, .. } => {
                self.registry.resolve(&id, Reply::Batch(data));
            }
            ServerMessage::Error {
                id: Some(id),
                error,
                status,
                ..
            } => {
                self.registry
                    .reject(&id, ClientError::application(status, error));
            }
            ServerMessage::Error { id: None, error, .. } => {
                warn!(error = %error, "server notice");
            }
            ServerMessage::Ping { .. } => {
                self.last_heartbeat = Instant::now();
                let pong = ClientMessage::pong(now_ms());
                if let Some(channel) = self.channel.as_mut() {
                    if let Err(e) = channel.send(pong).await {
                        warn!(error = %e, "pong failed, channel lost");
                        self.channel = None;
                        self.dispatch(Input::Lost { code: None }).await;
                    }
                }
            }
            ServerMessage::Connected { .. } => {
                self.last_heartbeat = Instant::now();
                debug!("server acknowledged connection");
            }
        }
    }

    async fn check_heartbeat(&mut self) {
        if self.machine.state() != ConnectionState::Open {
            return;
        }
        let silent = self.last_heartbeat.elapsed();
        if silent > self.config.heartbeat_timeout {
            warn!(silent_ms = silent.as_millis() as u64, "no heartbeat within window");
            self.dispatch(Input::HeartbeatLost).await;
        }
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

async fn dial_progress(dialing: Option<&mut Dialing>) -> TransportResult<Box<dyn Channel>> {
    match dialing {
        Some(dialing) => dialing.await,
        None => pending().await,
    }
}

async fn recv_from(channel: Option<&mut Box<dyn Channel>>) -> TransportResult<Inbound> {
    match channel {
        Some(channel) => channel.recv().await,
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick(watchdog: Option<&mut Interval>) {
    match watchdog {
        Some(watchdog) => {
            watchdog.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
