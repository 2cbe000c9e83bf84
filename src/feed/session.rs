use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use url::Url;

use super::address::redacted;
use super::buffer::BarBuffer;
use super::decoder::{decode, StreamEvent};
use super::transport::Connector;
use crate::error::FeedError;
use crate::event::{ConnectionState, SessionEvent, SessionSnapshot};
use crate::model::bar::Bar;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub market_id: String,
    pub url: Url,
    /// Only bar ticks for this interval label are integrated when set.
    pub interval: Option<String>,
    pub reconnect_delay: Duration,
    pub buffer_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Drop the current transport and connect again right away.
    Reconnect,
}

/// State shared between a [`Subscription`] and its session task.
struct SessionControl {
    closed: AtomicBool,
    handler: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    shutdown_tx: watch::Sender<bool>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Flips to `true` once the session task has dropped its transport and exited.
    released: watch::Receiver<bool>,
}

impl SessionControl {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn deliver(&self, event: SessionEvent) {
        let slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return;
        }
        if let Some(tx) = slot.as_ref() {
            // A dropped receiver just means nobody is listening right now.
            let _ = tx.send(event);
        }
    }

    fn rewire(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_closed() {
            *slot = Some(tx);
        }
        rx
    }

    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        self.snapshot_tx.send_if_modified(|snapshot| {
            if self.is_closed() {
                return false;
            }
            update(snapshot);
            true
        });
    }

    fn close(&self) -> bool {
        {
            let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::AcqRel) {
                return false;
            }
            *slot = None;
        }
        self.shutdown_tx.send_replace(true);
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.state = ConnectionState::Disconnected);
        true
    }
}

/// Cloneable closer for a session, usable from teardown paths that do not
/// own the [`Subscription`].
#[derive(Clone)]
pub struct CloseHandle(Arc<SessionControl>);

impl CloseHandle {
    pub fn close(&self) -> bool {
        self.0.close()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    pub fn same_session(&self, other: &CloseHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Resolves once the session task has exited and its transport is gone.
    pub async fn released(&self) {
        let mut released = self.0.released.clone();
        // An error means the task and its guard are already gone.
        let _ = released.wait_for(|done| *done).await;
    }
}

/// Sets the release flag when the session task ends, however it ends.
struct ReleaseGuard(watch::Sender<bool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Receiving end of a session's event channel.
///
/// Once the session is closed nothing more is yielded, including events that
/// were already queued.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    control: Arc<SessionControl>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        if self.control.is_closed() {
            return None;
        }
        let event = self.rx.recv().await?;
        if self.control.is_closed() {
            return None;
        }
        Some(event)
    }

    pub fn try_recv(&mut self) -> Result<SessionEvent, TryRecvError> {
        if self.control.is_closed() {
            return Err(TryRecvError::Disconnected);
        }
        self.rx.try_recv()
    }
}

/// A live, self-reconnecting kline stream for one market.
///
/// The session task owns the bar buffer and connection state; callers only
/// see [`SessionSnapshot`] values and pushed [`SessionEvent`]s. Closing (or
/// dropping) the subscription stops delivery immediately, cancels any pending
/// reconnect and releases the transport.
pub struct Subscription {
    market_id: String,
    control: Arc<SessionControl>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl Subscription {
    /// Spawn the session task. Must be called within a tokio runtime.
    pub fn open(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::open_replacing(config, connector, None)
    }

    /// Like [`Subscription::open`], but closes `predecessor` and holds the
    /// first connect until it has released its transport.
    pub fn open_replacing(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        predecessor: Option<CloseHandle>,
    ) -> Self {
        if let Some(previous) = &predecessor {
            previous.close();
        }
        let market_id = config.market_id.clone();
        let (snapshot_tx, snapshots) = watch::channel(SessionSnapshot::idle(&market_id));
        let (shutdown_tx, shutdown) = watch::channel(false);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (released_tx, released) = watch::channel(false);
        let control = Arc::new(SessionControl {
            closed: AtomicBool::new(false),
            handler: Mutex::new(None),
            snapshot_tx,
            shutdown_tx,
            command_tx,
            released,
        });

        let capacity = config.buffer_capacity.max(1);
        let task = SessionTask {
            control: control.clone(),
            connector,
            config,
            shutdown,
            commands,
            buffer: BarBuffer::new(capacity),
            capacity,
            failures: 0,
            predecessor,
            _released: ReleaseGuard(released_tx),
        };
        tokio::spawn(task.run());

        Self {
            market_id,
            control,
            snapshots,
        }
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    /// Wire a fresh event channel into the session. Events stop flowing to any
    /// previously returned receiver; the transport is untouched.
    pub fn subscribe_events(&self) -> EventReceiver {
        EventReceiver {
            rx: self.control.rewire(),
            control: self.control.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn reconnect(&self) -> bool {
        !self.control.is_closed() && self.control.command_tx.send(SessionCommand::Reconnect).is_ok()
    }

    /// Returns `false` if the subscription was already closed.
    pub fn close(&self) -> bool {
        let closed = self.control.close();
        if closed {
            tracing::info!(market = %self.market_id, "Market stream subscription closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(self.control.clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

enum Exit {
    Shutdown,
    Restart,
    Failed(FeedError),
}

struct SessionTask {
    control: Arc<SessionControl>,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    shutdown: watch::Receiver<bool>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    buffer: BarBuffer,
    capacity: usize,
    failures: u32,
    predecessor: Option<CloseHandle>,
    _released: ReleaseGuard,
}

impl SessionTask {
    async fn run(mut self) {
        let market = self.config.market_id.clone();
        tracing::info!(
            market = %market,
            url = %redacted(&self.config.url),
            "Opening market stream"
        );

        // Never overlap transports with the session this one replaces.
        if let Some(previous) = self.predecessor.take() {
            previous.released().await;
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.set_state(ConnectionState::Connecting);

            match self.connect_once().await {
                Exit::Shutdown => break,
                Exit::Restart => {
                    tracing::info!(market = %market, "Reconnect requested");
                    continue;
                }
                Exit::Failed(err) if !err.is_transport() => {
                    tracing::error!(
                        market = %market,
                        error = %err,
                        "Market stream cannot be opened, waiting for a manual reconnect"
                    );
                    let message = err.to_string();
                    self.control.publish(|s| {
                        s.state = ConnectionState::Disconnected;
                        s.last_error = Some(message.clone());
                    });
                    self.control
                        .deliver(SessionEvent::State(ConnectionState::Disconnected));
                    self.control.deliver(SessionEvent::Error(message));

                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => break,
                        cmd = self.commands.recv() => match cmd {
                            Some(SessionCommand::Reconnect) => continue,
                            None => break,
                        },
                    }
                }
                Exit::Failed(err) => {
                    self.failures = self.failures.saturating_add(1);
                    let delay = self.config.reconnect_delay;
                    tracing::warn!(
                        market = %market,
                        attempt = self.failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Market stream failed, scheduling reconnect"
                    );
                    let message = err.to_string();
                    let failures = self.failures;
                    self.control.publish(|s| {
                        s.state = ConnectionState::ErroredPendingRetry;
                        s.last_error = Some(message.clone());
                        s.reconnect_attempts = failures;
                    });
                    self.control
                        .deliver(SessionEvent::State(ConnectionState::ErroredPendingRetry));
                    self.control.deliver(SessionEvent::Error(message));

                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => break,
                        cmd = self.commands.recv() => match cmd {
                            Some(SessionCommand::Reconnect) => continue,
                            None => break,
                        },
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!(market = %market, "Market stream task finished");
    }

    async fn connect_once(&mut self) -> Exit {
        let connect = self.connector.connect(self.config.url.clone());
        let mut frames = tokio::select! {
            biased;
            _ = self.shutdown.changed() => return Exit::Shutdown,
            cmd = self.commands.recv() => return command_exit(cmd),
            result = connect => match result {
                Ok(frames) => frames,
                Err(err) => return Exit::Failed(err),
            },
        };

        self.failures = 0;
        self.control.publish(|s| {
            s.state = ConnectionState::Connected;
            s.last_error = None;
            s.reconnect_attempts = 0;
        });
        self.control
            .deliver(SessionEvent::State(ConnectionState::Connected));
        tracing::info!(market = %self.config.market_id, "Market stream connected");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Exit::Shutdown,
                cmd = self.commands.recv() => return command_exit(cmd),
                frame = frames.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(err)) => return Exit::Failed(err),
                    None => {
                        return Exit::Failed(FeedError::Transport("stream ended".to_string()));
                    }
                },
            }
        }
    }

    fn handle_frame(&mut self, raw: &str) {
        if self.control.is_closed() {
            return;
        }
        match decode(raw) {
            Ok(StreamEvent::BarTick { interval, bar }) => {
                if let Some(expected) = self.config.interval.as_deref() {
                    if expected != interval {
                        tracing::trace!(
                            market = %self.config.market_id,
                            interval = %interval,
                            "Ignoring bar for another interval"
                        );
                        return;
                    }
                }
                self.integrate(bar);
            }
            Ok(StreamEvent::Ignored { kind }) => {
                tracing::trace!(market = %self.config.market_id, kind = %kind, "Ignoring frame");
            }
            Err(err) => {
                tracing::warn!(
                    market = %self.config.market_id,
                    error = %err,
                    "Dropping undecodable frame"
                );
                let message = FeedError::from(err).to_string();
                self.control
                    .publish(|s| s.last_error = Some(message.clone()));
                self.control.deliver(SessionEvent::Error(message));
            }
        }
    }

    fn integrate(&mut self, bar: Bar) {
        let buffer = std::mem::replace(&mut self.buffer, BarBuffer::new(self.capacity));
        self.buffer = buffer.integrate(bar.clone());

        let bars = self.buffer.to_vec();
        let latest = bar.clone();
        self.control.publish(move |s| {
            s.bars = bars;
            s.latest = Some(latest);
        });
        self.control.deliver(SessionEvent::Bar(bar));
    }

    fn set_state(&self, state: ConnectionState) {
        self.control.publish(|s| s.state = state);
        self.control.deliver(SessionEvent::State(state));
    }
}

fn command_exit(cmd: Option<SessionCommand>) -> Exit {
    match cmd {
        Some(SessionCommand::Reconnect) => Exit::Restart,
        None => Exit::Shutdown,
    }
}
