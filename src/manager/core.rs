//! Connection manager runtime.
//!
//! The manager owns the [`Machine`] and everything its effects touch: the
//! current link, the pending timer and the message sequence. Every mutation
//! goes through one short critical section, fed from three places:
//!
//! - Public operations (`connect`, `send`, `reconnect`, ...)
//! - The dispatcher task draining link events in emission order
//! - Timer tasks, each holding only a weak reference and a token
//!
//! Events from a released link and timers whose token no longer matches are
//! ignored, so nothing reaches a torn-down manager.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::ChannelMessage;
use crate::transport::{EventReceiver, EventSink, Link, LinkId, Transport, TransportEvent};

use super::options::ManagerOptions;
use super::retry::RetryBudget;
use super::snapshot::Snapshot;
use super::state::{ConnectionState, Effect, Event, Machine, TimerKind, Transition};

// ============================================================================
// Types
// ============================================================================

/// Where an event comes from, for staleness checks.
#[derive(Debug, Clone, Copy)]
enum Origin {
    /// A public operation.
    Api,
    /// The link with this id.
    Link(LinkId),
    /// The timer with this token.
    Timer(u64),
}

/// Hook invocation collected under the lock, delivered after it.
enum Notice {
    Opened,
    Closed,
    Error(String),
}

/// The link currently owned by the manager.
struct ActiveLink {
    id: LinkId,
    handle: Box<dyn Link>,
}

/// The single pending timer.
struct PendingTimer {
    token: u64,
    kind: TimerKind,
    task: JoinHandle<()>,
}

/// State guarded by the manager lock.
struct Inner {
    machine: Machine,
    messages: Vec<ChannelMessage>,
    link: Option<ActiveLink>,
    timer: Option<PendingTimer>,
    next_link_id: LinkId,
    next_timer_token: u64,
    torn_down: bool,
}

/// State shared with the dispatcher and timer tasks.
struct Shared<T> {
    transport: T,
    options: ManagerOptions,
    runtime: Handle,
    events_tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>,
    revision_tx: watch::Sender<u64>,
    inner: Mutex<Inner>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Client-side manager of one persistent message channel.
///
/// Establishes the channel through its [`Transport`], keeps the message
/// sequence and the pending-request gate, and reconnects after unexpected
/// loss within the configured retry budget.
///
/// None of the operations fail loudly: `send` reports success as a `bool`,
/// everything else is observable through [`snapshot`](Self::snapshot).
///
/// Dropping the manager closes the link and cancels any pending timer.
///
/// # Example
///
/// ```no_run
/// use chat_channel::{ConnectionManager, ManagerOptions, Result, WebSocketTransport};
///
/// # async fn example() -> Result<()> {
/// let options = ManagerOptions::new("ws://localhost:8080");
/// let manager = ConnectionManager::new(options, WebSocketTransport::new())?;
/// manager.connect();
///
/// let mut changes = manager.subscribe();
/// while !manager.is_connected() {
///     let _ = changes.changed().await;
/// }
///
/// assert!(manager.send("hello"));
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<T: Transport> {
    shared: Arc<Shared<T>>,
    dispatcher: JoinHandle<()>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates an idle manager. Call [`connect`](Self::connect) to start.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the options are invalid or no runtime is
    /// available.
    pub fn new(options: ManagerOptions, transport: T) -> Result<Self> {
        options.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            Error::config(format!(
                "ConnectionManager must be created inside a tokio runtime: {e}"
            ))
        })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (revision_tx, _) = watch::channel(0);

        let machine = Machine::new(
            RetryBudget::new(options.max_retries(), options.retry_interval()),
            options.reconnect_delay(),
        );

        debug!(
            address = options.address(),
            max_retries = options.max_retries(),
            retry_interval_ms = options.retry_interval().as_millis() as u64,
            "Connection manager created"
        );

        let shared = Arc::new(Shared {
            transport,
            options,
            runtime: runtime.clone(),
            events_tx,
            revision_tx,
            inner: Mutex::new(Inner {
                machine,
                messages: Vec::new(),
                link: None,
                timer: None,
                next_link_id: 0,
                next_timer_token: 0,
                torn_down: false,
            }),
        });

        let dispatcher = runtime.spawn(Shared::pump(Arc::downgrade(&shared), events_rx));

        Ok(Self { shared, dispatcher })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Opens the channel.
    ///
    /// No-op while already connecting or open, and while abandoned (use
    /// [`reconnect`](Self::reconnect) there). Cancels a pending reconnect
    /// delay. If the transport cannot create a link the state is left as it
    /// was and no retry is scheduled.
    pub fn connect(&self) {
        self.shared.dispatch(Origin::Api, Event::Connect);
    }

    /// Cancels any pending timer and closes the channel. Safe in any state.
    pub fn disconnect(&self) {
        self.shared.dispatch(Origin::Api, Event::Disconnect);
    }

    /// Sends `text` to the peer.
    ///
    /// Returns `false`, without side effects, if the trimmed text is empty or
    /// the channel is not open. On success the trimmed text is sent, a local
    /// message is appended and the loading gate is set.
    pub fn send(&self, text: &str) -> bool {
        self.shared.send(text)
    }

    /// Empties the message sequence. Connection state and gate are kept.
    pub fn clear_messages(&self) {
        let mut inner = self.shared.inner.lock();
        inner.messages.clear();
        drop(inner);

        self.shared.bump_revision();
    }

    /// Tears down the channel, resets the retry budget and connects again
    /// after the reconnect delay. The only way out of
    /// [`ConnectionState::Abandoned`].
    pub fn reconnect(&self) {
        info!(address = self.shared.options.address(), "Reconnect requested");
        self.shared.dispatch(Origin::Api, Event::Reconnect);
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Returns a consistent view of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.shared.inner.lock();
        let state = inner.machine.state();

        Snapshot {
            messages: inner.messages.clone(),
            state,
            is_connected: state.is_usable(),
            is_loading: inner.machine.awaiting_response(),
            retry_attempts: inner.machine.retry().attempts(),
        }
    }

    /// Returns the messages received and sent this session.
    #[must_use]
    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.shared.inner.lock().messages.clone()
    }

    /// Number of messages in the sequence.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.shared.inner.lock().messages.len()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().machine.state()
    }

    /// Returns `true` if messages can be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_usable()
    }

    /// Returns `true` while a sent message awaits its response.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.inner.lock().machine.awaiting_response()
    }

    /// Automatic reconnection attempts since the last successful open.
    #[must_use]
    pub fn retry_attempts(&self) -> u32 {
        self.shared.inner.lock().machine.retry().attempts()
    }

    /// The timer currently pending, if any.
    #[must_use]
    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.shared.inner.lock().timer.as_ref().map(|timer| timer.kind)
    }

    /// Subscribes to changes.
    ///
    /// The value is a revision counter bumped on every observable change;
    /// read the new state with [`snapshot`](Self::snapshot).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision_tx.subscribe()
    }

    /// Options the manager was created with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ManagerOptions {
        &self.shared.options
    }

    /// The transport links are opened with.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.shared.teardown();
        self.dispatcher.abort();
    }
}

// ============================================================================
// Shared - Event Handling
// ============================================================================

impl<T: Transport> Shared<T> {
    /// Drains link events until the manager is gone.
    async fn pump(shared: Weak<Self>, mut events: EventReceiver) {
        while let Some((link, event)) = events.recv().await {
            let Some(manager) = shared.upgrade() else {
                break;
            };
            manager.on_transport_event(link, event);
        }

        trace!("Event dispatcher terminated");
    }

    /// Translates a link event into a machine event.
    fn on_transport_event(self: &Arc<Self>, link: LinkId, event: TransportEvent) {
        let event = match event {
            TransportEvent::Opened => Event::Opened,

            TransportEvent::Message(raw) => match ChannelMessage::from_json(&raw) {
                Ok(message) => Event::MessageReceived(message),
                Err(e) => {
                    warn!(link, error = %e, payload = %raw, "Dropping malformed message");
                    return;
                }
            },

            TransportEvent::Error(info) => {
                warn!(link, error = %info, "Channel transport error");
                Event::ErrorObserved(info)
            }

            TransportEvent::Closed => Event::Closed,
        };

        self.dispatch(Origin::Link(link), event);
    }

    /// Called by a timer task once its delay elapsed.
    fn on_timer(self: &Arc<Self>, token: u64, kind: TimerKind) {
        trace!(token, ?kind, "Timer elapsed");
        self.dispatch(Origin::Timer(token), Event::TimerFired(kind));
    }

    /// Applies one event and delivers the resulting hooks.
    fn dispatch(self: &Arc<Self>, origin: Origin, event: Event) -> bool {
        let mut notices = Vec::new();
        let accepted = {
            let mut inner = self.inner.lock();
            self.step(&mut inner, origin, event, &mut notices)
        };

        self.deliver(notices);
        accepted
    }

    /// Applies one event under the lock. Returns `false` if it was ignored.
    fn step(
        self: &Arc<Self>,
        inner: &mut Inner,
        origin: Origin,
        event: Event,
        notices: &mut Vec<Notice>,
    ) -> bool {
        if inner.torn_down {
            trace!(event = event.name(), "Manager torn down, ignoring event");
            return false;
        }

        match origin {
            Origin::Api => {}
            Origin::Link(link) => {
                if inner.link.as_ref().map(|active| active.id) != Some(link) {
                    trace!(link, event = event.name(), "Ignoring event from released link");
                    return false;
                }
            }
            Origin::Timer(token) => {
                if inner.timer.as_ref().map(|timer| timer.token) != Some(token) {
                    trace!(token, "Ignoring cancelled timer");
                    return false;
                }
                inner.timer = None;
            }
        }

        let before = inner.machine.state();
        let transition = match inner.machine.apply(event) {
            Ok(transition) => transition,
            Err(rejected) => {
                debug!(%rejected, "Ignoring event");
                return false;
            }
        };

        self.commit(inner, transition, notices);

        let after = inner.machine.state();
        if after != before {
            info!(from = %before, to = %after, "Connection state changed");
        }

        self.bump_revision();
        true
    }

    /// Installs `transition` and executes its effects.
    fn commit(
        self: &Arc<Self>,
        inner: &mut Inner,
        transition: Transition,
        notices: &mut Vec<Notice>,
    ) {
        inner.machine = transition.next;

        for effect in transition.effects {
            let Some(follow_up) = self.execute(inner, effect, notices) else {
                continue;
            };

            match inner.machine.apply(follow_up) {
                Ok(next) => self.commit(inner, next, notices),
                Err(rejected) => debug!(%rejected, "Ignoring follow-up event"),
            }
        }
    }

    /// Executes one effect. May produce a follow-up event.
    fn execute(
        self: &Arc<Self>,
        inner: &mut Inner,
        effect: Effect,
        notices: &mut Vec<Notice>,
    ) -> Option<Event> {
        let address = self.options.address();

        match effect {
            Effect::OpenTransport => {
                inner.next_link_id += 1;
                let id = inner.next_link_id;
                let sink = EventSink::new(id, self.events_tx.clone());

                match self.transport.open(address, sink) {
                    Ok(handle) => {
                        debug!(link = id, address, "Opening channel");
                        inner.link = Some(ActiveLink { id, handle });
                        None
                    }
                    Err(e) => {
                        error!(address, error = %e, "Failed to create channel transport");
                        Some(Event::OpenFailed)
                    }
                }
            }

            Effect::CloseTransport => {
                if let Some(active) = inner.link.take() {
                    debug!(link = active.id, "Closing channel");
                    active.handle.close();
                }
                None
            }

            Effect::ReleaseTransport => {
                if let Some(active) = inner.link.take() {
                    trace!(link = active.id, "Link released");
                }
                None
            }

            Effect::Schedule { kind, delay } => {
                self.schedule(inner, kind, delay);
                None
            }

            Effect::CancelTimer => {
                Self::cancel_timer(inner);
                None
            }

            Effect::AppendMessage(message) => {
                trace!(id = %message.id(), sender = %message.sender(), "Message appended");
                inner.messages.push(message);
                None
            }

            Effect::NotifyOpen => {
                notices.push(Notice::Opened);
                None
            }

            Effect::NotifyClose => {
                notices.push(Notice::Closed);
                None
            }

            Effect::NotifyError(info) => {
                notices.push(Notice::Error(info));
                None
            }

            Effect::RetriesExhausted { attempts } => {
                warn!(address, attempts, "Maximum reconnection attempts reached, giving up");
                None
            }
        }
    }

    /// Replaces the pending timer.
    fn schedule(self: &Arc<Self>, inner: &mut Inner, kind: TimerKind, delay: Duration) {
        Self::cancel_timer(inner);

        inner.next_timer_token += 1;
        let token = inner.next_timer_token;
        let shared = Arc::downgrade(self);

        let task = self.runtime.spawn(async move {
            sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.on_timer(token, kind);
            }
        });

        let delay_ms = delay.as_millis() as u64;
        match kind {
            TimerKind::Retry => {
                let retry = inner.machine.retry();
                info!(
                    attempt = retry.attempts(),
                    max = retry.max(),
                    delay_ms,
                    "Scheduling reconnection attempt"
                );
            }
            TimerKind::Reconnect => debug!(delay_ms, "Scheduling reconnect"),
        }

        inner.timer = Some(PendingTimer { token, kind, task });
    }

    /// Aborts the pending timer, if any.
    fn cancel_timer(inner: &mut Inner) {
        if let Some(timer) = inner.timer.take() {
            timer.task.abort();
            debug!(kind = ?timer.kind, "Pending timer cancelled");
        }
    }

    /// Invokes the configured hooks.
    fn deliver(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Opened => self.options.notify_open(),
                Notice::Closed => self.options.notify_close(),
                Notice::Error(info) => self.options.notify_error(&info),
            }
        }
    }

    fn bump_revision(&self) {
        self.revision_tx.send_modify(|revision| *revision += 1);
    }
}

// ============================================================================
// Shared - Operations
// ============================================================================

impl<T: Transport> Shared<T> {
    fn send(self: &Arc<Self>, text: &str) -> bool {
        let Some(message) = ChannelMessage::local(text) else {
            debug!("Ignoring blank message");
            return false;
        };

        let mut notices = Vec::new();
        let sent = {
            let mut inner = self.inner.lock();
            let state = inner.machine.state();

            if inner.torn_down || !state.is_usable() {
                debug!(%state, "Cannot send, channel is not open");
                return false;
            }

            let Some(active) = inner.link.as_ref() else {
                debug!("Cannot send, no link");
                return false;
            };

            if let Err(e) = active.handle.send(message.text()) {
                warn!(link = active.id, error = %e, "Failed to send message");
                return false;
            }

            trace!(link = active.id, id = %message.id(), "Message sent");
            self.step(&mut inner, Origin::Api, Event::RequestSent(message), &mut notices)
        };

        self.deliver(notices);
        sent
    }

    /// Cancels the timer and closes the link for good.
    fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;

        Self::cancel_timer(&mut inner);
        if let Some(active) = inner.link.take() {
            active.handle.close();
        }

        debug!(address = self.options.address(), "Connection manager torn down");
    }
}
