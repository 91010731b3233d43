use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pipesock_core::config::HubSettings;
use pipesock_core::{PipesockError, Result};
use pipesock_protocol::{encode_broadcast, encode_history, Broadcast, Event};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::SubmitError;
use crate::history::HistoryRing;
use crate::registry::{FanOut, Frame, Registry, Subscriber, SubscriberId};

/// Capacity of the join/leave/stats mailbox.
const COMMAND_QUEUE: usize = 256;

/// Fixed hub parameters, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub flush_period: Duration,
    pub history_capacity: usize,
    pub max_pending: usize,
    pub inbound_queue: usize,
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        Self {
            flush_period: Duration::from_millis(settings.delay_ms),
            history_capacity: settings.buffer_size,
            max_pending: settings.max_pending,
            inbound_queue: settings.inbound_queue,
        }
    }
}

/// Point-in-time counters, reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub subscribers: usize,
    pub history: usize,
    pub pending: usize,
    pub flushes: u64,
}

/// Result of a non-empty flush.
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub broadcast: Arc<Broadcast>,
    pub fan_out: FanOut,
}

enum Command {
    Register(Subscriber),
    Unregister(SubscriberId),
    Stats(oneshot::Sender<HubStats>),
}

/// Everything the hub task owns exclusively: the pending buffer, the
/// history ring and the subscriber registry.
///
/// Every mutation happens on the hub task, so a join, a leave and a flush
/// never interleave.
pub struct HubState {
    pending: Vec<Event>,
    max_pending: usize,
    history: HistoryRing,
    registry: Registry,
    flushes: u64,
}

impl HubState {
    pub fn new(history_capacity: usize, max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
            history: HistoryRing::new(history_capacity),
            registry: Registry::new(),
            flushes: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// True once the pending buffer holds `max_pending` events.
    pub fn is_saturated(&self) -> bool {
        self.pending.len() >= self.max_pending
    }

    /// Turn the pending buffer into a broadcast, record it in history and
    /// queue it for every subscriber. No-op when nothing is pending.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<FlushReport> {
        if self.pending.is_empty() {
            return None;
        }

        let events = std::mem::take(&mut self.pending);
        let broadcast = Arc::new(Broadcast::new(now, events));
        self.history.append(Arc::clone(&broadcast));
        self.flushes += 1;

        let fan_out = match encode_broadcast(&broadcast) {
            Ok(payload) => self.registry.fan_out(&Frame::from(payload)),
            Err(e) => {
                error!(code = e.code(), error = %e, "broadcast encoding failed, skipping delivery");
                FanOut::default()
            }
        };

        debug!(
            events = broadcast.events.len(),
            delivered = fan_out.delivered,
            dropped = fan_out.dropped,
            history = self.history.len(),
            "flushed broadcast"
        );

        Some(FlushReport { broadcast, fan_out })
    }

    /// Admit a subscriber: queue the history replay (if any) ahead of every
    /// future broadcast, then add it to the registry.
    ///
    /// Returns `false` if the replay could not be queued; the subscriber is
    /// then dropped, which closes its session.
    pub fn join(&mut self, subscriber: Subscriber) -> bool {
        let id = subscriber.id();

        if !self.history.is_empty() {
            match encode_history(&self.history.snapshot()) {
                Ok(payload) => {
                    if let Err(reason) = subscriber.try_deliver(Frame::from(payload)) {
                        warn!(subscriber = %id, reason = reason.as_str(), "history replay failed");
                        return false;
                    }
                }
                Err(e) => {
                    error!(subscriber = %id, code = e.code(), error = %e, "history encoding failed, skipping replay");
                }
            }
        }

        self.registry.insert(subscriber);
        info!(
            subscriber = %id,
            replayed = self.history.len(),
            subscribers = self.registry.len(),
            "subscriber joined"
        );
        true
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn leave(&mut self, id: &SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            info!(subscriber = %id, subscribers = self.registry.len(), "subscriber left");
        }
        removed
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.registry.len(),
            history: self.history.len(),
            pending: self.pending.len(),
            flushes: self.flushes,
        }
    }
}

/// Cloneable handle to the running hub task.
///
/// The task lives as long as any handle does.
#[derive(Clone)]
pub struct Hub {
    events: mpsc::Sender<Event>,
    commands: mpsc::Sender<Command>,
}

impl Hub {
    /// Start the hub task on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.inbound_queue.max(1));
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);

        let state = HubState::new(config.history_capacity, config.max_pending.max(1));
        tokio::spawn(run(state, config.flush_period, events_rx, commands_rx));

        Self {
            events: events_tx,
            commands: commands_tx,
        }
    }

    /// Enqueue a line without waiting, stamped with the current time.
    ///
    /// `SubmitError::Full` is backpressure, not a failure: the caller may
    /// retry later or drop the line.
    pub fn submit(&self, text: impl Into<String>) -> std::result::Result<(), SubmitError> {
        self.events
            .try_send(Event::new(text))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::Full,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            })
    }

    /// Enqueue a line, waiting while the inbound queue is full. Only fails
    /// once the hub task is gone.
    pub async fn submit_wait(&self, text: impl Into<String>) -> Result<()> {
        self.events
            .send(Event::new(text))
            .await
            .map_err(|_| PipesockError::HubClosed)
    }

    /// Register a subscriber whose frames go to `tx`. The first frame queued
    /// is the history replay, unless history is empty.
    pub async fn register(&self, tx: mpsc::Sender<Frame>) -> Result<SubscriberId> {
        let id = SubscriberId::new();
        self.commands
            .send(Command::Register(Subscriber::new(id, tx)))
            .await
            .map_err(|_| PipesockError::HubClosed)?;
        Ok(id)
    }

    /// Remove a subscriber. Safe to call more than once.
    pub async fn unregister(&self, id: SubscriberId) {
        // a closed hub has no registry left to clean up
        let _ = self.commands.send(Command::Unregister(id)).await;
    }

    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(reply))
            .await
            .map_err(|_| PipesockError::HubClosed)?;
        rx.await.map_err(|_| PipesockError::HubClosed)
    }
}

/// Hub task: waits on the next of (flush tick, command, event).
async fn run(
    mut state: HubState,
    period: Duration,
    mut events: mpsc::Receiver<Event>,
    mut commands: mpsc::Receiver<Command>,
) {
    info!(
        period_ms = period.as_millis() as u64,
        history = state.history.capacity(),
        max_pending = state.max_pending,
        "hub started"
    );

    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            _ = tick.tick() => {
                state.flush(Utc::now());
            }

            cmd = commands.recv() => match cmd {
                Some(Command::Register(subscriber)) => {
                    state.join(subscriber);
                }
                Some(Command::Unregister(id)) => {
                    state.leave(&id);
                }
                Some(Command::Stats(reply)) => {
                    let _ = reply.send(state.stats());
                }
                None => break,
            },

            event = events.recv(), if events_open && !state.is_saturated() => match event {
                Some(event) => state.push(event),
                None => events_open = false,
            },
        }
    }

    info!("hub stopped");
}
