use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Connection identity of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One encoded text frame, shared by every subscriber it is queued for.
pub type Frame = Arc<str>;

/// Why a frame could not be queued for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Outbound queue full: the peer is not keeping up.
    Slow,
    /// The session already went away.
    Closed,
}

impl DeliveryFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryFailure::Slow => "slow",
            DeliveryFailure::Closed => "closed",
        }
    }
}

/// Live subscriber handle. Dropping it closes the session's outbound queue,
/// which ends the session.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, tx: mpsc::Sender<Frame>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue one frame without waiting.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), DeliveryFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Slow,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Set of live subscribers, owned by the hub task.
#[derive(Debug, Default)]
pub struct Registry {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscriber. A handle with the same id replaces (and closes)
    /// the previous one.
    pub fn insert(&mut self, subscriber: Subscriber) {
        if self.subscribers.insert(subscriber.id, subscriber).is_some() {
            warn!("subscriber re-registered, previous handle closed");
        }
    }

    /// Remove and close a subscriber. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Queue `frame` for every subscriber. Any subscriber whose queue is
    /// full or closed is dropped on the spot; the others still receive it.
    pub fn fan_out(&mut self, frame: &Frame) -> FanOut {
        let mut outcome = FanOut::default();
        let mut failed = Vec::new();

        for (id, subscriber) in &self.subscribers {
            match subscriber.try_deliver(Arc::clone(frame)) {
                Ok(()) => outcome.delivered += 1,
                Err(reason) => failed.push((*id, reason)),
            }
        }

        for (id, reason) in failed {
            if self.subscribers.remove(&id).is_some() {
                outcome.dropped += 1;
                match reason {
                    DeliveryFailure::Slow => {
                        warn!(subscriber = %id, reason = reason.as_str(), "dropping subscriber")
                    }
                    DeliveryFailure::Closed => {
                        debug!(subscriber = %id, reason = reason.as_str(), "dropping subscriber")
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(cap: usize) -> (Subscriber, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(cap);
        (Subscriber::new(SubscriberId::new(), tx), rx)
    }

    fn frame(text: &str) -> Frame {
        Arc::from(text)
    }

    #[test]
    fn fan_out_reaches_every_subscriber() {
        let mut registry = Registry::new();
        let (a, mut rx_a) = subscriber(4);
        let (b, mut rx_b) = subscriber(4);
        registry.insert(a);
        registry.insert(b);

        let hello = frame("hello");
        let outcome = registry.fan_out(&hello);
        assert_eq!(outcome, FanOut { delivered: 2, dropped: 0 });

        // every queue holds the same allocation
        let got_a = rx_a.try_recv().unwrap();
        let got_b = rx_b.try_recv().unwrap();
        assert_eq!(&*got_a, "hello");
        assert!(Arc::ptr_eq(&got_a, &hello));
        assert!(Arc::ptr_eq(&got_b, &hello));
    }

    #[test]
    fn closed_subscriber_is_dropped_others_still_served() {
        let mut registry = Registry::new();
        let (a, rx_a) = subscriber(4);
        let (b, mut rx_b) = subscriber(4);
        let a_id = a.id();
        registry.insert(a);
        registry.insert(b);
        drop(rx_a);

        let outcome = registry.fan_out(&frame("x"));
        assert_eq!(outcome, FanOut { delivered: 1, dropped: 1 });
        assert!(!registry.contains(&a_id));
        assert_eq!(&*rx_b.try_recv().unwrap(), "x");

        // does not reappear on later passes
        let outcome = registry.fan_out(&frame("y"));
        assert_eq!(outcome, FanOut { delivered: 1, dropped: 0 });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn slow_subscriber_is_dropped_and_its_queue_closed() {
        let mut registry = Registry::new();
        let (slow, mut rx) = subscriber(1);
        registry.insert(slow);

        assert_eq!(registry.fan_out(&frame("1")).delivered, 1);
        assert_eq!(registry.fan_out(&frame("2")).dropped, 1);
        assert!(registry.is_empty());

        assert_eq!(&*rx.try_recv().unwrap(), "1");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = Registry::new();
        let (a, _rx) = subscriber(1);
        let id = a.id();
        registry.insert(a);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(!registry.remove(&SubscriberId::new()));
        assert!(registry.is_empty());
    }
}
