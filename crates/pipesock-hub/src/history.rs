use std::collections::VecDeque;
use std::sync::Arc;

use pipesock_protocol::Broadcast;

/// Fixed-capacity FIFO of past broadcasts, replayed to late joiners.
///
/// Appending at capacity evicts the oldest entry first. A capacity of zero
/// retains nothing.
#[derive(Debug)]
pub struct HistoryRing {
    entries: VecDeque<Arc<Broadcast>>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, broadcast: Arc<Broadcast>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(broadcast);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Broadcast>> {
        self.entries.iter().cloned().collect()
    }

    /// Most recently appended broadcast.
    pub fn latest(&self) -> Option<&Arc<Broadcast>> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pipesock_protocol::Event;

    fn broadcast(n: i64) -> Arc<Broadcast> {
        let at = Utc.timestamp_opt(n, 0).unwrap();
        Arc::new(Broadcast::new(at, vec![Event::at(at, format!("line {n}"))]))
    }

    fn texts(ring: &HistoryRing) -> Vec<String> {
        ring.snapshot()
            .iter()
            .map(|b| b.events[0].text.clone())
            .collect()
    }

    #[test]
    fn keeps_min_of_n_and_capacity() {
        for capacity in [1usize, 2, 5] {
            for n in 0..8i64 {
                let mut ring = HistoryRing::new(capacity);
                for i in 0..n {
                    ring.append(broadcast(i));
                }
                let expected: Vec<String> = (0..n)
                    .skip((n as usize).saturating_sub(capacity))
                    .map(|i| format!("line {i}"))
                    .collect();
                assert_eq!(ring.len(), (n as usize).min(capacity));
                assert_eq!(texts(&ring), expected, "capacity={capacity} n={n}");
            }
        }
    }

    #[test]
    fn eviction_at_capacity_boundary() {
        let mut ring = HistoryRing::new(3);
        for i in 0..3 {
            ring.append(broadcast(i));
        }
        assert_eq!(texts(&ring), ["line 0", "line 1", "line 2"]);

        ring.append(broadcast(3));
        assert_eq!(texts(&ring), ["line 1", "line 2", "line 3"]);
        assert_eq!(ring.latest().unwrap().events[0].text, "line 3");
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut ring = HistoryRing::new(0);
        ring.append(broadcast(1));
        ring.append(broadcast(2));
        assert!(ring.is_empty());
        assert!(ring.snapshot().is_empty());
        assert!(ring.latest().is_none());
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let mut ring = HistoryRing::new(2);
        ring.append(broadcast(1));
        let first = ring.snapshot();
        let second = ring.snapshot();
        assert_eq!(first, second);
        assert_eq!(ring.len(), 1);
    }
}
