//! Bounded, ordered event log with push subscriptions
//!
//! Events live in a FIFO ring buffer and are fanned out to subscribers over
//! a `tokio::sync::broadcast` channel. Ids come from a counter that never
//! resets, so a reader can detect gaps caused by eviction or lag.

use chrono::Utc;
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::types::{Event, EventType, NewEvent};

struct Inner {
    events: VecDeque<Event>,
    next_id: u64,
    /// Id of the most recently evicted event, if any.
    last_evicted: Option<u64>,
}

/// Append-only event log.
///
/// Append takes the lock, assigns the id, stores and broadcasts before
/// releasing it; this keeps the broadcast order identical to id order.
pub struct EventLog {
    inner: Mutex<Inner>,
    capacity: usize,
    sender: broadcast::Sender<Event>,
}

impl EventLog {
    /// `capacity` bounds the ring buffer; `subscriber_buffer` bounds how far
    /// a subscriber may fall behind before it starts missing events.
    pub fn new(capacity: usize, subscriber_buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(subscriber_buffer.max(1));
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity.min(4096)),
                next_id: 1,
                last_evicted: None,
            }),
            capacity: capacity.max(1),
            sender,
        }
    }

    /// Append an event, evicting the oldest on overflow. Returns the stored event.
    pub fn append(&self, new: NewEvent) -> Event {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let event = Event {
            id: inner.next_id,
            event_type: new.event_type,
            severity: new.severity,
            tag: new.tag,
            payload: new.payload,
            timestamp: Utc::now(),
        };
        inner.next_id += 1;
        inner.events.push_back(event.clone());
        while inner.events.len() > self.capacity {
            if let Some(evicted) = inner.events.pop_front() {
                inner.last_evicted = Some(evicted.id);
            }
        }
        // Ignore the SendError: it only means there are no subscribers
        let _ = self.sender.send(event.clone());
        drop(inner);

        tracing::debug!(
            id = event.id,
            event_type = %event.event_type,
            tag = event.tag.as_deref().unwrap_or(""),
            "Event appended"
        );
        event
    }

    /// Events with id strictly greater than `after`, oldest first, at most `limit`.
    pub fn since(&self, after: u64, limit: usize) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .events
            .iter()
            .filter(|e| e.id > after)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The newest `limit` events (optionally of one type), oldest first.
    pub fn recent(&self, limit: usize, event_type: Option<EventType>) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Event> = inner
            .events
            .iter()
            .rev()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Id that the next appended event will receive.
    pub fn next_id(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).next_id
    }

    /// Id of the most recently evicted event.
    pub fn last_evicted(&self) -> Option<u64> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).last_evicted
    }

    /// Subscribe to events appended from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Ordered stream of events appended after the subscription was created.
pub struct EventSubscription {
    receiver: broadcast::Receiver<Event>,
}

impl EventSubscription {
    /// Next event, or `None` once the log is dropped.
    ///
    /// A subscriber that falls more than the buffer size behind skips the
    /// missed events; the jump in ids tells it how many.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event subscriber lagged, skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ev(t: EventType) -> NewEvent {
        NewEvent::new(t, json!({}))
    }

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let log = EventLog::new(10, 16);
        let a = log.append(ev(EventType::ConnectionLost));
        let b = log.append(ev(EventType::ConnectionRestored));
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let log = EventLog::new(5, 16);
        for _ in 0..12 {
            log.append(ev(EventType::ChaosInjected));
            assert!(log.len() <= 5);
        }
        let all = log.since(0, usize::MAX);
        assert_eq!(all.len(), 5);
        assert_eq!(all.first().map(|e| e.id), Some(8));
        assert_eq!(log.last_evicted(), Some(7));
        assert!(all[0].id > log.last_evicted().unwrap());
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn since_and_recent_filter() {
        let log = EventLog::new(100, 16);
        log.append(ev(EventType::ThresholdViolation));
        log.append(ev(EventType::ViolationResolved));
        log.append(ev(EventType::ThresholdViolation));

        let after_first: Vec<u64> = log.since(1, 10).iter().map(|e| e.id).collect();
        assert_eq!(after_first, vec![2, 3]);

        let violations = log.recent(10, Some(EventType::ThresholdViolation));
        assert_eq!(violations.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);

        let last = log.recent(1, None);
        assert_eq!(last[0].id, 3);
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let log = EventLog::new(100, 16);
        let mut sub = log.subscribe();
        for _ in 0..3 {
            log.append(ev(EventType::RemediationTriggered));
        }
        for expected in 1..=3 {
            assert_eq!(sub.recv().await.map(|e| e.id), Some(expected));
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let log = EventLog::new(100, 2);
        let mut sub = log.subscribe();
        for _ in 0..5 {
            log.append(ev(EventType::ChaosResolved));
        }
        let first = sub.recv().await.unwrap();
        assert!(first.id > 1, "lagged subscriber should skip evicted events");
    }
}
