//! Fan-out of processing events to external subscribers.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// Default per-subscriber buffer depth.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Broadcasts events to any number of subscribers.
///
/// Each subscriber gets its own bounded channel. Publishing never blocks: a
/// subscriber whose buffer is full misses the event, and subscribers whose
/// receiver was dropped are pruned on the next publish.
///
/// # Example
///
/// ```
/// use scan_types::EventHub;
///
/// let hub = EventHub::new(4);
/// let rx = hub.subscribe();
/// hub.publish(&"done");
/// assert_eq!(rx.try_recv(), Ok("done"));
/// ```
#[derive(Debug)]
pub struct EventHub<E> {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl<E> EventHub<E> {
    /// Creates a hub whose subscribers buffer up to `capacity` events
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers as of the last publish.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone> EventHub<E> {
    /// Sends `event` to every subscriber. Returns how many received it.
    pub fn publish(&self, event: &E) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }
}
