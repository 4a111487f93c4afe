//! Typed publish/subscribe topics.
//!
//! Each [`Topic`] fans a value out to its subscribers over bounded
//! crossbeam channels. Publishing never blocks: a full subscriber queue
//! evicts its oldest value, so subscribers always hold the most recent one.
//! Dropping a [`Subscription`] removes it from the topic.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

/// Subscriber ID for registration/deregistration
pub type SubscriberId = u64;

struct Subscriber<T> {
    id: SubscriberId,
    sender: Sender<T>,
    /// Topic-side handle on the queue, used to evict the oldest value
    evictor: Receiver<T>,
}

struct TopicInner<T> {
    subscribers: Vec<Subscriber<T>>,
    next_id: SubscriberId,
}

/// A named broadcast channel carrying values of type `T`.
pub struct Topic<T> {
    name: &'static str,
    capacity: usize,
    inner: Arc<Mutex<TopicInner<T>>>,
    dropped: AtomicU64,
}

impl<T: Clone + Send + 'static> Topic<T> {
    /// Create a topic whose subscribers each buffer at most `capacity` values.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(TopicInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = bounded(self.capacity);
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            sender,
            evictor: receiver.clone(),
        });

        Subscription {
            id,
            receiver,
            topic: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `value` to every subscriber, returning how many received it.
    pub fn publish(&self, value: T) -> usize {
        let inner = self.inner.lock().unwrap();
        let mut delivered = 0;

        for sub in &inner.subscribers {
            let mut pending = value.clone();
            loop {
                match sub.sender.try_send(pending) {
                    Ok(()) => {
                        delivered += 1;
                        break;
                    }
                    Err(TrySendError::Full(v)) => {
                        if sub.evictor.try_recv().is_ok() {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                "Topic '{}' subscriber {} queue full, evicted oldest value",
                                self.name, sub.id
                            );
                        }
                        pending = v;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    /// Number of values evicted because a subscriber queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving end of a topic. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: SubscriberId,
    receiver: Receiver<T>,
    topic: Weak<Mutex<TopicInner<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next value.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain the queue and keep only the most recent value.
    pub fn latest(&self) -> Option<T> {
        self.receiver.try_iter().last()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(topic) = self.topic.upgrade() {
            if let Ok(mut inner) = topic.lock() {
                inner.subscribers.retain(|s| s.id != self.id);
            }
        }
    }
}
