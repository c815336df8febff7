use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use log::debug;

#[derive(Debug)]
struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
    evicted: u64,
}

#[derive(Debug)]
struct Shared<T> {
    capacity: usize,
    slots: Mutex<Slots<T>>,
    available: Condvar,
}

/// Bounded FIFO between the sensor callback and the fusion consumer.
///
/// When full, pushing evicts the oldest queued item, so the producer never
/// waits for the consumer. Only the freshest readings matter for a live
/// steering angle. Clones share the same queue.
#[derive(Debug)]
pub struct SampleQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SampleQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> SampleQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                capacity,
                slots: Mutex::new(Slots {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                    evicted: 0,
                }),
                available: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue without blocking.
    ///
    /// Returns the evicted oldest item when the queue was full. A closed queue
    /// hands the item straight back.
    pub fn push(&self, item: T) -> Option<T> {
        let mut slots = self.lock();
        if slots.closed {
            return Some(item);
        }
        let evicted = if slots.items.len() >= self.shared.capacity {
            slots.evicted += 1;
            debug!("Sample queue full, dropped oldest ({} total)", slots.evicted);
            slots.items.pop_front()
        } else {
            None
        };
        slots.items.push_back(item);
        drop(slots);
        self.shared.available.notify_one();
        evicted
    }

    /// Dequeue the oldest item, waiting until one arrives.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut slots = self.lock();
        loop {
            if let Some(item) = slots.items.pop_front() {
                return Some(item);
            }
            if slots.closed {
                return None;
            }
            slots = self
                .shared
                .available
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuse further pushes and wake every waiting consumer.
    ///
    /// Items already queued can still be popped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of items dropped to make room since the queue was created
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }
}
