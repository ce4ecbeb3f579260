//! Bounded queue that evicts its oldest item instead of blocking producers.
//!
//! Telemetry freshness matters more than completeness: when a consumer falls
//! behind, the stalest report is the one worth losing.  Any number of tasks
//! may [`push`](DropOldestQueue::push); exactly one task is expected to
//! [`pop`](DropOldestQueue::pop).

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::Notify;

use crate::sync::lock;

/// Returned by [`DropOldestQueue::push`] once the queue has been closed.
/// Carries the rejected item back to the caller.
#[derive(Debug, Error, PartialEq)]
#[error("queue is closed")]
pub struct QueueClosed<T>(pub T);

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer, single-consumer FIFO with drop-oldest overflow.
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> DropOldestQueue<T> {
    /// Creates an empty queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Appends `item`, evicting and returning the oldest item if full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] with the item if the queue was closed.
    pub fn push(&self, item: T) -> Result<Option<T>, QueueClosed<T>> {
        let evicted = {
            let mut state = lock(&self.state);
            if state.closed {
                return Err(QueueClosed(item));
            }
            let evicted = if state.items.len() >= self.capacity {
                state.items.pop_front()
            } else {
                None
            };
            state.items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        Ok(evicted)
    }

    /// Waits for the next item.
    ///
    /// Items still queued when the queue is closed are returned first;
    /// `None` means the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking so a push or close that
            // lands between the check and the await is not missed.
            notified.as_mut().enable();

            {
                let mut state = lock(&self.state);
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Takes the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        lock(&self.state).items.pop_front()
    }

    /// Refuses further pushes and wakes the consumer.  Idempotent.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Removes and returns every queued item in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        lock(&self.state).items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_push_past_capacity_drops_oldest_and_keeps_fifo() {
        // Arrange
        let queue = DropOldestQueue::new(16);

        // Act: 17 pushes with a stalled consumer
        let mut evicted = Vec::new();
        for i in 1..=17 {
            if let Some(old) = queue.push(i).unwrap() {
                evicted.push(old);
            }
        }

        // Assert
        assert_eq!(evicted, vec![1]);
        assert_eq!(queue.drain(), (2..=17).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_after_close_returns_item() {
        let queue = DropOldestQueue::new(4);
        queue.close();

        assert_eq!(queue.push("late"), Err(QueueClosed("late")));
        assert!(queue.is_closed());
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let queue = DropOldestQueue::new(0);
        queue.push(1).unwrap();

        assert_eq!(queue.push(2).unwrap(), Some(1));
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_pop_waits_until_push_wakes_it() {
        // Arrange
        let queue = DropOldestQueue::new(4);
        let mut pop = task::spawn(queue.pop());

        // Act / Assert: nothing queued yet
        assert_pending!(pop.poll());

        queue.push(42).unwrap();

        assert!(pop.is_woken());
        assert_ready_eq!(pop.poll(), Some(42));
    }

    #[test]
    fn test_close_wakes_pending_pop_with_none() {
        let queue: DropOldestQueue<u8> = DropOldestQueue::new(4);
        let mut pop = task::spawn(queue.pop());
        assert_pending!(pop.poll());

        queue.close();

        assert!(pop.is_woken());
        assert_ready_eq!(pop.poll(), None);
    }

    #[tokio::test]
    async fn test_close_drains_remaining_items_before_none() {
        let queue = DropOldestQueue::new(4);
        queue.push('a').unwrap();
        queue.push('b').unwrap();
        queue.close();

        assert_eq!(queue.pop().await, Some('a'));
        assert_eq!(queue.pop().await, Some('b'));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_producers_never_exceed_capacity() {
        let queue = std::sync::Arc::new(DropOldestQueue::new(8));
        let mut handles = Vec::new();
        for p in 0..4u32 {
            let q = std::sync::Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                for i in 0..100u32 {
                    let _ = q.push(p * 1000 + i);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(queue.len(), 8);
    }
}
