//! Blocking FIFO queue shared by producers and the worker pool.
//!
//! Producers never block beyond acquiring the internal lock. Workers block in
//! [`WorkQueue::dequeue`] until an item arrives or the queue is shut down.
//! Shutdown never discards accepted items: they stay dequeuable until drained.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Returned by [`WorkQueue::enqueue`] after shutdown, handing the item back.
#[derive(Error, Debug, PartialEq)]
#[error("Queue is closed")]
pub struct QueueClosed<T>(pub T);

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Every critical section leaves the state consistent, so poisoning is ignored.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item. Never blocks; fails only once the queue is shut down.
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosed<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(QueueClosed(item));
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until an item is available or the queue is shut down.
    ///
    /// # Returns
    ///
    /// * `Some(item)` in FIFO order.
    /// * `None` once the queue is shut down and fully drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self
            .available
            .wait_while(self.lock(), |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        state.items.pop_front()
    }

    /// Non-blocking variant of [`WorkQueue::dequeue`]; `None` when empty.
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Instantaneous number of queued items. Advisory only.
    pub fn depth(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Stops accepting items and wakes every blocked dequeuer. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.available.notify_all();
    }
}
