use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A thread-safe FIFO queue with blocking wake-up.
///
/// Every operation takes the container lock for the duration of the call.
/// `wait()` blocks on a condition variable guarded by a second mutex; the
/// predicate re-checks `is_empty()` under the container lock, and pushers
/// acquire the condvar mutex before notifying, so a waiter cannot miss a
/// push that lands between its predicate check and its sleep.
#[derive(Debug)]
pub struct SharedQueue<T> {
    items: Mutex<VecDeque<T>>,
    signal: Mutex<()>,
    available: Condvar,
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedQueue<T> {
    pub fn new() -> Self {
        SharedQueue {
            items: Mutex::new(VecDeque::new()),
            signal: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    /// Appends `value` and reports whether the queue was empty immediately
    /// before the push. The observation and the insertion happen under one
    /// container-lock acquisition, so no pop can slip between them.
    pub fn push_back(&self, value: T) -> bool {
        let mut items = self.items.lock();
        let was_empty = items.is_empty();
        items.push_back(value);
        drop(items);
        let _sync = self.signal.lock();
        self.available.notify_one();
        was_empty
    }

    pub fn push_front(&self, value: T) -> bool {
        let mut items = self.items.lock();
        let was_empty = items.is_empty();
        items.push_front(value);
        drop(items);
        let _sync = self.signal.lock();
        self.available.notify_one();
        was_empty
    }

    /// Removes and returns the head of the queue, `None` when empty.
    pub fn pop_front(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub fn pop_back(&self) -> Option<T> {
        self.items.lock().pop_back()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Blocks the calling thread until the queue is non-empty.
    ///
    /// Does not consume an element; with several consumers a subsequent pop
    /// can still lose the race, so callers must re-check after waking.
    pub fn wait(&self) {
        let mut sync = self.signal.lock();
        while self.is_empty() {
            self.available.wait(&mut sync);
        }
    }

    /// Like `wait()`, but gives up after `timeout`.
    ///
    /// Returns whether the queue was observed non-empty before returning.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut sync = self.signal.lock();
        while self.is_empty() {
            if self.available.wait_until(&mut sync, deadline).timed_out() {
                return !self.is_empty();
            }
        }
        true
    }
}

impl<T: Clone> SharedQueue<T> {
    /// Returns a clone of the head without removing it.
    pub fn front(&self) -> Option<T> {
        self.items.lock().front().cloned()
    }

    pub fn back(&self) -> Option<T> {
        self.items.lock().back().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = SharedQueue::new();
        queue.push_back(1);
        queue.push_back(2);
        queue.push_front(0);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(0));
        assert_eq!(queue.back(), Some(2));
        assert_eq!(queue.pop_front(), Some(0));
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_back(), Some(2));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_push_pop_loses_nothing() {
        const THREADS: usize = 4;
        const PER_THREAD: u64 = 1000;

        let queue = Arc::new(SharedQueue::new());

        let producers: Vec<_> = (0..THREADS)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        queue.push_back((t as u64, i));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        // FIFO must hold among pushes from a single thread
        let mut last_seen = [None::<u64>; THREADS];
        let mut popped = 0;
        while let Some((t, i)) = queue.pop_front() {
            if let Some(prev) = last_seen[t as usize] {
                assert!(i > prev, "thread {} out of order: {} after {}", t, i, prev);
            }
            last_seen[t as usize] = Some(i);
            popped += 1;
        }
        assert_eq!(popped, THREADS as u64 * PER_THREAD);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_reports_empty_before_push() {
        let queue = SharedQueue::new();
        assert!(queue.push_back("m1"));
        assert!(!queue.push_back("m2"));
        queue.clear();
        assert!(queue.push_front("m3"));
        assert!(!queue.push_front("m4"));
    }

    #[test]
    fn test_chain_handoff_when_consumer_drains_to_empty() {
        // models a write chain finishing as a sender pushes: the chain pops
        // the last element, observes an empty queue and exits; the push that
        // lands next must report empty-before-push so the sender knows to
        // start a fresh chain instead of relying on the one that just left
        let queue = SharedQueue::new();
        queue.push_back("m1");
        assert_eq!(queue.pop_front(), Some("m1"));
        assert!(queue.front().is_none());
        assert!(
            queue.push_back("m2"),
            "the push after the drain must start the next chain"
        );
    }

    #[test]
    fn test_wait_wakes_on_push() {
        let queue: Arc<SharedQueue<u32>> = Arc::new(SharedQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.wait();
                queue.pop_front()
            })
        };
        thread::sleep(Duration::from_millis(50));
        queue.push_back(42);
        assert_eq!(waiter.join().unwrap(), Some(42));
    }

    #[test]
    fn test_wait_timeout_on_empty_queue() {
        let queue: SharedQueue<u32> = SharedQueue::new();
        let start = Instant::now();
        assert!(!queue.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_clear() {
        let queue = SharedQueue::new();
        queue.push_back("a");
        queue.push_back("b");
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }
}
