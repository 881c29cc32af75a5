use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A thread-safe growable collection with predicate-based bulk removal.
///
/// Used as the server's live-connection registry: the reactor inserts,
/// the housekeeping thread sweeps. Wake-up works the same way as in
/// [`SharedQueue`](super::SharedQueue).
#[derive(Debug)]
pub struct SharedVec<T> {
    items: Mutex<Vec<T>>,
    signal: Mutex<()>,
    available: Condvar,
}

impl<T> Default for SharedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedVec<T> {
    pub fn new() -> Self {
        SharedVec {
            items: Mutex::new(Vec::new()),
            signal: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    pub fn push_back(&self, value: T) {
        self.items.lock().push(value);
        let _sync = self.signal.lock();
        self.available.notify_one();
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

    /// Removes every entry for which `predicate` returns true.
    pub fn remove_if(&self, mut predicate: impl FnMut(&T) -> bool) {
        self.items.lock().retain(|item| !predicate(item));
    }

    /// Visits every entry under the container lock.
    pub fn for_each(&self, mut visit: impl FnMut(&T)) {
        for item in self.items.lock().iter() {
            visit(item);
        }
    }

    /// Blocks the calling thread until the collection is non-empty.
    pub fn wait(&self) {
        let mut sync = self.signal.lock();
        while self.is_empty() {
            self.available.wait(&mut sync);
        }
    }

    /// Like `wait()`, but gives up after `timeout`.
    ///
    /// Returns whether the collection was observed non-empty.
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_remove_if_sweeps_matching_entries() {
        let registry = SharedVec::new();
        registry.push_back(("a", true));
        registry.push_back(("b", false));
        registry.push_back(("c", true));

        // sweep everything that is no longer "connected"
        registry.remove_if(|(_, connected)| !connected);

        assert_eq!(registry.len(), 2);
        let mut remaining = Vec::new();
        registry.for_each(|(name, _)| remaining.push(*name));
        assert_eq!(remaining, vec!["a", "c"]);
    }

    #[test]
    fn test_wait_wakes_on_push() {
        let registry: Arc<SharedVec<u32>> = Arc::new(SharedVec::new());
        let waiter = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.wait();
                registry.len()
            })
        };
        thread::sleep(Duration::from_millis(50));
        registry.push_back(7);
        assert_eq!(waiter.join().unwrap(), 1);
    }

    #[test]
    fn test_wait_timeout_empty() {
        let registry: SharedVec<u32> = SharedVec::new();
        assert!(!registry.wait_timeout(Duration::from_millis(20)));
        registry.push_back(1);
        assert!(registry.wait_timeout(Duration::from_millis(20)));
    }
}
