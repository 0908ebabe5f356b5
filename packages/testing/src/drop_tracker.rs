use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts how many values wrapped via [`track()`][Self::track] have been dropped.
///
/// The tracker can be cloned and moved to other threads; all clones share one counter.
///
/// # Example
///
/// ```rust
/// use testing::DropTracker;
///
/// let tracker = DropTracker::new();
/// let value = tracker.track(5_u32);
///
/// assert_eq!(*value, 5);
/// assert_eq!(tracker.drops(), 0);
///
/// drop(value);
/// assert_eq!(tracker.drops(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DropTracker {
    drops: Arc<AtomicUsize>,
}

impl DropTracker {
    /// Creates a tracker that has not seen any drops yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `value` so that dropping the wrapper is recorded by this tracker.
    #[must_use]
    pub fn track<T>(&self, value: T) -> Tracked<T> {
        Tracked {
            value,
            drops: Arc::clone(&self.drops),
        }
    }

    /// The number of tracked values dropped so far.
    #[must_use]
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::Acquire)
    }
}

/// A value whose drop is recorded by the [`DropTracker`] that created it.
pub struct Tracked<T> {
    value: T,
    drops: Arc<AtomicUsize>,
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::Release);
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl<T: fmt::Display> fmt::Display for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}
