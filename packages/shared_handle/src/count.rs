use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Owner counts above this abort the process, the same limit `Arc` uses.
const MAX_COUNT: usize = isize::MAX.unsigned_abs();

/// The number of live owners of one control block.
///
/// Starts at 1 because it is only ever created on behalf of the first owner. Only the
/// increment and decrement operations mutate it; there is no way to set it directly.
#[derive(Debug)]
pub(crate) struct SharedCount {
    value: AtomicUsize,
}

impl SharedCount {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            value: AtomicUsize::new(1),
        }
    }

    /// Registers one more owner and returns the new count.
    ///
    /// Relaxed is enough here: a new owner can only be created from an existing one,
    /// which already keeps the pointee alive and already synchronized with its creation.
    pub(crate) fn increment(&self) -> usize {
        let previous = self.value.fetch_add(1, Ordering::Relaxed);

        if previous >= MAX_COUNT {
            // Someone is leaking handles in a loop. Continuing would risk a wrap to zero
            // and a use-after-free, so we take the whole process down instead.
            process::abort();
        }

        previous.wrapping_add(1)
    }

    /// Unregisters one owner and returns the new count.
    ///
    /// The owner that observes zero is responsible for destroying the pointee. AcqRel makes
    /// every write done through the other owners visible to it before it does so.
    pub(crate) fn decrement(&self) -> usize {
        let previous = self.value.fetch_sub(1, Ordering::AcqRel);

        debug_assert!(previous > 0, "shared count decremented below zero");

        previous.wrapping_sub(1)
    }

    /// Reads the current count. Diagnostics only, the value may be stale by the time
    /// the caller looks at it.
    #[must_use]
    pub(crate) fn get(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}
