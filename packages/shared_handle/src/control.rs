use std::fmt;
use std::ptr::NonNull;

use tracing::trace;

use crate::{Holder, SharedCount};

/// The allocation shared by every handle in one ownership family.
///
/// Holds the owner count and the anchor holder. The anchor is a clone of the holder the
/// family was created with, so it always knows the concrete pointee type, no matter which
/// static types the individual handles observe the pointee through. When the count drops to
/// zero the anchor destroys the pointee and the block is freed.
pub(crate) struct ControlBlock {
    count: SharedCount,
    anchor: Box<dyn Holder>,
}

impl ControlBlock {
    /// Allocates a new control block with a count of 1.
    ///
    /// The caller becomes the owner of that one reference and must eventually hand it back
    /// via [`release()`][Self::release].
    #[must_use]
    pub(crate) fn allocate(anchor: Box<dyn Holder>) -> NonNull<Self> {
        trace!(
            pointee = anchor.pointee_type_name(),
            live = anchor.is_live(),
            "ownership family created"
        );

        let block = Box::new(Self {
            count: SharedCount::new(),
            anchor,
        });

        NonNull::from(Box::leak(block))
    }

    /// Registers an additional owner.
    ///
    /// # Safety
    ///
    /// The caller must already own a reference to the block, keeping it alive.
    pub(crate) unsafe fn acquire(this: NonNull<Self>) {
        // SAFETY: The caller owns a reference, so the block is alive.
        let block = unsafe { this.as_ref() };

        block.count.increment();
    }

    /// Gives back one reference, destroying the pointee and the block if it was the last one.
    ///
    /// # Safety
    ///
    /// The caller must own a reference to the block and must not use `this` afterwards.
    pub(crate) unsafe fn release(this: NonNull<Self>) {
        // SAFETY: The caller owns a reference, so the block is alive.
        let remaining = unsafe { this.as_ref() }.count.decrement();

        if remaining != 0 {
            return;
        }

        // SAFETY: We just took the count from 1 to 0, so we are the last owner and nobody
        // else can reach the block anymore. It was allocated via `Box` in `allocate()`.
        let mut block = unsafe { Box::from_raw(this.as_ptr()) };

        trace!(
            pointee = block.anchor.pointee_type_name(),
            "last owner released, destroying pointee"
        );

        // SAFETY: All other owners are gone, so nothing can observe the pointee anymore.
        unsafe {
            block.anchor.destroy();
        }
    }

    /// The current owner count, for diagnostics.
    ///
    /// # Safety
    ///
    /// The caller must own a reference to the block.
    #[must_use]
    pub(crate) unsafe fn count(this: NonNull<Self>) -> usize {
        // SAFETY: The caller owns a reference, so the block is alive.
        unsafe { this.as_ref() }.count.get()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl fmt::Debug for ControlBlock {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("count", &self.count)
            .field("anchor", &self.anchor)
            .finish()
    }
}
