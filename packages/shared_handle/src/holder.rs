use std::any::{TypeId, type_name};
use std::fmt;
use std::ptr::NonNull;

/// Type-erased access to the pointee of a [`Shared`][crate::Shared] handle.
///
/// Every handle owns its own holder, while all holders cloned from one another wrap the
/// same pointee. This lets a handle observe its pointee through any static type it likes
/// (e.g. a trait object) while the holder still knows the concrete type it was created with
/// and therefore how to destroy the pointee and how to answer runtime type checks.
pub(crate) trait Holder {
    /// Destroys the pointee, if there is one, and forgets the pointer.
    ///
    /// Calling this again afterwards does nothing.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that nothing else will access the pointee afterwards,
    /// including through other holders that wrap the same pointer.
    unsafe fn destroy(&mut self);

    /// Creates a new holder wrapping the same pointer. The pointee itself is not copied.
    fn clone_holder(&self) -> Box<dyn Holder>;

    /// Whether the wrapped pointer is non-null.
    fn is_live(&self) -> bool;

    /// The address of the pointee, without any pointer metadata.
    fn address(&self) -> Option<NonNull<()>>;

    /// The concrete type the holder was created for.
    fn pointee_type(&self) -> TypeId;

    /// Human-readable name of the concrete pointee type, for diagnostics.
    fn pointee_type_name(&self) -> &'static str;

    /// Whether both holders wrap the same live pointee.
    ///
    /// The holders may have been created for unrelated static types; only the address counts.
    fn identity_equals(&self, other: &dyn Holder) -> bool {
        match (self.address(), other.address()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        }
    }
}

/// The one [`Holder`] implementation, instantiated once per concrete pointee type.
///
/// The pointer originates from `Box::into_raw` and is released with `Box::from_raw`.
pub(crate) struct TypedHolder<U: ?Sized + 'static> {
    ptr: Option<NonNull<U>>,
}

impl<U: ?Sized + 'static> TypedHolder<U> {
    /// Takes over an allocation made by `Box`.
    #[must_use]
    pub(crate) fn from_box(value: Box<U>) -> Self {
        Self {
            ptr: Some(NonNull::from(Box::leak(value))),
        }
    }

    /// Wraps a pointer that came out of `Box::into_raw`, or null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have been obtained from `Box::into_raw` and its ownership
    /// is transferred to the holder family created from the result.
    #[must_use]
    pub(crate) unsafe fn from_raw(ptr: *mut U) -> Self {
        Self {
            ptr: NonNull::new(ptr),
        }
    }

    /// A holder that never had a pointee. Used for handles that co-own a control block
    /// without being able to observe its pointee.
    #[must_use]
    pub(crate) fn dead() -> Self {
        Self { ptr: None }
    }

    #[must_use]
    pub(crate) fn ptr(&self) -> Option<NonNull<U>> {
        self.ptr
    }
}

impl<U: ?Sized + 'static> Holder for TypedHolder<U> {
    unsafe fn destroy(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: The pointer came from `Box::into_raw` (or `Box::leak`) and the caller
            // guarantees that no other holder will touch the pointee again.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }

    fn clone_holder(&self) -> Box<dyn Holder> {
        Box::new(Self { ptr: self.ptr })
    }

    fn is_live(&self) -> bool {
        self.ptr.is_some()
    }

    fn address(&self) -> Option<NonNull<()>> {
        self.ptr.map(NonNull::cast::<()>)
    }

    fn pointee_type(&self) -> TypeId {
        TypeId::of::<U>()
    }

    fn pointee_type_name(&self) -> &'static str {
        type_name::<U>()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<U: ?Sized + 'static> fmt::Debug for TypedHolder<U> {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("ptr", &self.ptr)
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl fmt::Debug for dyn Holder {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("pointee_type", &self.pointee_type_name())
            .field("address", &self.address())
            .finish()
    }
}
