use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::Deref;
use std::ptr::NonNull;

use crate::constants::ERR_DEREF_NULL;
use crate::{ControlBlock, Holder, TypedHolder};

/// A shared-ownership handle to a heap-allocated object.
///
/// Any number of handles can co-own one object. Cloning a handle registers another owner and
/// dropping a handle unregisters one. The object is dropped exactly once, when the last owner
/// goes away, no matter in which order the handles are dropped or on which thread.
///
/// All the handles that co-own one object form an ownership family. The members of a family
/// may observe the object through different static types: a `Shared<Circle>` and a
/// `Shared<dyn Shape>` can share the same circle and the same owner count. The handle keeps
/// track of the concrete type the object was created with, which is what makes
/// [`dynamic_cast()`][crate::dynamic_cast] from `Shared<dyn Shape>` back to `Shared<Circle>`
/// possible.
///
/// # Empty and dead handles
///
/// A handle is *empty* when it belongs to no family, e.g. after [`Shared::empty()`] or
/// [`reset()`][Self::reset]. A handle is *dead* when it belongs to a family but cannot observe
/// the object, e.g. when created from a null pointer or by a failed dynamic cast. Both
/// report `false` from [`is_live()`][Self::is_live] and compare equal to each other.
///
/// Dereferencing an empty or dead handle panics. Use [`get()`][Self::get] to check first.
///
/// # Thread safety
///
/// The owner count is updated atomically, so handles of one family can be cloned and dropped
/// concurrently on different threads. The handle is `Send` and `Sync` if the object is
/// both `Send` and `Sync`, same as [`Arc`][std::sync::Arc].
///
/// # Example
///
/// ```rust
/// use shared_handle::Shared;
///
/// let first = Shared::new("hello".to_string());
/// let second = first.clone();
///
/// assert_eq!(first.shared_count(), 2);
/// assert_eq!(*second, "hello");
/// assert_eq!(first, second);
///
/// drop(first);
/// assert_eq!(second.shared_count(), 1);
/// ```
pub struct Shared<T: ?Sized> {
    /// Owned exclusively by this handle. `None` if and only if `control` is `None`.
    holder: Option<Box<dyn Holder>>,

    control: Option<NonNull<ControlBlock>>,

    /// How this handle observes the pointee. `None` if the handle is empty or dead.
    view: Option<NonNull<T>>,

    _owns: PhantomData<T>,
}

impl<T: ?Sized> Shared<T> {
    /// Creates an empty handle that does not own anything.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shared_handle::Shared;
    ///
    /// let handle = Shared::<u32>::empty();
    ///
    /// assert!(handle.is_empty());
    /// assert!(!handle.is_live());
    /// assert_eq!(handle.shared_count(), 0);
    /// ```
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            holder: None,
            control: None,
            view: None,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a boxed value of a related type, observing it through `T`.
    ///
    /// The new family remembers `U` as the concrete type of the pointee, so the handle can
    /// later be downcast back to `U` via [`dynamic_cast()`][crate::dynamic_cast].
    ///
    /// Prefer the safe casts generated by [`define_shared_dyn_cast!`][crate::define_shared_dyn_cast]
    /// for converting to trait objects.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that the callback input and output references point to the
    /// same object.
    ///
    /// If `T` is `Send` or `Sync`, the caller must guarantee that `U` is too.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Display;
    ///
    /// use shared_handle::{Shared, dynamic_cast};
    ///
    /// // SAFETY: An unsizing coercion returns a reference to the same object.
    /// let display: Shared<dyn Display> =
    ///     unsafe { Shared::from_box_with(Box::new(5_u8), |x| x as &dyn Display) };
    ///
    /// assert_eq!(display.to_string(), "5");
    ///
    /// let number = dynamic_cast::<u8, _>(&display);
    /// assert_eq!(*number, 5);
    /// ```
    #[must_use]
    pub unsafe fn from_box_with<U, F>(value: Box<U>, cast: F) -> Self
    where
        U: ?Sized + 'static,
        F: FnOnce(&U) -> &T,
    {
        // SAFETY: Forwarding the cast requirements to the caller.
        unsafe { Self::adopt_with(TypedHolder::from_box(value), cast) }
    }

    /// Releases this handle's ownership and takes ownership of a pointer of a related type
    /// obtained from [`Box::into_raw()`], observing it through `T`.
    ///
    /// The old ownership is released first, so if this handle was its last owner, the old
    /// pointee is dropped before the new family exists. A null pointer leaves the handle empty.
    /// Otherwise the handle starts a new ownership family with a count of 1 that remembers `U`
    /// as the concrete pointee type.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have been obtained from [`Box::into_raw()`] and must not be owned
    /// by anything else afterwards. In particular, two ownership families must never be
    /// created over the same pointer, as both would drop the pointee.
    ///
    /// The caller must guarantee that the callback input and output references point to the
    /// same object.
    ///
    /// If `T` is `Send` or `Sync`, the caller must guarantee that `U` is too.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Display;
    ///
    /// use shared_handle::{Shared, dynamic_cast};
    ///
    /// let old: Box<dyn Display> = Box::new("old");
    /// let mut display = Shared::from_box(old);
    ///
    /// // SAFETY: The pointer came from `Box::into_raw()`, nothing else owns it and an
    /// // unsizing coercion returns a reference to the same object.
    /// unsafe {
    ///     display.reset_raw_with(Box::into_raw(Box::new(9_u8)), |x| x as &dyn Display);
    /// }
    ///
    /// assert_eq!(display.to_string(), "9");
    /// assert_eq!(*dynamic_cast::<u8, _>(&display), 9);
    /// ```
    pub unsafe fn reset_raw_with<U, F>(&mut self, ptr: *mut U, cast: F)
    where
        U: ?Sized + 'static,
        F: FnOnce(&U) -> &T,
    {
        self.reset();

        if ptr.is_null() {
            return;
        }

        // SAFETY: Forwarding the ownership requirements to the caller.
        let holder = unsafe { TypedHolder::from_raw(ptr) };

        // SAFETY: Forwarding the cast requirements to the caller.
        *self = unsafe { Self::adopt_with(holder, cast) };
    }

    /// Starts a new ownership family for the pointee of `holder`, observed through `cast`.
    ///
    /// # Safety
    ///
    /// The callback input and output references must point to the same object.
    unsafe fn adopt_with<U, F>(holder: TypedHolder<U>, cast: F) -> Self
    where
        U: ?Sized + 'static,
        F: FnOnce(&U) -> &T,
    {
        let view = holder.ptr().map(|ptr| {
            // SAFETY: The holder has just taken ownership of the pointee, so it is alive
            // and there are no exclusive references to it.
            let value = unsafe { ptr.as_ref() };

            NonNull::from(cast(value))
        });

        Self::adopt(Box::new(holder), view)
    }

    /// Starts a new ownership family with a count of 1.
    fn adopt(holder: Box<dyn Holder>, view: Option<NonNull<T>>) -> Self {
        let control = ControlBlock::allocate(holder.clone_holder());

        Self {
            holder: Some(holder),
            control: Some(control),
            view,
            _owns: PhantomData,
        }
    }

    /// Whether the handle belongs to no ownership family.
    ///
    /// A dead handle (e.g. created from a null pointer) is not empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.control.is_none()
    }

    /// Whether the handle belongs to an ownership family and can observe the pointee.
    ///
    /// This is the condition under which the handle can be dereferenced.
    #[must_use]
    #[inline]
    pub fn is_live(&self) -> bool {
        self.holder.as_ref().is_some_and(|holder| holder.is_live())
    }

    /// Whether the handle would compare equal to a null pointer, i.e. it is empty or dead.
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        !self.is_live()
    }

    /// Get a pointer to the pointee without affecting ownership.
    ///
    /// Returns `None` if the handle is empty or dead.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> Option<NonNull<T>> {
        self.view
    }

    /// Borrows the pointee, returning `None` if the handle is empty or dead.
    #[must_use]
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: A view is only present while this handle co-owns the pointee, so the pointee
        // is alive for at least as long as `self` is borrowed. Only shared references to the
        // pointee are ever created.
        self.view.map(|view| unsafe { view.as_ref() })
    }

    /// The number of handles co-owning the pointee, including this one.
    ///
    /// Returns 0 for an empty handle. The value may be stale by the time the caller looks at
    /// it if other threads are cloning or dropping handles of the same family.
    #[must_use]
    pub fn shared_count(&self) -> usize {
        self.control.map_or(0, |control| {
            // SAFETY: A non-empty handle owns a reference to its control block.
            unsafe { ControlBlock::count(control) }
        })
    }

    /// Whether both handles observe the same live pointee, regardless of their static types.
    ///
    /// Unlike `==`, this is `false` if either handle is empty or dead. Zero-sized pointees
    /// all live at the same address, so they are reported as the same pointee.
    #[must_use]
    pub fn same_pointee<U: ?Sized>(&self, other: &Shared<U>) -> bool {
        match (&self.holder, &other.holder) {
            (Some(ours), Some(theirs)) => ours.identity_equals(&**theirs),
            _ => false,
        }
    }

    /// Releases this handle's ownership, leaving the handle empty.
    ///
    /// If this was the last owner, the pointee is dropped before this returns.
    pub fn reset(&mut self) {
        self.view = None;
        self.holder = None;

        if let Some(control) = self.control.take() {
            // SAFETY: A non-empty handle owns a reference to its control block and we have
            // just forgotten it, so it cannot be used again.
            unsafe {
                ControlBlock::release(control);
            }
        }
    }

    /// Moves the ownership out of this handle into a new one, leaving this handle empty.
    ///
    /// The owner count does not change.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shared_handle::Shared;
    ///
    /// let mut source = Shared::new(1_u64);
    /// let destination = source.take();
    ///
    /// assert!(source.is_empty());
    /// assert_eq!(*destination, 1);
    /// assert_eq!(destination.shared_count(), 1);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Converts this handle into one that observes the pointee through a different type.
    ///
    /// The ownership moves into the new handle, so the owner count does not change.
    ///
    /// This method is only intended for use by the [`define_shared_dyn_cast!`][crate::define_shared_dyn_cast]
    /// macro, which generates safe wrappers for trait object casts.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that the callback input and output references point to the
    /// same object.
    ///
    /// If `U` is `Send` or `Sync`, the caller must guarantee that the concrete pointee type
    /// is too.
    #[must_use]
    pub unsafe fn into_cast_with<U: ?Sized, F>(self, cast: F) -> Shared<U>
    where
        F: FnOnce(&T) -> &U,
    {
        let view = self.get().map(|value| NonNull::from(cast(value)));

        let (holder, control) = self.into_parts();

        Shared {
            holder,
            control,
            view,
            _owns: PhantomData,
        }
    }

    /// Creates another member of this handle's family that observes the pointee via `view`.
    ///
    /// Returns an empty handle if this handle is empty.
    ///
    /// # Safety
    ///
    /// If `view` is `Some`, it must point to this family's pointee (or a part of it) and be
    /// valid for shared access as `U` for as long as the pointee lives.
    #[must_use]
    pub(crate) unsafe fn share_as<U: ?Sized>(&self, view: Option<NonNull<U>>) -> Shared<U> {
        let (Some(holder), Some(control)) = (&self.holder, self.control) else {
            return Shared::empty();
        };

        // SAFETY: We own a reference to the block, keeping it alive.
        unsafe {
            ControlBlock::acquire(control);
        }

        Shared {
            holder: Some(holder.clone_holder()),
            control: Some(control),
            view,
            _owns: PhantomData,
        }
    }

    /// Creates another member of this handle's family that cannot observe the pointee.
    ///
    /// Returns an empty handle if this handle is empty.
    #[must_use]
    pub(crate) fn share_dead<U: 'static>(&self) -> Shared<U> {
        let Some(control) = self.control else {
            return Shared::empty();
        };

        // SAFETY: We own a reference to the block, keeping it alive.
        unsafe {
            ControlBlock::acquire(control);
        }

        Shared {
            holder: Some(Box::new(TypedHolder::<U>::dead())),
            control: Some(control),
            view: None,
            _owns: PhantomData,
        }
    }

    /// The type-erased holder of this handle, if it is not empty.
    #[must_use]
    pub(crate) fn holder(&self) -> Option<&dyn Holder> {
        self.holder.as_deref()
    }

    /// Disassembles the handle without releasing its ownership.
    fn into_parts(self) -> (Option<Box<dyn Holder>>, Option<NonNull<ControlBlock>>) {
        let mut this = ManuallyDrop::new(self);

        (this.holder.take(), this.control.take())
    }
}

impl<T: ?Sized + 'static> Shared<T> {
    /// Takes ownership of a boxed value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Debug;
    ///
    /// use shared_handle::Shared;
    ///
    /// let boxed: Box<dyn Debug> = Box::new(vec![1, 2, 3]);
    /// let handle = Shared::from_box(boxed);
    ///
    /// assert_eq!(format!("{:?}", &*handle), "[1, 2, 3]");
    /// ```
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let holder = TypedHolder::from_box(value);
        let view = holder.ptr();

        Self::adopt(Box::new(holder), view)
    }

    /// Takes ownership of a pointer obtained from [`Box::into_raw()`].
    ///
    /// A null pointer creates a dead handle: it owns a control block of its own but does not
    /// observe any pointee.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have been obtained from [`Box::into_raw()`] and must not be owned
    /// by anything else afterwards. In particular, two ownership families must never be
    /// created over the same pointer, as both would drop the pointee.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shared_handle::Shared;
    ///
    /// let raw = Box::into_raw(Box::new(7_i64));
    ///
    /// // SAFETY: The pointer came from `Box::into_raw()` and nothing else owns it.
    /// let handle = unsafe { Shared::from_raw(raw) };
    /// assert_eq!(handle.ptr().map(|p| p.as_ptr()), Some(raw));
    ///
    /// // SAFETY: Null is always acceptable.
    /// let dead = unsafe { Shared::<i64>::from_raw(std::ptr::null_mut()) };
    /// assert!(!dead.is_empty());
    /// assert!(!dead.is_live());
    /// ```
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // SAFETY: Forwarding the safety requirements to the caller.
        let holder = unsafe { TypedHolder::from_raw(ptr) };
        let view = holder.ptr();

        Self::adopt(Box::new(holder), view)
    }

    /// Releases this handle's ownership and takes ownership of a pointer obtained from
    /// [`Box::into_raw()`].
    ///
    /// A null pointer leaves the handle empty. Otherwise the handle starts a new ownership
    /// family that shares nothing with any other handle.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw()`][Self::from_raw].
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        self.reset();

        if !ptr.is_null() {
            // SAFETY: Forwarding the safety requirements to the caller.
            *self = unsafe { Self::from_raw(ptr) };
        }
    }
}

impl<T: 'static> Shared<T> {
    /// Moves a value to the heap and creates the first handle to it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shared_handle::Shared;
    ///
    /// let handle = Shared::new(42_u32);
    ///
    /// assert!(handle.is_live());
    /// assert_eq!(*handle, 42);
    /// assert_eq!(handle.shared_count(), 1);
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Releases this handle's ownership and starts a new ownership family for `value`.
    pub fn reset_with(&mut self, value: T) {
        self.reset();
        *self = Self::new(value);
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    /// Creates another handle co-owning the same pointee, incrementing the owner count.
    ///
    /// Cloning an empty handle creates another empty handle.
    fn clone(&self) -> Self {
        // SAFETY: Our own view points to our own pointee.
        unsafe { self.share_as(self.view) }
    }

    /// Releases this handle's ownership, then co-owns the pointee of `source`.
    ///
    /// If both handles already belong to the same family, the owner count does not change.
    fn clone_from(&mut self, source: &Self) {
        if self.control.is_some() && self.control == source.control {
            self.holder = source.holder.as_ref().map(|holder| holder.clone_holder());
            self.view = source.view;
            return;
        }

        self.reset();
        *self = source.clone();
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// Borrows the pointee.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty or dead.
    fn deref(&self) -> &Self::Target {
        self.get().expect(ERR_DEREF_NULL)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Shared<U>> for Shared<T> {
    /// Two handles are equal if both are empty or dead, or if they belong to the same
    /// ownership family. The static types of the handles do not matter.
    fn eq(&self, other: &Shared<U>) -> bool {
        if self.is_null() && other.is_null() {
            return true;
        }

        self.control == other.control
    }
}

impl<T: 'static> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + 'static> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<T: ?Sized> fmt::Debug for Shared<T> {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("live", &self.is_live())
            .field("shared_count", &self.shared_count())
            .field("holder", &self.holder)
            .finish()
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Shared<T> {
    /// Formats the pointee, or `null` if the handle is empty or dead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

// SAFETY: The pointee may be dropped on whichever thread drops the last handle, which requires
// `T: Send`, and handles on different threads hand out shared references to it, which requires
// `T: Sync`. Every way to create a handle ensures that the concrete pointee type is as
// thread-safe as `T`. The owner count itself is atomic.
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T> {}

// SAFETY: See above. A shared reference to a handle only grants shared access to the pointee
// and the ability to clone, which only touches the atomic owner count.
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T> {}
