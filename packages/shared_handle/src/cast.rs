//! Conversions between handles that observe one pointee through different types.
//!
//! Every function here borrows its source and returns a new co-owner of the same ownership
//! family, leaving the source untouched. To convert without creating another owner, use
//! [`Shared::into_cast_with()`] or the methods generated by [`define_shared_dyn_cast!`].

use std::any::{TypeId, type_name};
use std::ptr::NonNull;

use tracing::debug;

use crate::error::Result;
use crate::{CastError, CastPolicy, Shared};

/// Creates a co-owner that observes the pointee as `U`, without any runtime check.
///
/// The new handle shares the owner count with `handle`. An empty handle yields an empty
/// handle and a dead handle yields a dead one.
///
/// # Safety
///
/// The caller must guarantee that the pointee is a valid `U`: same size or larger, compatible
/// alignment and a compatible bit pattern for every field of `U`.
///
/// If `U` is `Send` or `Sync`, the caller must guarantee that the concrete pointee type is too.
///
/// # Example
///
/// ```rust
/// use shared_handle::{Shared, static_cast};
///
/// #[repr(transparent)]
/// struct Meters(f64);
///
/// let meters = Shared::new(Meters(3.5));
///
/// // SAFETY: `Meters` is a transparent wrapper around `f64`.
/// let raw = unsafe { static_cast::<f64, _>(&meters) };
///
/// assert_eq!(*raw, 3.5);
/// assert_eq!(meters.shared_count(), 2);
/// ```
#[must_use]
pub unsafe fn static_cast<U, T>(handle: &Shared<T>) -> Shared<U> {
    let view = handle.ptr().map(NonNull::cast::<U>);

    // SAFETY: The view points to the family's pointee and the caller guarantees it is a `U`.
    unsafe { handle.share_as(view) }
}

/// Creates a co-owner that observes the pointee through the reference returned by `cast`.
///
/// This is the borrowing counterpart of [`Shared::into_cast_with()`], typically used to upcast
/// to a trait object. `cast` is not called if the handle is empty or dead.
///
/// # Safety
///
/// The caller must guarantee that the callback input and output references point to the
/// same object.
///
/// If `U` is `Send` or `Sync`, the caller must guarantee that the concrete pointee type is too.
///
/// # Example
///
/// ```rust
/// use std::fmt::Display;
///
/// use shared_handle::{Shared, static_cast_with};
///
/// let number = Shared::new(12_u32);
///
/// // SAFETY: Unsizing coercion returns a reference to the same object.
/// let display = unsafe { static_cast_with(&number, |x| x as &dyn Display) };
///
/// assert_eq!(display.to_string(), "12");
/// assert!(display == number);
/// ```
#[must_use]
pub unsafe fn static_cast_with<U, T, F>(handle: &Shared<T>, cast: F) -> Shared<U>
where
    U: ?Sized,
    T: ?Sized,
    F: FnOnce(&T) -> &U,
{
    let view = handle.get().map(|value| NonNull::from(cast(value)));

    // SAFETY: The caller guarantees that the view points to the family's pointee.
    unsafe { handle.share_as(view) }
}

/// Creates a co-owner that observes the pointee as its concrete type `U`, if it is one.
///
/// The check is made against the type the pointee was created with, not against the static
/// type of `handle`. This makes it possible to recover a `Shared<Circle>` from a
/// `Shared<dyn Shape>` that was created by upcasting a `Shared<Circle>`.
///
/// If the check fails, the result is a dead handle that still co-owns the pointee: the owner
/// count is incremented and dropping the result decrements it again. Use
/// [`dynamic_cast_with_policy()`] or [`try_dynamic_cast()`] to avoid taking ownership on
/// failure.
///
/// # Example
///
/// ```rust
/// use std::fmt::Display;
///
/// use shared_handle::{Shared, dynamic_cast, static_cast_with};
///
/// let text = Shared::new("hi".to_string());
/// // SAFETY: Unsizing coercion returns a reference to the same object.
/// let display = unsafe { static_cast_with(&text, |x| x as &dyn Display) };
///
/// let back = dynamic_cast::<String, _>(&display);
/// assert!(back.is_live());
/// assert!(back == text);
///
/// let wrong = dynamic_cast::<u32, _>(&display);
/// assert!(!wrong.is_live());
/// assert_eq!(text.shared_count(), 4);
/// ```
#[must_use]
pub fn dynamic_cast<U, T>(handle: &Shared<T>) -> Shared<U>
where
    U: 'static,
    T: ?Sized,
{
    dynamic_cast_with_policy(handle, CastPolicy::default())
}

/// Same as [`dynamic_cast()`] but with the failure behavior defined by `policy`.
#[must_use]
pub fn dynamic_cast_with_policy<U, T>(handle: &Shared<T>, policy: CastPolicy) -> Shared<U>
where
    U: 'static,
    T: ?Sized,
{
    match try_dynamic_cast(handle) {
        Ok(cast) => cast,
        Err(error) => {
            debug!(%error, ?policy, "dynamic cast failed");

            match policy {
                CastPolicy::RetainOwnership => handle.share_dead(),
                CastPolicy::ReleaseOwnership => Shared::empty(),
            }
        }
    }
}

/// Creates a co-owner that observes the pointee as its concrete type `U`, or explains why
/// that is not possible.
///
/// No ownership is taken if the cast fails.
///
/// # Errors
///
/// Returns [`CastError::Dead`] if the handle is empty or dead and
/// [`CastError::TypeMismatch`] if the pointee was not created as a `U`.
///
/// # Example
///
/// ```rust
/// use shared_handle::{CastError, Shared, try_dynamic_cast};
///
/// let number = Shared::new(1_i16);
///
/// assert!(try_dynamic_cast::<i16, _>(&number).is_ok());
/// assert!(matches!(
///     try_dynamic_cast::<i32, _>(&number),
///     Err(CastError::TypeMismatch { .. })
/// ));
/// assert_eq!(number.shared_count(), 1);
/// ```
pub fn try_dynamic_cast<U, T>(handle: &Shared<T>) -> Result<Shared<U>>
where
    U: 'static,
    T: ?Sized,
{
    let holder = handle
        .holder()
        .filter(|holder| holder.is_live())
        .ok_or(CastError::Dead)?;

    if holder.pointee_type() != TypeId::of::<U>() {
        return Err(CastError::TypeMismatch {
            expected: type_name::<U>(),
            actual: holder.pointee_type_name(),
        });
    }

    let view = holder.address().map(NonNull::cast::<U>);

    // SAFETY: The holder was created for a pointee of type `U`, checked above, and its
    // address points to that pointee.
    Ok(unsafe { handle.share_as(view) })
}

/// Generates a safe conversion from `Shared<T>` to `Shared<dyn Trait>` for any `T: Trait`.
///
/// The macro defines a trait named `SharedCast<Trait>` with one method `cast_<trait>()`,
/// implemented for every `Shared<T>` whose `T` implements the trait. The method consumes the
/// handle, so the owner count does not change.
///
/// The concrete type of the pointee is remembered, so the result can be converted back with
/// [`dynamic_cast()`].
///
/// # Example
///
/// ```rust
/// use std::fmt::Display;
///
/// use shared_handle::{Shared, define_shared_dyn_cast, dynamic_cast};
///
/// define_shared_dyn_cast!(Display);
///
/// let number = Shared::new(77_u8);
/// let display: Shared<dyn Display> = number.cast_display();
///
/// assert_eq!(display.to_string(), "77");
/// assert_eq!(*dynamic_cast::<u8, _>(&display), 77);
/// ```
#[macro_export]
macro_rules! define_shared_dyn_cast {
    ($trait_name:ident) => {
        $crate::__private::paste! {
            #[doc = "Converts a `Shared<T>` into a `Shared<dyn " $trait_name ">`."]
            trait [<SharedCast $trait_name>] {
                #[doc = "Converts the handle into one that observes the pointee as `dyn " $trait_name "`."]
                fn [<cast_ $trait_name:snake>](self) -> $crate::Shared<dyn $trait_name>;
            }

            impl<T: $trait_name + 'static> [<SharedCast $trait_name>] for $crate::Shared<T> {
                fn [<cast_ $trait_name:snake>](self) -> $crate::Shared<dyn $trait_name> {
                    // SAFETY: An unsizing coercion returns a reference to the same object and
                    // `dyn Trait` is only `Send`/`Sync` if `T` is.
                    unsafe { self.into_cast_with(|value| value as &dyn $trait_name) }
                }
            }
        }
    };
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Display;

    use testing::DropTracker;

    use super::*;

    trait Shape {
        fn area(&self) -> f64;
    }

    struct Square(f64);

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.0 * self.0
        }
    }

    struct Circle;

    impl Shape for Circle {
        fn area(&self) -> f64 {
            3.0
        }
    }

    define_shared_dyn_cast!(Shape);

    #[test]
    fn upcast_then_downcast_round_trips() {
        let square = Shared::new(Square(2.0));

        // SAFETY: Unsizing coercion returns a reference to the same object.
        let shape = unsafe { static_cast_with(&square, |x| x as &dyn Shape) };
        assert!((shape.area() - 4.0).abs() < f64::EPSILON);

        let back = dynamic_cast::<Square, _>(&shape);

        assert!(back.is_live());
        assert!(back == square);
        assert!(back.same_pointee(&square));
        assert_eq!(square.shared_count(), 3);
    }

    #[test]
    fn failed_downcast_is_dead_but_counted() {
        let tracker = DropTracker::new();
        let square = Shared::new(tracker.track(Square(1.0)));

        let wrong = dynamic_cast::<Circle, _>(&square);

        assert!(!wrong.is_live());
        assert!(wrong.is_null());
        assert!(!wrong.is_empty());
        assert!(wrong.get().is_none());
        assert_eq!(square.shared_count(), 2);

        drop(wrong);
        assert_eq!(square.shared_count(), 1);
        assert_eq!(tracker.drops(), 0);

        drop(square);
        assert_eq!(tracker.drops(), 1);
    }

    #[test]
    fn failed_downcast_outliving_source_still_destroys_pointee() {
        let tracker = DropTracker::new();
        let square = Shared::new(tracker.track(Square(1.0)));

        let wrong = dynamic_cast::<Circle, _>(&square);
        drop(square);

        assert_eq!(tracker.drops(), 0);

        drop(wrong);
        assert_eq!(tracker.drops(), 1);
    }

    #[test]
    fn release_policy_returns_empty() {
        let square = Shared::new(Square(1.0));

        let wrong = dynamic_cast_with_policy::<Circle, _>(&square, CastPolicy::ReleaseOwnership);

        assert!(wrong.is_empty());
        assert_eq!(square.shared_count(), 1);
    }

    #[test]
    fn release_policy_success_shares_ownership() {
        let square = Shared::new(Square(1.0));

        let same = dynamic_cast_with_policy::<Square, _>(&square, CastPolicy::ReleaseOwnership);

        assert!(same.is_live());
        assert_eq!(square.shared_count(), 2);
    }

    #[test]
    fn downcast_of_empty_is_empty() {
        let empty = Shared::<dyn Shape>::empty();

        let cast = dynamic_cast::<Square, _>(&empty);

        assert!(cast.is_empty());
    }

    #[test]
    fn downcast_of_dead_is_dead() {
        // SAFETY: Null is always acceptable.
        let dead = unsafe { Shared::<Square>::from_raw(std::ptr::null_mut()) };

        let cast = dynamic_cast::<Square, _>(&dead);

        assert!(!cast.is_empty());
        assert!(!cast.is_live());
        assert_eq!(dead.shared_count(), 2);
    }

    #[test]
    fn try_downcast_reports_reason() {
        let square = Shared::new(Square(1.0));

        let mismatch = try_dynamic_cast::<Circle, _>(&square).unwrap_err();
        assert_eq!(
            mismatch,
            CastError::TypeMismatch {
                expected: type_name::<Circle>(),
                actual: type_name::<Square>(),
            }
        );

        let empty = Shared::<Square>::empty();
        assert_eq!(
            try_dynamic_cast::<Square, _>(&empty).unwrap_err(),
            CastError::Dead
        );

        assert_eq!(square.shared_count(), 1);
    }

    #[test]
    fn downcast_of_boxed_trait_object_fails() {
        // The concrete type of this pointee is `dyn Shape` itself, `Square` is unknown.
        let boxed: Box<dyn Shape> = Box::new(Square(1.0));
        let shape = Shared::from_box(boxed);

        let cast = dynamic_cast::<Square, _>(&shape);

        assert!(!cast.is_live());
    }

    #[test]
    fn static_cast_reinterprets() {
        #[repr(transparent)]
        struct Wrapper(u64);

        let wrapper = Shared::new(Wrapper(17));

        // SAFETY: `Wrapper` is a transparent wrapper around `u64`.
        let inner = unsafe { static_cast::<u64, _>(&wrapper) };

        assert_eq!(*inner, 17);
        assert!(inner == wrapper);
        assert_eq!(wrapper.shared_count(), 2);
    }

    #[test]
    fn static_cast_of_empty_is_empty() {
        let empty = Shared::<u64>::empty();

        // SAFETY: There is no pointee to reinterpret.
        let cast = unsafe { static_cast::<i64, _>(&empty) };

        assert!(cast.is_empty());
    }

    #[test]
    fn macro_cast_moves_ownership() {
        let square = Shared::new(Square(3.0));
        let witness = square.clone();

        let shape = square.cast_shape();

        assert!((shape.area() - 9.0).abs() < f64::EPSILON);
        assert_eq!(witness.shared_count(), 2);
        assert!(shape == witness);
    }

    #[test]
    fn mixed_shapes_downcast_selectively() {
        let shapes: Vec<Shared<dyn Shape>> = vec![
            Shared::new(Square(1.0)).cast_shape(),
            Shared::new(Circle).cast_shape(),
        ];

        let squares = shapes
            .iter()
            .map(|shape| try_dynamic_cast::<Square, _>(shape))
            .filter(std::result::Result::is_ok)
            .count();

        assert_eq!(squares, 1);
    }

    #[test]
    fn static_cast_with_to_display() {
        let number = Shared::new(5_u16);

        // SAFETY: Unsizing coercion returns a reference to the same object.
        let display = unsafe { static_cast_with(&number, |x| x as &dyn Display) };

        assert_eq!(display.to_string(), "5");
        assert_eq!(number.shared_count(), 2);
    }
}
