/// Determines what a failed [`dynamic_cast_with_policy()`][crate::dynamic_cast_with_policy]
/// returns.
///
/// By default, a failed cast still produces a co-owner of the source's ownership family,
/// one that cannot observe the pointee.
///
/// # Examples
///
/// ```
/// use shared_handle::{CastPolicy, Shared, dynamic_cast_with_policy};
///
/// let number = Shared::new(42_u32);
///
/// let retained = dynamic_cast_with_policy::<String, _>(&number, CastPolicy::RetainOwnership);
/// assert!(!retained.is_live());
/// assert!(!retained.is_empty());
/// assert_eq!(number.shared_count(), 2);
///
/// let released = dynamic_cast_with_policy::<String, _>(&number, CastPolicy::ReleaseOwnership);
/// assert!(released.is_empty());
/// assert_eq!(number.shared_count(), 2);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum CastPolicy {
    /// A failed cast returns a dead handle that still counts as an owner of the source's
    /// pointee. Dropping it releases that ownership like any other handle. This is the default.
    #[default]
    RetainOwnership,

    /// A failed cast returns an empty handle and the owner count is left untouched.
    ///
    /// This matches the behavior of downcasts of the standard library smart pointers.
    ReleaseOwnership,
}
