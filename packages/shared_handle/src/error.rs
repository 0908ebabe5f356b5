use thiserror::Error;

/// Errors that can occur when attempting a checked downcast with
/// [`try_dynamic_cast()`][crate::try_dynamic_cast].
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum CastError {
    /// The pointee is of a different concrete type than the one requested.
    #[error("cannot cast pointee of type '{actual}' to '{expected}'")]
    TypeMismatch {
        /// Name of the type the caller asked for.
        expected: &'static str,

        /// Name of the concrete type the pointee was created with.
        actual: &'static str,
    },

    /// The handle is empty or does not observe a pointee, so there is nothing to cast.
    #[error("cannot cast a handle that is empty or dead")]
    Dead,
}

/// A specialized `Result` type for cast operations, returning the crate's
/// [`CastError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, CastError>;
