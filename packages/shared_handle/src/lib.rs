#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! This package provides [`Shared`], a shared-ownership smart pointer whose handles can
//! observe one object through different static types while sharing one owner count.
//!
//! # Features
//!
//! - **Shared ownership**: Any number of handles co-own an object, which is dropped exactly
//!   once, when the last handle is dropped.
//! - **Atomic owner count**: Handles of one object can be cloned and dropped on different
//!   threads at the same time.
//! - **Type-erased storage**: Each ownership family remembers the concrete type its object was
//!   created with, independent of the static type of the handles.
//! - **Upcasts**: Convert a `Shared<T>` into a `Shared<dyn Trait>` with
//!   [`define_shared_dyn_cast!`] or [`static_cast_with()`].
//! - **Checked downcasts**: Recover the concrete type with [`dynamic_cast()`] or
//!   [`try_dynamic_cast()`], with a configurable [`CastPolicy`] for failed casts.
//! - **Stable Rust**: No unstable Rust features required.
//!
//! # Example
//!
//! ```rust
//! use shared_handle::{Shared, define_shared_dyn_cast, dynamic_cast};
//!
//! trait Animal {
//!     fn name(&self) -> &str;
//! }
//!
//! struct Cat;
//!
//! impl Animal for Cat {
//!     fn name(&self) -> &str {
//!         "cat"
//!     }
//! }
//!
//! struct Dog;
//!
//! impl Animal for Dog {
//!     fn name(&self) -> &str {
//!         "dog"
//!     }
//! }
//!
//! define_shared_dyn_cast!(Animal);
//!
//! let cat = Shared::new(Cat);
//! let animal: Shared<dyn Animal> = cat.clone().cast_animal();
//!
//! assert_eq!(animal.name(), "cat");
//! assert_eq!(cat.shared_count(), 2);
//! assert!(animal == cat);
//!
//! // Downcasts check the type the object was created with.
//! let back = dynamic_cast::<Cat, _>(&animal);
//! assert!(back.is_live());
//!
//! // A failed downcast yields a handle that cannot be dereferenced.
//! let not_a_dog = dynamic_cast::<Dog, _>(&animal);
//! assert!(!not_a_dog.is_live());
//! ```

mod cast;
mod cast_policy;
mod constants;
mod control;
mod count;
mod error;
mod handle;
mod holder;

pub use cast::*;
pub use cast_policy::*;
pub(crate) use control::*;
pub(crate) use count::*;
pub use error::CastError;
pub use handle::*;
pub(crate) use holder::*;

#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
}
