//! # stablecell: lazily-initialized, set-at-most-once values.
//!
//! A stable value is a container with two possible states:
//! * unset: reads see nothing.
//! * set: reads see the same value forever.
//!
//! Values are published either directly (`try_set`, `set_or_fail`) or by
//! running a generator on first use (`get_or_compute`). Publishing never
//! needs a mutable reference, so holders can be shared first and filled in
//! later, from any thread. Once a value is set, reads are lock-free and cost
//! one atomic load.
//!
//! The crate provides:
//! * [`StableValue`] and [`StableBox`]: a single slot.
//! * [`StableArray`]: a fixed number of slots addressed by index.
//! * [`StableMap`] and [`StableEnumMap`]: a slot per key of a fixed key set.
//! * [`StableNdArray`]: a fixed multi-dimensional grid of slots.
//! * [`StableSupplier`], [`StableFunction`], [`StableEnumFunction`] and
//!   [`StableIntFunction`]: a holder bound to its generator, so that callers
//!   just ask for values.
//! * [`FieldUpdater`]: the same protocol applied in place to an atomic field
//!   of an ordinary struct.
//!
//! Every generator runs at most once per slot, even when many threads ask
//! at once. A generator that fails or panics leaves the slot unset, and the
//! next caller tries again. A generator that asks for its own slot gets
//! [`StableError::RecursiveInitialization`] instead of a deadlock.
//!
//! # Examples
//!
//! This example shares a table of lazily computed values between threads.
//!
//! ```
//! use stablecell::StableFunction;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let squares = Arc::new(StableFunction::new([2u64, 3, 4], |n: &u64| n * n).unwrap());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let squares = squares.clone();
//!         thread::spawn(move || squares.apply(&3u64).copied())
//!     })
//!     .collect();
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), Ok(9));
//! }
//!
//! // 5 is outside the domain the function was built with.
//! assert!(squares.apply(&5u64).is_err());
//! assert_eq!(format!("{squares:?}"), "StableFunction({2: .unset, 3: 9, 4: .unset})");
//! ```

mod array;
mod boxslot;
mod enummap;
mod error;
mod field;
mod function;
mod lock;
mod map;
mod ndarray;
mod ordering;
mod publish;
mod render;
mod slot;
mod slots;
mod value;

pub use array::StableArray;
pub use boxslot::BoxSlot;
pub use enummap::{Ordinal, StableEnumMap, MAX_ORDINAL_SPAN};
pub use error::{BindError, StableError};
pub use field::{FieldHolder, FieldInfo, FieldKind, FieldType, FieldUpdater, LazyField, Monitor};
pub use function::{StableEnumFunction, StableFunction, StableIntFunction, StableSupplier};
pub use map::StableMap;
pub use ndarray::{Shape, StableNdArray};
pub use slot::{InlineSlot, SlotStorage};
pub use slots::Element;
pub use value::{StableBox, StableValue};
