//! Lazy fields updated in place.
//!
//! A [`FieldUpdater`] applies the publish protocol directly to an atomic
//! field of a caller-owned struct instead of wrapping the value in a
//! separate holder. The field is located by name and byte offset, recorded
//! once per struct type by the [`field_holder!`](crate::field_holder) macro,
//! and validated when the updater is bound.
//!
//! The field's "unset" state is its natural zero: `0` for integer fields and
//! `None` for reference fields. A computed integer that happens to be `0` is
//! stored as the updater's zero replacement instead, so zero stays
//! unambiguous.
//!
//! There is no lock per field. Writers synchronize on the owning object's
//! [`Monitor`], which is reentrant so that a generator may resolve *other*
//! lazy fields of the same object.
//!
//! # Examples
//! ```
//! use std::sync::atomic::AtomicI32;
//! use stablecell::{field_holder, FieldUpdater, Monitor};
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//!     hash: AtomicI32,
//!     monitor: Monitor,
//! }
//!
//! field_holder!(Point { monitor: monitor, fields: [x, y, hash] });
//!
//! let hash = FieldUpdater::of_int("hash", |p: &Point| p.x * 31 + p.y, 1).unwrap();
//! let p = Point { x: 2, y: 3, hash: AtomicI32::new(0), monitor: Monitor::new() };
//! assert_eq!(hash.get(&p), Ok(65));
//!
//! // `x` is a plain field, so it can't be updated in place.
//! assert!(FieldUpdater::of_int("x", |p: &Point| p.y, 1).is_err());
//! ```

use core::any::{type_name, TypeId};
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicI32, AtomicI64};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{BindError, StableError};
use crate::ordering;

/// Logical type of a lazily updatable field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Long,
    Reference,
}

/// A type that can appear as a field of a [`FieldHolder`].
///
/// Atomic types are the mutable forms; the matching plain types are
/// recorded too, so that binding to them fails with a precise error.
pub trait FieldType: 'static {
    const KIND: FieldKind;
    const MUTABLE: bool;
}

impl FieldType for AtomicI32 {
    const KIND: FieldKind = FieldKind::Int;
    const MUTABLE: bool = true;
}

impl FieldType for i32 {
    const KIND: FieldKind = FieldKind::Int;
    const MUTABLE: bool = false;
}

impl FieldType for AtomicI64 {
    const KIND: FieldKind = FieldKind::Long;
    const MUTABLE: bool = true;
}

impl FieldType for i64 {
    const KIND: FieldKind = FieldKind::Long;
    const MUTABLE: bool = false;
}

impl<V: 'static> FieldType for ArcSwapOption<V> {
    const KIND: FieldKind = FieldKind::Reference;
    const MUTABLE: bool = true;
}

impl<V: 'static> FieldType for Option<Arc<V>> {
    const KIND: FieldKind = FieldKind::Reference;
    const MUTABLE: bool = false;
}

impl<V: 'static> FieldType for Arc<V> {
    const KIND: FieldKind = FieldKind::Reference;
    const MUTABLE: bool = false;
}

/// Where one field lives inside its holder, and what it is.
#[derive(Clone, Debug)]
pub struct FieldInfo {
    name: &'static str,
    offset: usize,
    type_id: TypeId,
    type_name: &'static str,
    kind: FieldKind,
    mutable: bool,
}

impl FieldInfo {
    /// Describe field `name` at byte `offset`. `accessor` only pins down the
    /// field's type; it is never called.
    ///
    /// Use [`field_holder!`](crate::field_holder) rather than calling this
    /// directly.
    pub fn of<H, F, A>(name: &'static str, offset: usize, _accessor: A) -> Self
    where
        F: FieldType,
        A: Fn(&H) -> &F,
    {
        Self {
            name,
            offset,
            type_id: TypeId::of::<F>(),
            type_name: type_name::<F>(),
            kind: F::KIND,
            mutable: F::MUTABLE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

/// A struct whose fields can be updated in place by a [`FieldUpdater`].
///
/// # Safety
///
/// Every [`FieldInfo`] returned by `fields` must describe a real field of
/// `Self`: its offset must be the field's byte offset and its type must be
/// the field's type. The [`field_holder!`](crate::field_holder) macro
/// derives both from the field itself.
pub unsafe trait FieldHolder: Sized {
    fn fields() -> Vec<FieldInfo>;

    /// The object's monitor, shared by all of its lazy fields.
    fn monitor(&self) -> &Monitor;
}

/// Implement [`FieldHolder`] for a struct.
///
/// ```
/// # use std::sync::atomic::AtomicI64;
/// # use stablecell::{field_holder, Monitor};
/// struct Account {
///     id: i64,
///     balance: AtomicI64,
///     lock: Monitor,
/// }
///
/// field_holder!(Account { monitor: lock, fields: [id, balance] });
/// ```
#[macro_export]
macro_rules! field_holder {
    ($holder:ty { monitor: $monitor:ident, fields: [$($field:ident),* $(,)?] $(,)? }) => {
        // SAFETY: offsets and types are both taken from the named fields.
        unsafe impl $crate::FieldHolder for $holder {
            fn fields() -> ::std::vec::Vec<$crate::FieldInfo> {
                ::std::vec![$(
                    $crate::FieldInfo::of(
                        ::core::stringify!($field),
                        ::core::mem::offset_of!($holder, $field),
                        |holder: &$holder| &holder.$field,
                    )
                ),*]
            }

            fn monitor(&self) -> &$crate::Monitor {
                &self.$monitor
            }
        }
    };
}

/// Per-object lock for in-place field updates.
///
/// Reentrant: a thread already inside the monitor may enter again to
/// resolve a different field. Entering again for a field this thread is
/// already resolving is a recursive initialization.
pub struct Monitor {
    resolving: ReentrantMutex<RefCell<Vec<usize>>>,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            resolving: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    fn enter(&self, field: usize) -> Result<Entered<'_>, StableError> {
        let guard = self.resolving.lock();
        if guard.borrow().contains(&field) {
            return Err(StableError::RecursiveInitialization);
        }
        guard.borrow_mut().push(field);
        Ok(Entered { guard, field })
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor").finish_non_exhaustive()
    }
}

struct Entered<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<Vec<usize>>>,
    field: usize,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        let field = self.field;
        self.guard.borrow_mut().retain(|&f| f != field);
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A field type that [`FieldUpdater`] can publish into.
///
/// This trait is sealed.
pub trait LazyField: FieldType + Send + Sync + sealed::Sealed {
    type Value: Clone;

    /// The published value, or `None` while the field holds its sentinel.
    fn read(&self) -> Option<Self::Value>;

    /// Publish `value`. Called once, under the owner's monitor.
    fn write(&self, value: Self::Value);

    fn is_sentinel(value: &Self::Value) -> bool;
}

macro_rules! lazy_int_field {
    ($atomic:ty, $value:ty) => {
        impl sealed::Sealed for $atomic {}

        impl LazyField for $atomic {
            type Value = $value;

            #[inline]
            fn read(&self) -> Option<$value> {
                match ordering::read_settled(self, 0) {
                    0 => None,
                    value => Some(value),
                }
            }

            fn write(&self, value: $value) {
                ordering::publish(self, value);
            }

            fn is_sentinel(value: &$value) -> bool {
                *value == 0
            }
        }
    };
}

lazy_int_field!(AtomicI32, i32);
lazy_int_field!(AtomicI64, i64);

impl<V> sealed::Sealed for ArcSwapOption<V> {}

impl<V: Send + Sync + 'static> LazyField for ArcSwapOption<V> {
    type Value = Arc<V>;

    #[inline]
    fn read(&self) -> Option<Arc<V>> {
        self.load_full()
    }

    fn write(&self, value: Arc<V>) {
        self.store(Some(value));
    }

    fn is_sentinel(_value: &Arc<V>) -> bool {
        false
    }
}

/// A memoizing accessor for one lazy field of `H`.
///
/// The generator computes the field's value from the holder; it runs at
/// most once per holder instance, unless it fails or panics. Updaters bound
/// with `of_*` take an infallible generator and are read with
/// [`get`](FieldUpdater::get); updaters bound with `try_of_*` take a
/// generator returning `Result` and are read with
/// [`try_get`](FieldUpdater::try_get).
pub struct FieldUpdater<H, C: LazyField, F> {
    field: &'static str,
    offset: usize,
    zero_replacement: Option<C::Value>,
    generator: F,
    phantom: PhantomData<fn(&H) -> &C>,
}

impl<H: FieldHolder, F> FieldUpdater<H, AtomicI32, F> {
    /// Bind to the `AtomicI32` field named `field`.
    ///
    /// `zero_replacement` is stored and returned whenever the generator
    /// computes `0`; it must not be `0` itself.
    pub fn of_int(field: &str, generator: F, zero_replacement: i32) -> Result<Self, BindError>
    where
        F: Fn(&H) -> i32,
    {
        Self::bind(field, generator, Some(zero_replacement))
    }

    /// Like [`of_int`](FieldUpdater::of_int), with a fallible generator.
    pub fn try_of_int<E>(
        field: &str,
        generator: F,
        zero_replacement: i32,
    ) -> Result<Self, BindError>
    where
        F: Fn(&H) -> Result<i32, E>,
    {
        Self::bind(field, generator, Some(zero_replacement))
    }
}

impl<H: FieldHolder, F> FieldUpdater<H, AtomicI64, F> {
    /// Bind to the `AtomicI64` field named `field`. See [`of_int`].
    ///
    /// [`of_int`]: FieldUpdater::of_int
    pub fn of_long(field: &str, generator: F, zero_replacement: i64) -> Result<Self, BindError>
    where
        F: Fn(&H) -> i64,
    {
        Self::bind(field, generator, Some(zero_replacement))
    }

    pub fn try_of_long<E>(
        field: &str,
        generator: F,
        zero_replacement: i64,
    ) -> Result<Self, BindError>
    where
        F: Fn(&H) -> Result<i64, E>,
    {
        Self::bind(field, generator, Some(zero_replacement))
    }
}

impl<H, V, F> FieldUpdater<H, ArcSwapOption<V>, F>
where
    H: FieldHolder,
    V: Send + Sync + 'static,
{
    /// Bind to the `ArcSwapOption<V>` field named `field`.
    pub fn of_reference(field: &str, generator: F) -> Result<Self, BindError>
    where
        F: Fn(&H) -> Arc<V>,
    {
        Self::bind(field, generator, None)
    }

    pub fn try_of_reference<E>(field: &str, generator: F) -> Result<Self, BindError>
    where
        F: Fn(&H) -> Result<Arc<V>, E>,
    {
        Self::bind(field, generator, None)
    }
}

impl<H, C, F> FieldUpdater<H, C, F>
where
    H: FieldHolder,
    C: LazyField,
{
    fn bind(
        field: &str,
        generator: F,
        zero_replacement: Option<C::Value>,
    ) -> Result<Self, BindError> {
        let holder = type_name::<H>();
        let info = H::fields()
            .into_iter()
            .find(|info| info.name == field)
            .ok_or_else(|| BindError::NoSuchField {
                holder,
                field: field.to_owned(),
            })?;

        if info.type_id != TypeId::of::<C>() {
            return Err(if info.kind == C::KIND && !info.mutable {
                BindError::ImmutableField {
                    holder,
                    field: field.to_owned(),
                    found: info.type_name,
                }
            } else {
                BindError::TypeMismatch {
                    holder,
                    field: field.to_owned(),
                    expected: type_name::<C>(),
                    found: info.type_name,
                }
            });
        }
        if zero_replacement.as_ref().is_some_and(C::is_sentinel) {
            return Err(BindError::SentinelReplacement {
                field: field.to_owned(),
            });
        }

        tracing::debug!(holder, field, offset = info.offset, "field updater bound");
        Ok(Self {
            field: info.name,
            offset: info.offset,
            zero_replacement,
            generator,
            phantom: PhantomData,
        })
    }

    fn slot<'h>(&self, holder: &'h H) -> &'h C {
        // SAFETY: `bind` found a field of type `C` at `offset` inside `H`,
        // and the FieldHolder contract guarantees that description is
        // accurate. The reference lives as long as the holder borrow.
        unsafe { &*(holder as *const H).cast::<u8>().add(self.offset).cast::<C>() }
    }

    /// The name of the bound field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Test whether `holder`'s field has been resolved.
    pub fn is_set(&self, holder: &H) -> bool {
        self.slot(holder).read().is_some()
    }

    fn resolve<E, G>(&self, holder: &H, generate: G) -> Result<C::Value, E>
    where
        E: From<StableError>,
        G: FnOnce(&H) -> Result<C::Value, E>,
    {
        let slot = self.slot(holder);
        if let Some(value) = slot.read() {
            return Ok(value);
        }

        let _entered = holder.monitor().enter(self.offset)?;
        if let Some(value) = slot.read() {
            return Ok(value);
        }
        let mut value = generate(holder)?;
        if C::is_sentinel(&value) {
            if let Some(replacement) = &self.zero_replacement {
                value = replacement.clone();
            }
        }
        slot.write(value.clone());
        Ok(value)
    }
}

impl<H, C, F> FieldUpdater<H, C, F>
where
    H: FieldHolder,
    C: LazyField,
    F: Fn(&H) -> C::Value,
{
    /// Get the field's value, computing and storing it if unset.
    ///
    /// Fails with [`StableError::RecursiveInitialization`] if the generator
    /// asks for this same field of this same holder.
    pub fn get(&self, holder: &H) -> Result<C::Value, StableError> {
        self.resolve(holder, |holder| Ok((self.generator)(holder)))
    }
}

impl<H, C, E, F> FieldUpdater<H, C, F>
where
    H: FieldHolder,
    C: LazyField,
    E: From<StableError>,
    F: Fn(&H) -> Result<C::Value, E>,
{
    /// Get the field's value, computing it with the fallible generator if
    /// unset. A failure is returned as is and leaves the field unset, so the
    /// next call runs the generator again.
    pub fn try_get(&self, holder: &H) -> Result<C::Value, E> {
        self.resolve(holder, &self.generator)
    }
}

impl<H, C: LazyField, F> fmt::Debug for FieldUpdater<H, C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldUpdater")
            .field("holder", &type_name::<H>())
            .field("field", &self.field)
            .field("offset", &self.offset)
            .finish()
    }
}
