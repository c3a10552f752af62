//! Error types shared by every holder, binding and field updater.

use thiserror::Error;

/// Errors raised by stable holders and their bindings.
///
/// Generator failures are not represented here: the `try_*` methods are
/// generic over the caller's own error type, which only needs to absorb a
/// `StableError` through `From`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StableError {
    /// `set_or_fail` found a value already present.
    #[error("value already set")]
    AlreadySet,

    /// `get_or_fail` found no published value.
    #[error("value not set")]
    NotSet,

    /// An index past the end of a dense holder.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The key is not part of the fixed key set the holder was built with.
    #[error("key not allowed: {key}")]
    KeyNotAllowed { key: String },

    /// The input is outside the domain of a memoizing function.
    #[error("input not allowed: {input}")]
    InputNotAllowed { input: String },

    /// A key appeared twice in the key set given at construction.
    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },

    /// A keyed holder was built from no keys at all.
    #[error("key set must not be empty")]
    EmptyKeySet,

    /// The ordinals of an ordinal key set span too wide a range to be
    /// addressed by array position.
    #[error("ordinal range {first}..={last} is too wide")]
    OrdinalRange { first: usize, last: usize },

    /// Wrong number of coordinates for a multi-dimensional holder.
    #[error("expected {expected} coordinates, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// One coordinate lies outside its axis.
    #[error("coordinate {index} out of range for axis {axis} of length {len}")]
    CoordinateOutOfBounds { axis: usize, index: usize, len: usize },

    /// The product of the dimensions does not fit in `usize`.
    #[error("shape element count overflows usize")]
    ShapeOverflow,

    /// A generator asked for its own slot on the thread that is computing it.
    #[error("illegal recursive initialization")]
    RecursiveInitialization,
}

/// Configuration errors raised when a [`FieldUpdater`](crate::FieldUpdater)
/// is bound to a holder type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("{holder} has no field named `{field}`")]
    NoSuchField { holder: &'static str, field: String },

    /// The field exists with the right logical type but cannot be updated
    /// in place (a plain, non-atomic field).
    #[error("field `{field}` of {holder} is immutable ({found})")]
    ImmutableField {
        holder: &'static str,
        field: String,
        found: &'static str,
    },

    #[error("field `{field}` of {holder} has type {found}, expected {expected}")]
    TypeMismatch {
        holder: &'static str,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The zero replacement is itself the "unset" sentinel.
    #[error("zero replacement for field `{field}` must not be the unset sentinel")]
    SentinelReplacement { field: String },
}
