// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Value strategies: how a [`SharedValueDirectory`](crate::SharedValueDirectory) creates, copies and
//! empties the values it manages.
//!
//! The directory itself only ever compares values (through [`PartialEq`]). Everything else it needs
//! to do with a value is routed through the [`ValueStrategy`] it was constructed with, so that
//! value types can keep their own notion of what "empty" means, and can copy their contents
//! without reallocating.
use std::{fmt, marker::PhantomData};

/// The operations a [`SharedValueDirectory`](crate::SharedValueDirectory) needs over its values.
///
/// One instance is supplied per directory. Implementations must uphold the following:
///
/// - [`factory`](ValueStrategy::factory) never fails, and the returned value is equal to the
///   model when one is given, or empty otherwise.
/// - [`copy_contents`](ValueStrategy::copy_contents) leaves `target == source`.
/// - [`empty_in_place`](ValueStrategy::empty_in_place) leaves `is_empty(value)` true.
/// - Two empty values compare equal.
pub trait ValueStrategy {
    /// The type of values held by the directory.
    type Value: PartialEq;

    /// Creates a new value, as a copy of `model` if one is given, or empty otherwise.
    fn factory(&self, model: Option<&Self::Value>) -> Self::Value;

    /// Overwrites the contents of `target` with those of `source`.
    ///
    /// Returns `true` if `target` changed.
    fn copy_contents(&self, source: &Self::Value, target: &mut Self::Value) -> bool;

    /// Turns `value` into the empty representation of its type.
    ///
    /// Returns `true` if `value` changed.
    fn empty_in_place(&self, value: &mut Self::Value) -> bool;

    /// Returns `true` if `value` is empty.
    fn is_empty(&self, value: &Self::Value) -> bool;
}

/// A [`ValueStrategy`] for plain values, where [`Default::default`] is the empty value.
pub struct DefaultStrategy<V>(PhantomData<fn() -> V>);

impl<V> DefaultStrategy<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

// manual impls because derives would require `V: Default` and friends.
impl<V> Default for DefaultStrategy<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for DefaultStrategy<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for DefaultStrategy<V> {}

impl<V> fmt::Debug for DefaultStrategy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultStrategy")
    }
}

impl<V> ValueStrategy for DefaultStrategy<V>
where
    V: Clone + Default + PartialEq,
{
    type Value = V;

    fn factory(&self, model: Option<&V>) -> V {
        model.cloned().unwrap_or_default()
    }

    fn copy_contents(&self, source: &V, target: &mut V) -> bool {
        if source == target {
            return false;
        }
        target.clone_from(source);
        true
    }

    fn empty_in_place(&self, value: &mut V) -> bool {
        if self.is_empty(value) {
            return false;
        }
        *value = V::default();
        true
    }

    fn is_empty(&self, value: &V) -> bool {
        *value == V::default()
    }
}
