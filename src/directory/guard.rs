// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::SharedValueDirectory;
use crate::strategy::ValueStrategy;
use std::{
    fmt,
    hash::Hash,
    ops::{Deref, DerefMut},
};

/// Exclusive access to the value of a single key, obtained through
/// [`SharedValueDirectory::get_mut`].
///
/// The guard owns the key's (materialized) value while it is alive. When it is dropped, the value
/// is written back through [`SharedValueDirectory::put`], which reconciles the sharing state of
/// the directory.
///
/// The key is taken out of the directory for as long as the guard is alive, so leaking the guard
/// (for instance through [`std::mem::forget`]) removes the key for good.
#[must_use = "the value is written back as soon as the guard is dropped"]
pub struct SlotGuard<'a, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    directory: &'a mut SharedValueDirectory<K, S>,
    // only ever `None` during drop
    entry: Option<(K, S::Value)>,
}

impl<'a, K, S> SlotGuard<'a, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    pub(super) fn new(directory: &'a mut SharedValueDirectory<K, S>, key: K, value: S::Value) -> Self {
        Self {
            directory,
            entry: Some((key, value)),
        }
    }

    /// The key whose value is being modified.
    pub fn key(&self) -> &K {
        &self.entry().0
    }

    /// Writes the value back to the directory.
    ///
    /// Equivalent to dropping the guard.
    pub fn commit(self) {}

    fn entry(&self) -> &(K, S::Value) {
        self.entry
            .as_ref()
            .expect("entry is only taken when the guard is dropped")
    }
}

impl<K, S> Deref for SlotGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    type Target = S::Value;

    fn deref(&self) -> &Self::Target {
        &self.entry().1
    }
}

impl<K, S> DerefMut for SlotGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .entry
            .as_mut()
            .expect("entry is only taken when the guard is dropped")
            .1
    }
}

impl<K, S> Drop for SlotGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    fn drop(&mut self) {
        if let Some((key, value)) = self.entry.take() {
            self.directory.put(key, value);
        }
    }
}

impl<K, S> fmt::Debug for SlotGuard<'_, K, S>
where
    K: Hash + Eq + fmt::Debug,
    S: ValueStrategy,
    S::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, value) = self.entry();
        f.debug_struct("SlotGuard")
            .field("key", key)
            .field("value", value)
            .finish()
    }
}

/// Access to a working copy of the shared value, obtained through
/// [`SharedValueDirectory::shared_mut`].
///
/// If the guard is ever mutably dereferenced, its value is made the value of every key of the
/// directory once the guard is dropped. Use [`SharedGuard::discard`] to drop the guard without
/// touching the directory.
#[must_use = "the shared value is written back as soon as the guard is dropped"]
pub struct SharedGuard<'a, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    directory: &'a mut SharedValueDirectory<K, S>,
    value: Option<S::Value>,
    dirty: bool,
}

impl<'a, K, S> SharedGuard<'a, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    pub(super) fn new(directory: &'a mut SharedValueDirectory<K, S>, value: S::Value) -> Self {
        Self {
            directory,
            value: Some(value),
            dirty: false,
        }
    }

    /// Writes the value back to every key of the directory, if it was modified.
    ///
    /// Equivalent to dropping the guard.
    pub fn commit(self) {}

    /// Drops the guard, leaving the directory as it was.
    pub fn discard(mut self) {
        self.dirty = false;
    }

    fn value(&self) -> &S::Value {
        self.value
            .as_ref()
            .expect("value is only taken when the guard is dropped")
    }
}

impl<K, S> Deref for SharedGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    type Target = S::Value;

    fn deref(&self) -> &Self::Target {
        self.value()
    }
}

impl<K, S> DerefMut for SharedGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;
        self.value
            .as_mut()
            .expect("value is only taken when the guard is dropped")
    }
}

impl<K, S> Drop for SharedGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        if let Some(value) = self.value.take() {
            self.directory.set_shared(value);
        }
    }
}

impl<K, S> fmt::Debug for SharedGuard<'_, K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
    S::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGuard")
            .field("value", self.value())
            .field("dirty", &self.dirty)
            .finish()
    }
}
