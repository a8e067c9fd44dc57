// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Shared-Value Directories
//!
//! A [`SharedValueDirectory`] maps keys to values and keeps track of whether all of those values
//! are currently equal, in which case the common value is available as the directory's *shared*
//! value.
//!
//! ## Slots
//!
//! Each key owns a slot, which is either
//!
//! - **deferred**: the key has no storage of its own, and its value is the shared value (when the
//!   directory is in [`SharingState::SharedValue`]) or the empty value (otherwise); or
//! - **materialized**: the key owns an independent value.
//!
//! Slots are materialized lazily: only when the directory diverges, or when a key is handed out
//! for mutation through [`SharedValueDirectory::get_mut`].
//!
//! ## Reconciliation
//!
//! Every mutation funnels into [`SharedValueDirectory::put`], which compares the incoming value
//! against the shared value and decides whether the directory stays shared, diverges, or (when
//! it already diverged) becomes shared again. Mutations made through [`SlotGuard`] and
//! [`SharedGuard`] are reconciled when the guard is dropped.
use crate::{
    McdaRandomState, create_map, create_map_with_capacity, error::DirectoryError,
    strategy::ValueStrategy,
};
use std::{
    borrow::Borrow,
    collections::{HashMap, hash_map::Entry},
    fmt,
    hash::Hash,
};

mod guard;
pub use guard::{SharedGuard, SlotGuard};

/// Physical storage of a single key.
#[derive(Debug, Clone, PartialEq)]
enum Slot<V> {
    /// No storage of its own; resolves to the shared (or empty) value.
    Deferred,
    Materialized(V),
}

#[derive(Debug, Clone)]
enum Sharing<V> {
    Untracked,
    SharedEmpty,
    // never holds an empty value
    SharedValue(V),
    // at least two keys, no deferred slots
    Diverged,
}

impl<V> Sharing<V> {
    fn state(&self) -> SharingState {
        match self {
            Sharing::Untracked => SharingState::Untracked,
            Sharing::SharedEmpty => SharingState::SharedEmpty,
            Sharing::SharedValue(_) => SharingState::SharedValue,
            Sharing::Diverged => SharingState::Diverged,
        }
    }
}

fn shared_or_empty<S>(value: S::Value, strategy: &S) -> Sharing<S::Value>
where
    S: ValueStrategy,
{
    if strategy.is_empty(&value) {
        Sharing::SharedEmpty
    } else {
        Sharing::SharedValue(value)
    }
}

/// The sharing state of a [`SharedValueDirectory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharingState {
    /// Sharing is not being computed.
    ///
    /// Directories start out untracked, and start tracking the first time the shared value is
    /// requested (see [`SharedValueDirectory::update_shared`]).
    Untracked,
    /// Every key holds an empty value, or there are no keys at all.
    SharedEmpty,
    /// Every key holds the same, non-empty, value.
    SharedValue,
    /// At least two keys hold different values.
    Diverged,
}

impl SharingState {
    /// Returns true if all keys are known to hold the same value.
    pub fn is_shared(self) -> bool {
        matches!(self, Self::SharedEmpty | Self::SharedValue)
    }
}

/// A mapping from keys to values that tracks whether all values are equal.
///
/// See the [module documentation](self) for an overview.
///
/// The directory is generic over the key type `K` and a [`ValueStrategy`] `S`, which determines
/// the value type and how values are created, copied and emptied.
///
/// ```rust
/// # use mcda_prefs::{SharedValueDirectory, SharingState, strategy::DefaultStrategy};
/// let mut directory = SharedValueDirectory::new(DefaultStrategy::<Vec<&str>>::new());
/// directory.put("d1", vec!["c1", "c2"]);
/// directory.put_shared("d2");
/// assert_eq!(directory.shared(), &vec!["c1", "c2"]);
/// assert_eq!(directory.get("d2").unwrap(), &vec!["c1", "c2"]);
///
/// directory.get_mut("d2").unwrap().push("c3");
/// assert_eq!(directory.sharing_state(), SharingState::Diverged);
/// assert!(directory.shared().is_empty());
/// ```
pub struct SharedValueDirectory<K, S>
where
    S: ValueStrategy,
{
    slots: HashMap<K, Slot<S::Value>, McdaRandomState>,
    sharing: Sharing<S::Value>,
    // what deferred slots resolve to unless a non-empty value is shared
    empty: S::Value,
    strategy: S,
}

impl<K, S> fmt::Debug for SharedValueDirectory<K, S>
where
    K: fmt::Debug,
    S: ValueStrategy,
    S::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedValueDirectory")
            .field("sharing", &self.sharing)
            .field("slots", &self.slots)
            .finish()
    }
}

// manual impl because auto-derive'd `Clone` does not require `S::Value: Clone`.
impl<K, S> Clone for SharedValueDirectory<K, S>
where
    K: Clone,
    S: ValueStrategy + Clone,
    S::Value: Clone,
{
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            sharing: self.sharing.clone(),
            empty: self.empty.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<K, S> Default for SharedValueDirectory<K, S>
where
    K: Hash + Eq,
    S: ValueStrategy + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<K, S> SharedValueDirectory<K, S>
where
    K: Hash + Eq,
    S: ValueStrategy,
{
    /// Creates an empty, untracked directory.
    pub fn new(strategy: S) -> Self {
        Self {
            slots: create_map(),
            sharing: Sharing::Untracked,
            empty: strategy.factory(None),
            strategy,
        }
    }

    /// Creates an empty, untracked directory with room for at least `capacity` keys.
    pub fn with_capacity(strategy: S, capacity: usize) -> Self {
        Self {
            slots: create_map_with_capacity(capacity),
            sharing: Sharing::Untracked,
            empty: strategy.factory(None),
            strategy,
        }
    }

    /// Returns the strategy used to manage values.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Returns the number of keys in this directory.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if this directory has no keys.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if `key` is present in this directory.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.contains_key(key)
    }

    /// Iterates over the keys of this directory, in arbitrary order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> {
        self.slots.keys()
    }

    /// Iterates over all keys and their values, in arbitrary order.
    ///
    /// Deferred keys yield the value they resolve to, without materializing anything.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &S::Value)> {
        self.slots
            .iter()
            .map(|(key, slot)| (key, self.resolve(slot)))
    }

    /// Returns the current sharing state, without computing it.
    pub fn sharing_state(&self) -> SharingState {
        self.sharing.state()
    }

    /// Returns the value of `key`.
    pub fn get<Q>(&self, key: &Q) -> Result<&S::Value, DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.slots
            .get(key)
            .map(|slot| self.resolve(slot))
            .ok_or_else(|| DirectoryError::unknown_key(key))
    }

    /// Returns the value of `key`, or `None` if that value is empty.
    pub fn get_non_empty<Q>(&self, key: &Q) -> Result<Option<&S::Value>, DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let value = self.get(key)?;
        Ok((!self.strategy.is_empty(value)).then_some(value))
    }

    /// Hands out the value of `key` for mutation.
    ///
    /// The key's value is materialized, and is written back through [`Self::put`] when the
    /// returned guard is dropped or committed, which re-establishes the sharing state.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<SlotGuard<'_, K, S>, DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let (key, slot) = self
            .slots
            .remove_entry(key)
            .ok_or_else(|| DirectoryError::unknown_key(key))?;
        let value = match slot {
            Slot::Materialized(value) => value,
            Slot::Deferred => self.strategy.factory(Some(self.baseline())),
        };
        Ok(SlotGuard::new(self, key, value))
    }

    /// Returns the shared value.
    ///
    /// This is the value common to all keys if there is one, and the empty value if the
    /// directory has diverged. An untracked directory starts tracking.
    pub fn shared(&mut self) -> &S::Value {
        self.update_shared();
        self.baseline()
    }

    /// Hands out a copy of the shared value for mutation.
    ///
    /// If the guard is mutated, its value becomes the value of _every_ key once it is dropped or
    /// committed. This is also the way to bring a diverged directory back in line. A guard that
    /// is never mutably dereferenced leaves the directory as it is.
    pub fn shared_mut(&mut self) -> SharedGuard<'_, K, S> {
        self.update_shared();
        let value = self.strategy.factory(Some(self.baseline()));
        SharedGuard::new(self, value)
    }

    /// Starts tracking the sharing state.
    ///
    /// If the directory is untracked, the common value of all keys is computed. A tracked
    /// directory is kept current by every mutation, so this has no effect on it.
    pub fn update_shared(&mut self) -> SharingState {
        if let Sharing::Untracked = self.sharing {
            self.rediscover();
        }
        self.sharing.state()
    }

    /// Sets the value of `key`, inserting the key if needed.
    ///
    /// While the directory is shared, a value equal to the shared value is stored as a deferred
    /// slot. A different value makes the directory diverge, unless `key` is the only key, in
    /// which case the shared value simply follows it. A diverged directory checks whether the new
    /// value made all keys equal again.
    pub fn put(&mut self, key: K, value: S::Value) {
        let same = self.is_same_as_shared(&value);
        self.reconcile(key, value, same);
    }

    /// Like [`Self::put`], but trusts the caller to know whether `value` equals the shared value.
    ///
    /// This skips the comparison against the shared value. The hint is only consulted while the
    /// directory is shared, and is verified in debug builds only: **an incorrect hint silently
    /// corrupts the sharing state in release builds**. Use [`Self::put`] unless the comparison
    /// shows up in a profile.
    pub fn put_with_hint(&mut self, key: K, value: S::Value, same_as_shared: bool) {
        let same = if self.sharing.state().is_shared() {
            debug_assert_eq!(
                self.is_same_as_shared(&value),
                Some(same_as_shared),
                "incorrect same-as-shared hint"
            );
            Some(same_as_shared)
        } else {
            None
        };
        self.reconcile(key, value, same);
    }

    /// Makes `key` hold the value shared by the other keys, inserting the key if needed.
    ///
    /// If the other keys have diverged, there is no such value and `key` is given an empty
    /// value instead. If `key` is the only key, its value already is the shared value and is
    /// left as it is.
    pub fn put_shared(&mut self, key: K) {
        if self.slots.len() == 1 && self.slots.contains_key(&key) {
            self.update_shared();
            return;
        }
        self.slots.remove(&key);
        if let Sharing::Untracked | Sharing::Diverged = self.sharing {
            self.rediscover();
        }
        let slot = match self.sharing {
            Sharing::Diverged => Slot::Materialized(self.strategy.factory(None)),
            _ => Slot::Deferred,
        };
        self.slots.insert(key, slot);
    }

    /// Empties the value of `key`, inserting the key if needed.
    ///
    /// Returns `true` unless `key` was already present with an empty value.
    pub fn put_empty(&mut self, key: K) -> bool {
        if let Sharing::SharedValue(_) = self.sharing {
            if self.slots.keys().all(|k| *k == key) {
                self.slots.insert(key, Slot::Deferred);
                self.sharing = Sharing::SharedEmpty;
                return true;
            }
            self.diverge();
        }

        let diverged = matches!(self.sharing, Sharing::Diverged);
        let changed = match self.slots.entry(key) {
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Materialized(value) => self.strategy.empty_in_place(value),
                // SharedValue was handled above, so this already resolves to the empty value
                Slot::Deferred => false,
            },
            Entry::Vacant(entry) => {
                entry.insert(if diverged {
                    Slot::Materialized(self.strategy.factory(None))
                } else {
                    Slot::Deferred
                });
                true
            }
        };
        if diverged && changed {
            self.rediscover();
        }
        changed
    }

    /// Empties the value of an existing `key`.
    ///
    /// Unlike [`Self::put_empty`], an unknown key is an error rather than inserted. Returns
    /// `false` if the value was already empty.
    pub fn empty<Q>(&mut self, key: &Q) -> Result<bool, DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        if self.get_non_empty(key)?.is_none() {
            return Ok(false);
        }
        let (key, _) = self
            .slots
            .remove_entry(key)
            .ok_or_else(|| DirectoryError::unknown_key(key))?;
        Ok(self.put_empty(key))
    }

    /// Removes `key` from the directory.
    ///
    /// When the last key is removed, `keep_shared` decides what happens to the shared value:
    /// if true, the shared value survives (an untracked directory adopts the removed key's value
    /// as its shared value); if false, the shared value is emptied.
    pub fn remove<Q>(&mut self, key: &Q, keep_shared: bool) -> Result<(), DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let slot = self
            .slots
            .remove(key)
            .ok_or_else(|| DirectoryError::unknown_key(key))?;

        if !self.slots.is_empty() {
            if let Sharing::Diverged = self.sharing {
                self.rediscover();
            }
            return Ok(());
        }

        match (self.sharing.state(), keep_shared) {
            (SharingState::Untracked | SharingState::Diverged, true) => {
                let value = match slot {
                    Slot::Materialized(value) => value,
                    Slot::Deferred => self.strategy.factory(None),
                };
                tracing::debug!("last key removed, keeping its value as the shared value");
                self.sharing = shared_or_empty(value, &self.strategy);
            }
            (SharingState::SharedEmpty | SharingState::SharedValue, true)
            | (SharingState::Untracked, false) => {}
            (SharingState::SharedEmpty | SharingState::SharedValue | SharingState::Diverged, false) => {
                self.sharing = Sharing::SharedEmpty;
            }
        }
        Ok(())
    }

    /// Applies `modifier` to the value of `key`, and reconciles the result.
    ///
    /// `modifier` must return whether it changed the value. If `apply_to_empty` is false and the
    /// key's value is empty, `modifier` is not called at all; use this when `modifier` is known
    /// to leave empty values untouched.
    pub fn apply<Q, F>(
        &mut self,
        key: &Q,
        modifier: F,
        apply_to_empty: bool,
    ) -> Result<bool, DirectoryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
        F: FnOnce(&mut S::Value) -> bool,
    {
        if !apply_to_empty && self.get_non_empty(key)?.is_none() {
            return Ok(false);
        }
        let mut guard = self.get_mut(key)?;
        let changed = modifier(&mut *guard);
        guard.commit();
        Ok(changed)
    }

    /// Applies `modifier` to the value of every key.
    ///
    /// `modifier` must return whether it changed the value it was given, and must treat all
    /// values the same way. While the directory is shared, `modifier` is applied only once, to
    /// the shared value. If `apply_to_empty` is false, keys without a value of their own are
    /// skipped; use this when `modifier` is known to leave empty values untouched.
    ///
    /// On a directory without keys, `modifier` is applied to the shared value.
    ///
    /// Returns `true` if any value changed.
    pub fn apply_to_all<F>(&mut self, mut modifier: F, apply_to_empty: bool) -> bool
    where
        F: FnMut(&mut S::Value) -> bool,
    {
        if let Sharing::SharedValue(shared) = &mut self.sharing {
            if !modifier(shared) {
                return false;
            }
            if let Some(shared) = self.take_shared() {
                self.set_shared(shared);
            }
            return true;
        }

        if self.slots.is_empty() || matches!(self.sharing, Sharing::SharedEmpty) {
            if !apply_to_empty && !self.slots.is_empty() {
                return false;
            }
            let mut value = self.strategy.factory(None);
            let changed = modifier(&mut value);
            self.set_shared(value);
            return changed;
        }

        let mut changed = false;
        for slot in self.slots.values_mut() {
            match slot {
                Slot::Materialized(value) => changed |= modifier(value),
                Slot::Deferred if apply_to_empty => {
                    // not SharedValue, so deferred slots are empty
                    let mut value = self.strategy.factory(None);
                    changed |= modifier(&mut value);
                    *slot = Slot::Materialized(value);
                }
                Slot::Deferred => {}
            }
        }
        if changed && matches!(self.sharing, Sharing::Diverged) {
            self.rediscover();
        }
        changed
    }

    /// What deferred slots currently resolve to.
    fn baseline(&self) -> &S::Value {
        match &self.sharing {
            Sharing::SharedValue(shared) => shared,
            _ => &self.empty,
        }
    }

    fn resolve<'a>(&'a self, slot: &'a Slot<S::Value>) -> &'a S::Value {
        match slot {
            Slot::Materialized(value) => value,
            Slot::Deferred => self.baseline(),
        }
    }

    fn is_same_as_shared(&self, value: &S::Value) -> Option<bool> {
        match &self.sharing {
            Sharing::SharedEmpty => Some(self.strategy.is_empty(value)),
            Sharing::SharedValue(shared) => Some(shared == value),
            Sharing::Untracked | Sharing::Diverged => None,
        }
    }

    fn reconcile(&mut self, key: K, value: S::Value, same_as_shared: Option<bool>) {
        match (self.sharing.state(), same_as_shared) {
            (SharingState::Untracked, _) => {
                self.slots.insert(key, Slot::Materialized(value));
            }
            (SharingState::Diverged, _) => {
                self.slots.insert(key, Slot::Materialized(value));
                self.rediscover();
            }
            (_, Some(true)) => {
                tracing::trace!("value matches the shared value, deferring");
                self.slots.insert(key, Slot::Deferred);
            }
            (SharingState::SharedEmpty | SharingState::SharedValue, _) => {
                if self.slots.keys().all(|k| *k == key) {
                    // a lone key takes the shared value with it
                    self.slots.insert(key, Slot::Deferred);
                    self.sharing = shared_or_empty(value, &self.strategy);
                } else {
                    self.diverge();
                    self.slots.insert(key, Slot::Materialized(value));
                }
            }
        }
    }

    /// Gives every deferred slot a copy of what it currently resolves to.
    fn materialize_deferred(&mut self) {
        let model = match &self.sharing {
            Sharing::SharedValue(shared) => shared,
            _ => &self.empty,
        };
        for slot in self.slots.values_mut() {
            if let Slot::Deferred = slot {
                *slot = Slot::Materialized(self.strategy.factory(Some(model)));
            }
        }
    }

    fn diverge(&mut self) {
        self.materialize_deferred();
        self.sharing = Sharing::Diverged;
        tracing::debug!(keys = self.slots.len(), "directory diverged");
    }

    /// Recomputes the sharing state from the values of all keys.
    fn rediscover(&mut self) {
        let sharing = {
            let mut values = self.slots.values().map(|slot| self.resolve(slot));
            match values.next() {
                None => Sharing::SharedEmpty,
                Some(first) if values.all(|value| value == first) => {
                    shared_or_empty(self.strategy.factory(Some(first)), &self.strategy)
                }
                Some(_) => Sharing::Diverged,
            }
        };

        let before = self.sharing.state();
        if let Sharing::Diverged = sharing {
            self.materialize_deferred();
        }
        self.sharing = sharing;
        if before != self.sharing.state() {
            tracing::debug!(?before, after = ?self.sharing.state(), "sharing state changed");
        }
    }

    fn take_shared(&mut self) -> Option<S::Value> {
        match std::mem::replace(&mut self.sharing, Sharing::Untracked) {
            Sharing::SharedValue(shared) => Some(shared),
            other => {
                self.sharing = other;
                None
            }
        }
    }

    /// Makes `value` the value of every key.
    fn set_shared(&mut self, value: S::Value) {
        for slot in self.slots.values_mut() {
            if let Slot::Materialized(current) = slot {
                self.strategy.copy_contents(&value, current);
            }
        }
        self.sharing = shared_or_empty(value, &self.strategy);
        tracing::debug!(state = ?self.sharing.state(), "shared value replaced");
    }

    /// Panics if the structural invariants of the directory do not hold.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self)
    where
        K: fmt::Debug,
        S::Value: fmt::Debug,
    {
        let deferred = self
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Deferred))
            .count();
        let mut values = self.slots.values().map(|slot| self.resolve(slot));
        let all_equal = match values.next() {
            Some(first) => values.all(|value| value == first),
            None => true,
        };
        match &self.sharing {
            Sharing::Untracked => {}
            Sharing::SharedEmpty => assert!(
                self.iter().all(|(_, v)| self.strategy.is_empty(v)),
                "shared-empty directory holds a non-empty value: {self:?}"
            ),
            Sharing::SharedValue(shared) => {
                assert!(!self.strategy.is_empty(shared), "shared value is empty");
                assert!(
                    self.iter().all(|(_, v)| v == shared),
                    "shared directory holds a divergent value: {self:?}"
                );
            }
            Sharing::Diverged => {
                assert_eq!(deferred, 0, "diverged directory has deferred slots");
                assert!(!all_equal, "diverged directory holds equal values: {self:?}");
            }
        }
    }
}
