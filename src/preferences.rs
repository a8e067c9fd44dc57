// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Shared Preferences
//!
//! [`TypedSharedPreferences`] is a [`SharedValueDirectory`] keyed by [`DecisionMaker`], with a
//! policy for how decision makers join and leave:
//!
//! - with `keep_shared` set, a newly added decision maker starts out with the shared value, and
//!   the shared value outlives the last decision maker;
//! - without it, a newly added decision maker starts out empty, and removing the last decision
//!   maker empties the shared value.
//!
//! The submodules define the preference values used by sorting methods ([`Coalitions`],
//! [`Thresholds`] and [`Evaluations`]) together with bulk operations over all decision makers.
use crate::{
    DecisionMaker, SharedGuard, SharedValueDirectory, SharingState, SlotGuard,
    error::DirectoryError, strategy::ValueStrategy,
};
use std::{borrow::Borrow, fmt, hash::Hash, marker::PhantomData};

mod coalitions;
pub use coalitions::{Coalitions, SharedCoalitions};
mod evaluations;
pub use evaluations::{Evaluations, SharedEvaluations};
mod thresholds;
pub use thresholds::{SharedThresholds, ThresholdKind, ThresholdValues, Thresholds};

/// A preference value that can be held by a [`TypedSharedPreferences`].
pub trait Preference: Clone + Default + PartialEq {
    /// Returns true if this value holds no preference information at all.
    fn is_empty(&self) -> bool;

    /// Removes all preference information from this value.
    ///
    /// Returns true if the value changed.
    fn clear(&mut self) -> bool;

    /// Overwrites this value with every piece of information present in `other`.
    ///
    /// Information absent from `other` is left untouched. Returns true if the value changed.
    fn merge_from(&mut self, other: &Self) -> bool;
}

/// The [`ValueStrategy`] for [`Preference`] values.
pub struct PreferenceStrategy<P>(PhantomData<fn() -> P>);

impl<P> Default for PreferenceStrategy<P> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<P> Clone for PreferenceStrategy<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for PreferenceStrategy<P> {}

impl<P> fmt::Debug for PreferenceStrategy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreferenceStrategy<{}>", std::any::type_name::<P>())
    }
}

impl<P> ValueStrategy for PreferenceStrategy<P>
where
    P: Preference,
{
    type Value = P;

    fn factory(&self, model: Option<&P>) -> P {
        model.cloned().unwrap_or_default()
    }

    fn copy_contents(&self, source: &P, target: &mut P) -> bool {
        if source == target {
            return false;
        }
        target.clone_from(source);
        true
    }

    fn empty_in_place(&self, value: &mut P) -> bool {
        value.clear()
    }

    fn is_empty(&self, value: &P) -> bool {
        value.is_empty()
    }
}

/// Preferences of a group of decision makers, tracking whether they all agree.
pub struct TypedSharedPreferences<S>
where
    S: ValueStrategy,
{
    directory: SharedValueDirectory<DecisionMaker, S>,
    keep_shared: bool,
}

impl<S> fmt::Debug for TypedSharedPreferences<S>
where
    S: ValueStrategy,
    S::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSharedPreferences")
            .field("keep_shared", &self.keep_shared)
            .field("directory", &self.directory)
            .finish()
    }
}

impl<S> TypedSharedPreferences<S>
where
    S: ValueStrategy + Default,
{
    /// Creates an empty group of decision makers.
    pub fn new(keep_shared: bool) -> Self {
        Self::with_strategy(S::default(), keep_shared)
    }
}

impl<S> TypedSharedPreferences<S>
where
    S: ValueStrategy,
{
    /// Like [`Self::new`], with an explicit strategy instance.
    pub fn with_strategy(strategy: S, keep_shared: bool) -> Self {
        Self {
            directory: SharedValueDirectory::new(strategy),
            keep_shared,
        }
    }

    /// Whether added decision makers inherit the shared value, and whether the shared value
    /// survives the last decision maker.
    pub fn keep_shared(&self) -> bool {
        self.keep_shared
    }

    /// Changes the policy for decision makers added or removed from now on.
    pub fn set_keep_shared(&mut self, keep_shared: bool) {
        self.keep_shared = keep_shared;
    }

    /// Adds a decision maker, or resets an existing one.
    ///
    /// The decision maker receives the shared value if `keep_shared` is set, and an empty value
    /// otherwise.
    pub fn add_key(&mut self, dm: impl Into<DecisionMaker>) {
        let dm = dm.into();
        tracing::trace!(%dm, keep_shared = self.keep_shared, "adding decision maker");
        if self.keep_shared {
            self.directory.put_shared(dm);
        } else {
            self.directory.put_empty(dm);
        }
    }

    /// Empties the preferences of an existing decision maker.
    ///
    /// Returns false if they were already empty.
    pub fn empty<Q>(&mut self, dm: &Q) -> Result<bool, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.directory.empty(dm)
    }

    /// The preferences of `dm`.
    pub fn get<Q>(&self, dm: &Q) -> Result<&S::Value, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.directory.get(dm)
    }

    /// The preferences of `dm`, or `None` if they are empty.
    pub fn get_non_empty<Q>(&self, dm: &Q) -> Result<Option<&S::Value>, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.directory.get_non_empty(dm)
    }

    /// Hands out the preferences of `dm` for mutation; see [`SharedValueDirectory::get_mut`].
    pub fn get_mut<Q>(&mut self, dm: &Q) -> Result<SlotGuard<'_, DecisionMaker, S>, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.directory.get_mut(dm)
    }

    /// Sets the preferences of `dm`, adding the decision maker if needed.
    pub fn put(&mut self, dm: impl Into<DecisionMaker>, value: S::Value) {
        self.directory.put(dm.into(), value);
    }

    /// Removes a decision maker.
    ///
    /// See [`SharedValueDirectory::remove`] for what happens to the shared value when the last
    /// decision maker is removed.
    pub fn remove<Q>(&mut self, dm: &Q) -> Result<(), DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.directory.remove(dm, self.keep_shared)
    }

    /// Whether `dm` is part of the group.
    pub fn contains<Q>(&self, dm: &Q) -> bool
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.directory.contains_key(dm)
    }

    /// All decision makers and their preferences, in arbitrary order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&DecisionMaker, &S::Value)> {
        self.directory.iter()
    }

    /// All decision makers, in arbitrary order.
    pub fn decision_makers(&self) -> impl ExactSizeIterator<Item = &DecisionMaker> {
        self.directory.keys()
    }

    /// The number of decision makers.
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// The preferences all decision makers agree on, or the empty value if they disagree.
    pub fn shared(&mut self) -> &S::Value {
        self.directory.shared()
    }

    /// Hands out the shared preferences for mutation. A mutated guard overwrites the preferences
    /// of every decision maker when dropped; see [`SharedValueDirectory::shared_mut`].
    pub fn shared_mut(&mut self) -> SharedGuard<'_, DecisionMaker, S> {
        self.directory.shared_mut()
    }

    /// Whether the decision makers currently agree, without computing it.
    pub fn sharing_state(&self) -> SharingState {
        self.directory.sharing_state()
    }

    /// The underlying directory.
    pub fn directory(&self) -> &SharedValueDirectory<DecisionMaker, S> {
        &self.directory
    }

    /// The underlying directory, for operations not wrapped here.
    ///
    /// `keep_shared` is not applied to keys added or removed through it.
    pub fn directory_mut(&mut self) -> &mut SharedValueDirectory<DecisionMaker, S> {
        &mut self.directory
    }
}

impl<P> TypedSharedPreferences<PreferenceStrategy<P>>
where
    P: Preference,
{
    /// Merges `other` into the preferences of every decision maker.
    ///
    /// Returns true if any preferences changed.
    pub fn merge(&mut self, other: &P) -> bool {
        self.directory
            .apply_to_all(|value| value.merge_from(other), true)
    }

    /// Gives every decision maker the preferences `value`.
    pub fn replace_shared(&mut self, value: P) {
        *self.directory.shared_mut() = value;
    }
}
