// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # mcda-prefs: Shared Preference Bookkeeping for Multi-Criteria Sorting
//!
//! Sorting problems in multi-criteria decision analysis often involve several decision makers,
//! each holding their own copy of a preference object: a coalition of criterion weights, a set of
//! discrimination thresholds, the performances of the category profiles. Most of the time these
//! copies are identical, and callers want to treat them as one "shared" value, while still being
//! able to let a single decision maker diverge at any point.
//!
//! The core of this crate is the [`SharedValueDirectory`], a mapping from keys (typically
//! [`DecisionMaker`]s) to values, which keeps track of whether all values are currently equal.
//!
//! ## Sharing States
//!
//! A directory is always in one of four states, reported by [`SharingState`]:
//!
//! - **Untracked**: the directory has not been asked about sharing yet and does not compute it.
//! - **SharedEmpty**: every key holds an empty value (or there are no keys at all).
//! - **SharedValue**: every key holds the same non-empty value.
//! - **Diverged**: at least two keys hold different values.
//!
//! While shared, keys do not need storage of their own: a key whose value equals the shared value
//! is kept as a *deferred* slot that simply resolves to the shared value. Storage for a key is
//! *materialized* only once the key needs an independent value, which happens when the directory
//! diverges or when the key is mutated.
//!
//! ## Mutation Through Guards
//!
//! Values are never handed out as plain `&mut` references. Instead, [`SharedValueDirectory::get_mut`]
//! and [`SharedValueDirectory::shared_mut`] return guards that dereference to the value and
//! reconcile the sharing state when they are dropped (or explicitly committed). It is therefore
//! impossible to mutate a value and forget to tell the directory about it.
//!
//! ```rust
//! use mcda_prefs::{SharedValueDirectory, SharingState, strategy::DefaultStrategy};
//!
//! let mut directory = SharedValueDirectory::new(DefaultStrategy::<u32>::new());
//! directory.put("alice", 3);
//! directory.put("bob", 3);
//! assert_eq!(*directory.shared(), 3);
//!
//! // bob changes his mind; the directory diverges
//! *directory.get_mut("bob").unwrap() = 4;
//! assert_eq!(directory.sharing_state(), SharingState::Diverged);
//! assert_eq!(*directory.get("alice").unwrap(), 3);
//!
//! // editing the shared value brings everybody back in line
//! *directory.shared_mut() = 5;
//! assert_eq!(*directory.get("bob").unwrap(), 5);
//! assert_eq!(directory.sharing_state(), SharingState::SharedValue);
//! ```
//!
//! ## Value Strategies
//!
//! The directory knows nothing about the values it holds beyond equality. Creating, copying and
//! emptying values is delegated to a [`ValueStrategy`]. Simple value types can use
//! [`strategy::DefaultStrategy`]; the preference types in [`preferences`] each come with their own.
//!
//! ## Preferences
//!
//! [`TypedSharedPreferences`] binds a directory to [`DecisionMaker`] keys and adds a `keep_shared`
//! mode, which decides whether newly added decision makers start out with the shared value or with
//! an empty one. The [`preferences`] module builds weight coalitions, thresholds and profile
//! evaluations on top of it.
//!
//! ## Features
//!
//! - `serde`: Provides `serde` support for identifiers and preference values.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for identifiers and preference values, useful
//!   for property-based testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make performance benchmarks have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

/// Macros usable for tests and initialization
pub mod macros;
pub mod directory;
pub use directory::{SharedGuard, SharedValueDirectory, SharingState, SlotGuard};
pub mod domain;
pub use domain::{Alternative, Criterion, DecisionMaker};
mod error;
pub use error::DirectoryError;
pub mod preferences;
pub use preferences::TypedSharedPreferences;
pub mod strategy;
pub use strategy::ValueStrategy;

#[cfg(any(test, feature = "arbitrary"))]
mod test_util;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, McdaRandomState> {
    std::collections::HashMap::with_hasher(McdaRandomState::default())
}

fn create_map_with_capacity<K, V>(
    capacity: usize,
) -> std::collections::HashMap<K, V, McdaRandomState> {
    std::collections::HashMap::with_capacity_and_hasher(capacity, McdaRandomState::default())
}

/// This is a small wrapper around the standard RandomState.
/// This allows us to easily switch to a non-random RandomState for use in tests.
#[derive(Clone)]
pub struct McdaRandomState {
    inner: RandomState,
}

// Falls back on the regular ahash::RandomState except when 'enable_determinism' has been called,
// in which case a static only-for-test RandomState is used.
impl Default for McdaRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for McdaRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
