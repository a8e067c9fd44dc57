// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Preference, PreferenceStrategy, TypedSharedPreferences};
use crate::{Criterion, error::DirectoryError};
use smallvec::SmallVec;
use std::{borrow::Borrow, fmt, hash::Hash};

/// Criterion weights of a decision maker, with an optional majority threshold.
///
/// Weights are kept sorted by criterion, which keeps lookups logarithmic and makes equal sets of
/// weights compare equal regardless of the order they were set in. Weights must not be NaN.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Coalitions {
    weights: SmallVec<[(Criterion, f64); 8]>,
    majority_threshold: Option<f64>,
}

impl Coalitions {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, criterion: &str) -> Result<usize, usize> {
        self.weights
            .binary_search_by(|(k, _)| k.as_str().cmp(criterion))
    }

    pub fn weight(&self, criterion: &str) -> Option<f64> {
        let idx = self.position(criterion).ok()?;
        Some(self.weights[idx].1)
    }

    /// Sets the weight of `criterion`. Returns true if the weight changed.
    pub fn set_weight(&mut self, criterion: impl Into<Criterion>, weight: f64) -> bool {
        debug_assert!(!weight.is_nan(), "criterion weights must not be NaN");
        let criterion = criterion.into();
        match self.position(criterion.as_str()) {
            Ok(idx) if self.weights[idx].1 == weight => false,
            Ok(idx) => {
                self.weights[idx].1 = weight;
                true
            }
            Err(idx) => {
                self.weights.insert(idx, (criterion, weight));
                true
            }
        }
    }

    pub fn remove_weight(&mut self, criterion: &str) -> Option<f64> {
        let idx = self.position(criterion).ok()?;
        Some(self.weights.remove(idx).1)
    }

    /// Weights by criterion, in criterion order.
    pub fn weights(&self) -> impl ExactSizeIterator<Item = (&Criterion, f64)> {
        self.weights.iter().map(|(k, w)| (k, *w))
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    pub fn majority_threshold(&self) -> Option<f64> {
        self.majority_threshold
    }

    pub fn set_majority_threshold(&mut self, threshold: Option<f64>) -> bool {
        debug_assert!(
            !threshold.is_some_and(f64::is_nan),
            "majority threshold must not be NaN"
        );
        let changed = self.majority_threshold != threshold;
        self.majority_threshold = threshold;
        changed
    }
}

// weights may arrive unsorted or repeated; rebuild them through `set_weight`
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Coalitions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "Coalitions")]
        struct Wire {
            weights: Vec<(Criterion, f64)>,
            majority_threshold: Option<f64>,
        }

        let wire = Wire::deserialize(deserializer)?;
        let mut coalitions = Coalitions::new();
        for (criterion, weight) in wire.weights {
            coalitions.set_weight(criterion, weight);
        }
        coalitions.majority_threshold = wire.majority_threshold;
        Ok(coalitions)
    }
}

impl Preference for Coalitions {
    fn is_empty(&self) -> bool {
        self.weights.is_empty() && self.majority_threshold.is_none()
    }

    fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.weights.clear();
        self.majority_threshold = None;
        changed
    }

    fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (criterion, weight) in &other.weights {
            changed |= self.set_weight(criterion.clone(), *weight);
        }
        if other.majority_threshold.is_some() {
            changed |= self.set_majority_threshold(other.majority_threshold);
        }
        changed
    }
}

/// Criterion weights of a group of decision makers.
pub type SharedCoalitions = TypedSharedPreferences<PreferenceStrategy<Coalitions>>;

impl SharedCoalitions {
    /// Sets the weight of `criterion` for a single decision maker.
    pub fn set_weight<Q>(
        &mut self,
        dm: &Q,
        criterion: impl Into<Criterion>,
        weight: f64,
    ) -> Result<bool, DirectoryError>
    where
        crate::DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let criterion = criterion.into();
        self.directory
            .apply(dm, |c| c.set_weight(criterion, weight), true)
    }

    /// Sets the weight of `criterion` for every decision maker.
    pub fn set_weight_for_all(&mut self, criterion: impl Into<Criterion>, weight: f64) -> bool {
        let criterion = criterion.into();
        self.directory
            .apply_to_all(|c| c.set_weight(criterion.clone(), weight), true)
    }

    pub fn set_majority_threshold_for_all(&mut self, threshold: Option<f64>) -> bool {
        self.directory
            .apply_to_all(|c| c.set_majority_threshold(threshold), threshold.is_some())
    }

    /// Drops `criterion` from the coalitions of every decision maker.
    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        self.directory
            .apply_to_all(|c| c.remove_weight(criterion).is_some(), false)
    }
}
