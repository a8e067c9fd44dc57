// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Preference, PreferenceStrategy, TypedSharedPreferences};
use crate::{Criterion, DecisionMaker, error::DirectoryError};
use std::{borrow::Borrow, collections::BTreeMap, fmt, hash::Hash};

/// The discrimination thresholds of an outranking method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThresholdKind {
    /// Largest difference that is considered insignificant.
    Indifference,
    /// Smallest difference that justifies a strict preference.
    Preference,
    /// Smallest difference that rules out outranking altogether.
    Veto,
}

/// The thresholds set on a single criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThresholdValues {
    pub indifference: Option<f64>,
    pub preference: Option<f64>,
    pub veto: Option<f64>,
}

impl ThresholdValues {
    pub fn get(&self, kind: ThresholdKind) -> Option<f64> {
        match kind {
            ThresholdKind::Indifference => self.indifference,
            ThresholdKind::Preference => self.preference,
            ThresholdKind::Veto => self.veto,
        }
    }

    fn get_mut(&mut self, kind: ThresholdKind) -> &mut Option<f64> {
        match kind {
            ThresholdKind::Indifference => &mut self.indifference,
            ThresholdKind::Preference => &mut self.preference,
            ThresholdKind::Veto => &mut self.veto,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indifference.is_none() && self.preference.is_none() && self.veto.is_none()
    }
}

/// Thresholds by criterion.
///
/// Criteria without any threshold are not stored, so two `Thresholds` holding the same
/// thresholds always compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Thresholds {
    by_criterion: BTreeMap<Criterion, ThresholdValues>,
}

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, criterion: &str) -> Option<&ThresholdValues> {
        self.by_criterion.get(criterion)
    }

    pub fn threshold(&self, criterion: &str, kind: ThresholdKind) -> Option<f64> {
        self.get(criterion)?.get(kind)
    }

    /// Sets (or, given `None`, clears) one threshold. Returns true if it changed.
    pub fn set_threshold(
        &mut self,
        criterion: impl Into<Criterion>,
        kind: ThresholdKind,
        value: Option<f64>,
    ) -> bool {
        let criterion = criterion.into();
        let Some(value) = value else {
            let Some(values) = self.by_criterion.get_mut(criterion.as_str()) else {
                return false;
            };
            let changed = values.get_mut(kind).take().is_some();
            if values.is_empty() {
                self.by_criterion.remove(criterion.as_str());
            }
            return changed;
        };
        debug_assert!(!value.is_nan(), "thresholds must not be NaN");
        let slot = self.by_criterion.entry(criterion).or_default().get_mut(kind);
        slot.replace(value) != Some(value)
    }

    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        self.by_criterion.remove(criterion).is_some()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Criterion, &ThresholdValues)> {
        self.by_criterion.iter()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Thresholds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "Thresholds")]
        struct Wire {
            by_criterion: BTreeMap<Criterion, ThresholdValues>,
        }

        let mut by_criterion = Wire::deserialize(deserializer)?.by_criterion;
        by_criterion.retain(|_, values| !values.is_empty());
        Ok(Self { by_criterion })
    }
}

impl Preference for Thresholds {
    fn is_empty(&self) -> bool {
        self.by_criterion.is_empty()
    }

    fn clear(&mut self) -> bool {
        let changed = !self.by_criterion.is_empty();
        self.by_criterion.clear();
        changed
    }

    fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (criterion, values) in &other.by_criterion {
            for kind in [
                ThresholdKind::Indifference,
                ThresholdKind::Preference,
                ThresholdKind::Veto,
            ] {
                if let Some(value) = values.get(kind) {
                    changed |= self.set_threshold(criterion.clone(), kind, Some(value));
                }
            }
        }
        changed
    }
}

/// Thresholds of a group of decision makers.
pub type SharedThresholds = TypedSharedPreferences<PreferenceStrategy<Thresholds>>;

impl SharedThresholds {
    /// Sets (or, given `None`, clears) one threshold of a single decision maker.
    pub fn set_threshold<Q>(
        &mut self,
        dm: &Q,
        criterion: impl Into<Criterion>,
        kind: ThresholdKind,
        value: Option<f64>,
    ) -> Result<bool, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let criterion = criterion.into();
        // clearing a threshold is a no-op on empty thresholds
        self.directory.apply(
            dm,
            |t| t.set_threshold(criterion, kind, value),
            value.is_some(),
        )
    }

    /// Drops every threshold on `criterion`, for every decision maker.
    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        self.directory
            .apply_to_all(|t| t.remove_criterion(criterion), false)
    }
}
