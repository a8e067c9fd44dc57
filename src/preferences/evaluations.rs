// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Preference, PreferenceStrategy, TypedSharedPreferences};
use crate::{Alternative, Criterion, DecisionMaker, error::DirectoryError};
use std::{borrow::Borrow, collections::BTreeMap, fmt, hash::Hash};

/// Performances of alternatives (typically category profiles) on each criterion.
///
/// Alternatives without any performance are not stored.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Evaluations {
    by_alternative: BTreeMap<Alternative, BTreeMap<Criterion, f64>>,
}

impl Evaluations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluation(&self, alternative: &str, criterion: &str) -> Option<f64> {
        self.by_alternative.get(alternative)?.get(criterion).copied()
    }

    /// Sets the performance of `alternative` on `criterion`. Returns true if it changed.
    pub fn set_evaluation(
        &mut self,
        alternative: impl Into<Alternative>,
        criterion: impl Into<Criterion>,
        value: f64,
    ) -> bool {
        debug_assert!(!value.is_nan(), "evaluations must not be NaN");
        self.by_alternative
            .entry(alternative.into())
            .or_default()
            .insert(criterion.into(), value)
            != Some(value)
    }

    pub fn remove_evaluation(&mut self, alternative: &str, criterion: &str) -> bool {
        let Some(row) = self.by_alternative.get_mut(alternative) else {
            return false;
        };
        let removed = row.remove(criterion).is_some();
        if row.is_empty() {
            self.by_alternative.remove(alternative);
        }
        removed
    }

    pub fn remove_alternative(&mut self, alternative: &str) -> bool {
        self.by_alternative.remove(alternative).is_some()
    }

    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        let mut changed = false;
        self.by_alternative.retain(|_, row| {
            changed |= row.remove(criterion).is_some();
            !row.is_empty()
        });
        changed
    }

    /// The alternatives with at least one performance, in order.
    pub fn alternatives(&self) -> impl ExactSizeIterator<Item = &Alternative> {
        self.by_alternative.keys()
    }

    /// The performances of `alternative`, in criterion order.
    pub fn row(&self, alternative: &str) -> impl Iterator<Item = (&Criterion, f64)> {
        self.by_alternative
            .get(alternative)
            .into_iter()
            .flat_map(|row| row.iter().map(|(c, v)| (c, *v)))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Evaluations {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "Evaluations")]
        struct Wire {
            by_alternative: BTreeMap<Alternative, BTreeMap<Criterion, f64>>,
        }

        let mut by_alternative = Wire::deserialize(deserializer)?.by_alternative;
        by_alternative.retain(|_, row| !row.is_empty());
        Ok(Self { by_alternative })
    }
}

impl Preference for Evaluations {
    fn is_empty(&self) -> bool {
        self.by_alternative.is_empty()
    }

    fn clear(&mut self) -> bool {
        let changed = !self.by_alternative.is_empty();
        self.by_alternative.clear();
        changed
    }

    fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (alternative, row) in &other.by_alternative {
            for (criterion, value) in row {
                changed |= self.set_evaluation(alternative.clone(), criterion.clone(), *value);
            }
        }
        changed
    }
}

/// Profile performances of a group of decision makers.
pub type SharedEvaluations = TypedSharedPreferences<PreferenceStrategy<Evaluations>>;

impl SharedEvaluations {
    pub fn set_evaluation<Q>(
        &mut self,
        dm: &Q,
        alternative: impl Into<Alternative>,
        criterion: impl Into<Criterion>,
        value: f64,
    ) -> Result<bool, DirectoryError>
    where
        DecisionMaker: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let (alternative, criterion) = (alternative.into(), criterion.into());
        self.directory.apply(
            dm,
            |e| e.set_evaluation(alternative, criterion, value),
            true,
        )
    }

    /// Drops `alternative` from the evaluations of every decision maker.
    pub fn remove_alternative(&mut self, alternative: &str) -> bool {
        self.directory
            .apply_to_all(|e| e.remove_alternative(alternative), false)
    }

    /// Drops `criterion` from the evaluations of every decision maker.
    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        self.directory
            .apply_to_all(|e| e.remove_criterion(criterion), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SharingState;

    fn profile(values: &[(&str, &str, f64)]) -> Evaluations {
        let mut e = Evaluations::new();
        for &(alternative, criterion, value) in values {
            e.set_evaluation(alternative, criterion, value);
        }
        e
    }

    #[test]
    fn empty_rows_are_dropped() {
        let mut e = profile(&[("p1", "c1", 1.0), ("p1", "c2", 2.0), ("p2", "c1", 3.0)]);
        assert!(e.remove_criterion("c1"));
        let alternatives: Vec<_> = e.alternatives().map(Alternative::as_str).collect();
        assert_eq!(alternatives, ["p1"]);
        assert!(e.remove_evaluation("p1", "c2"));
        assert!(!e.remove_evaluation("p1", "c2"));
        assert!(e.is_empty());
    }

    #[test]
    fn rows_are_ordered_by_criterion() {
        let e = profile(&[("p1", "c2", 2.0), ("p1", "c1", 1.0)]);
        let row: Vec<_> = e.row("p1").map(|(c, v)| (c.as_str(), v)).collect();
        assert_eq!(row, [("c1", 1.0), ("c2", 2.0)]);
        assert_eq!(e.row("p9").count(), 0);
    }

    #[test]
    fn shared_evaluations() {
        let mut p = SharedEvaluations::new(false);
        p.put("d1", profile(&[("p1", "c1", 1.0), ("p2", "c1", 2.0)]));
        p.put("d2", profile(&[("p1", "c1", 1.0)]));
        assert_eq!(p.set_evaluation("d2", "p2", "c1", 2.0), Ok(true));
        assert_eq!(p.shared(), &profile(&[("p1", "c1", 1.0), ("p2", "c1", 2.0)]));

        assert!(p.remove_alternative("p2"));
        assert_eq!(p.sharing_state(), SharingState::SharedValue);
        assert_eq!(p.get("d1").unwrap().evaluation("p2", "c1"), None);

        assert!(p.merge(&profile(&[("p3", "c2", 0.5)])));
        assert_eq!(p.get("d2").unwrap().evaluation("p3", "c2"), Some(0.5));
        assert!(p.remove_criterion("c1"));
        assert!(!p.remove_criterion("c1"));
    }
}
