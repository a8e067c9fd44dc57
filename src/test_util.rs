// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Test support: [`quickcheck::Arbitrary`] implementations for identifiers and preference values,
//! and (in tests) a model-checking harness for arbitrary sequences of directory operations.
use crate::{
    Alternative, Criterion, DecisionMaker,
    preferences::{Coalitions, Evaluations, ThresholdKind, Thresholds},
};
use quickcheck::{Arbitrary, Gen};

// small pools, so that generated values collide often
impl Arbitrary for DecisionMaker {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new(format!("d{}", u8::arbitrary(g) % 4))
    }
}

impl Arbitrary for Criterion {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new(format!("c{}", u8::arbitrary(g) % 4))
    }
}

impl Arbitrary for Alternative {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::new(format!("p{}", u8::arbitrary(g) % 3))
    }
}

impl Arbitrary for ThresholdKind {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&[Self::Indifference, Self::Preference, Self::Veto])
            .expect("choice is not empty")
    }
}

fn small_f64(g: &mut Gen) -> f64 {
    f64::from(u8::arbitrary(g) % 4) / 4.0
}

impl Arbitrary for Coalitions {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut coalitions = Self::new();
        for _ in 0..u8::arbitrary(g) % 4 {
            coalitions.set_weight(Criterion::arbitrary(g), small_f64(g));
        }
        if bool::arbitrary(g) {
            coalitions.set_majority_threshold(Some(small_f64(g)));
        }
        coalitions
    }
}

impl Arbitrary for Thresholds {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut thresholds = Self::new();
        for _ in 0..u8::arbitrary(g) % 4 {
            thresholds.set_threshold(
                Criterion::arbitrary(g),
                ThresholdKind::arbitrary(g),
                Some(small_f64(g)),
            );
        }
        thresholds
    }
}

impl Arbitrary for Evaluations {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut evaluations = Self::new();
        for _ in 0..u8::arbitrary(g) % 6 {
            evaluations.set_evaluation(
                Alternative::arbitrary(g),
                Criterion::arbitrary(g),
                small_f64(g),
            );
        }
        evaluations
    }
}

#[cfg(test)]
pub(crate) use harness::{Ops, PreferenceOps, init_tracing};

#[cfg(test)]
mod harness {
    use crate::{
        DecisionMaker, DirectoryError, SharedValueDirectory, SharingState,
        preferences::{Coalitions, Preference, SharedCoalitions},
        strategy::DefaultStrategy,
    };
    use quickcheck::{Arbitrary, Gen};
    use std::collections::BTreeMap;

    /// Installs a `tracing` subscriber that honours `RUST_LOG`, once per test binary.
    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    // keys and values are drawn from tiny ranges so that sharing and divergence both happen a lot.
    // 0 is the empty value.
    const KEYS: u8 = 4;
    const VALUES: u8 = 3;

    /// A single operation on a `SharedValueDirectory<u8, DefaultStrategy<u8>>`.
    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u8),
        PutShared(u8),
        PutEmpty(u8),
        Remove { key: u8, keep_shared: bool },
        Modify(u8, u8),
        Apply { key: u8, value: u8, apply_to_empty: bool },
        ApplyToAll { step: u8, apply_to_empty: bool },
        ReplaceShared(u8),
        Shared,
    }

    impl Arbitrary for Op {
        fn arbitrary(g: &mut Gen) -> Self {
            let key = u8::arbitrary(g) % KEYS;
            let value = u8::arbitrary(g) % VALUES;
            match u8::arbitrary(g) % 9 {
                0 | 1 => Op::Put(key, value),
                2 => Op::PutShared(key),
                3 => Op::PutEmpty(key),
                4 => Op::Remove {
                    key,
                    keep_shared: bool::arbitrary(g),
                },
                5 => Op::Modify(key, value),
                6 => Op::Apply {
                    key,
                    value,
                    apply_to_empty: bool::arbitrary(g),
                },
                7 => Op::ApplyToAll {
                    step: 1 + u8::arbitrary(g) % (VALUES - 1),
                    apply_to_empty: bool::arbitrary(g),
                },
                _ if bool::arbitrary(g) => Op::ReplaceShared(value),
                _ => Op::Shared,
            }
        }
    }

    /// Rotates non-empty values, leaving the empty value alone.
    fn rotate(value: &mut u8, step: u8) -> bool {
        if *value == 0 {
            return false;
        }
        let before = *value;
        *value = (*value + step) % VALUES;
        *value != before
    }

    /// A sequence of directory operations, checked step by step against a naive model.
    #[derive(Debug, Clone)]
    pub(crate) struct Ops(Vec<Op>);

    impl Arbitrary for Ops {
        fn arbitrary(g: &mut Gen) -> Self {
            Ops(Vec::arbitrary(g))
        }

        fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
            Box::new(self.0.shrink().map(Ops))
        }
    }

    /// What the directory should look like from the outside.
    #[derive(Debug, Default)]
    struct Model {
        values: BTreeMap<u8, u8>,
        // the shared value while there are no keys
        orphan: u8,
    }

    impl Model {
        fn shared(&self) -> u8 {
            let mut values = self.values.values();
            match values.next() {
                None => self.orphan,
                Some(&first) if values.all(|&v| v == first) => first,
                Some(_) => 0,
            }
        }

        fn set_all(&mut self, value: u8) {
            if self.values.is_empty() {
                self.orphan = value;
            }
            for v in self.values.values_mut() {
                *v = value;
            }
        }
    }

    impl Ops {
        pub(crate) fn check_against_model(&self) {
            let mut directory = SharedValueDirectory::<u8, DefaultStrategy<u8>>::default();
            let mut model = Model::default();

            for op in &self.0 {
                match *op {
                    Op::Put(key, value) => {
                        directory.put(key, value);
                        model.values.insert(key, value);
                    }
                    Op::PutShared(key) => {
                        directory.put_shared(key);
                        let mut others = model.values.iter().filter(|(k, _)| **k != key);
                        let value = match others.next() {
                            None => model.values.get(&key).copied().unwrap_or(model.orphan),
                            Some((_, &first)) if others.all(|(_, &v)| v == first) => first,
                            Some(_) => 0,
                        };
                        model.values.insert(key, value);
                    }
                    Op::PutEmpty(key) => {
                        let changed = directory.put_empty(key);
                        let was = model.values.insert(key, 0);
                        assert_eq!(changed, was != Some(0), "{op:?}");
                    }
                    Op::Remove { key, keep_shared } => {
                        let result = directory.remove(&key, keep_shared);
                        match model.values.remove(&key) {
                            None => {
                                assert_eq!(result, Err(DirectoryError::unknown_key(&key)));
                            }
                            Some(removed) => {
                                assert_eq!(result, Ok(()));
                                if model.values.is_empty() {
                                    model.orphan = if keep_shared { removed } else { 0 };
                                }
                            }
                        }
                    }
                    Op::Modify(key, value) => match directory.get_mut(&key) {
                        Ok(mut guard) => {
                            *guard = value;
                            guard.commit();
                            model.values.insert(key, value);
                        }
                        Err(_) => assert!(!model.values.contains_key(&key)),
                    },
                    Op::Apply {
                        key,
                        value,
                        apply_to_empty,
                    } => {
                        let result = directory.apply(
                            &key,
                            |v| {
                                let changed = *v != value;
                                *v = value;
                                changed
                            },
                            apply_to_empty,
                        );
                        match model.values.get_mut(&key) {
                            None => assert!(result.is_err()),
                            Some(current) if *current == 0 && !apply_to_empty => {
                                assert_eq!(result, Ok(false));
                            }
                            Some(current) => {
                                assert_eq!(result, Ok(*current != value), "{op:?}");
                                *current = value;
                            }
                        }
                    }
                    Op::ApplyToAll {
                        step,
                        apply_to_empty,
                    } => {
                        let changed = directory.apply_to_all(|v| rotate(v, step), apply_to_empty);
                        let mut expected = false;
                        if model.values.is_empty() {
                            expected = rotate(&mut model.orphan, step);
                        }
                        for v in model.values.values_mut() {
                            expected |= rotate(v, step);
                        }
                        assert_eq!(changed, expected, "{op:?}");
                    }
                    Op::ReplaceShared(value) => {
                        *directory.shared_mut() = value;
                        model.set_all(value);
                    }
                    Op::Shared => {
                        assert_eq!(*directory.shared(), model.shared());
                    }
                }

                assert_eq!(directory.len(), model.values.len(), "after {op:?}");
                for (key, value) in &model.values {
                    assert_eq!(directory.get(key), Ok(value), "after {op:?}");
                }
                directory.assert_invariants();
            }

            assert_eq!(*directory.shared(), model.shared());
            assert!(directory.sharing_state() != SharingState::Untracked);
            directory.assert_invariants();
        }
    }

    /// A single operation on a `SharedCoalitions`.
    #[derive(Debug, Clone)]
    enum PreferenceOp {
        AddKey(DecisionMaker),
        Put(DecisionMaker, Coalitions),
        Empty(DecisionMaker),
        Remove(DecisionMaker),
        SetKeepShared(bool),
        Merge(Coalitions),
        Shared,
    }

    impl Arbitrary for PreferenceOp {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 8 {
                0 | 1 => PreferenceOp::AddKey(DecisionMaker::arbitrary(g)),
                2 | 3 => PreferenceOp::Put(DecisionMaker::arbitrary(g), Coalitions::arbitrary(g)),
                4 => PreferenceOp::Empty(DecisionMaker::arbitrary(g)),
                5 => PreferenceOp::Remove(DecisionMaker::arbitrary(g)),
                6 if bool::arbitrary(g) => PreferenceOp::SetKeepShared(bool::arbitrary(g)),
                6 => PreferenceOp::Merge(Coalitions::arbitrary(g)),
                _ => PreferenceOp::Shared,
            }
        }
    }

    /// A sequence of operations on decision-maker preferences, checked against a naive model.
    #[derive(Debug, Clone)]
    pub(crate) struct PreferenceOps {
        keep_shared: bool,
        ops: Vec<PreferenceOp>,
    }

    impl Arbitrary for PreferenceOps {
        fn arbitrary(g: &mut Gen) -> Self {
            PreferenceOps {
                keep_shared: bool::arbitrary(g),
                ops: Vec::arbitrary(g),
            }
        }

        fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
            let keep_shared = self.keep_shared;
            Box::new(
                self.ops
                    .shrink()
                    .map(move |ops| PreferenceOps { keep_shared, ops }),
            )
        }
    }

    #[derive(Debug, Default)]
    struct PreferenceModel {
        values: BTreeMap<DecisionMaker, Coalitions>,
        orphan: Coalitions,
    }

    impl PreferenceModel {
        fn shared(&self) -> Coalitions {
            let mut values = self.values.values();
            match values.next() {
                None => self.orphan.clone(),
                Some(first) if values.all(|v| v == first) => first.clone(),
                Some(_) => Coalitions::default(),
            }
        }

        /// The value a decision maker joining under `keep_shared` receives.
        fn inherited(&self, dm: &DecisionMaker) -> Coalitions {
            let mut others = self.values.iter().filter(|(k, _)| *k != dm);
            match others.next() {
                None => self.values.get(dm).unwrap_or(&self.orphan).clone(),
                Some((_, first)) if others.all(|(_, v)| v == first) => first.clone(),
                Some(_) => Coalitions::default(),
            }
        }
    }

    impl PreferenceOps {
        pub(crate) fn check_against_model(&self) {
            let mut prefs = SharedCoalitions::new(self.keep_shared);
            let mut model = PreferenceModel::default();
            let mut keep_shared = self.keep_shared;

            for op in &self.ops {
                match op {
                    PreferenceOp::AddKey(dm) => {
                        prefs.add_key(dm.clone());
                        let value = if keep_shared {
                            model.inherited(dm)
                        } else {
                            Coalitions::default()
                        };
                        model.values.insert(dm.clone(), value);
                    }
                    PreferenceOp::Put(dm, value) => {
                        prefs.put(dm.clone(), value.clone());
                        model.values.insert(dm.clone(), value.clone());
                    }
                    PreferenceOp::Empty(dm) => {
                        let result = prefs.empty(dm);
                        match model.values.get_mut(dm) {
                            None => assert_eq!(result, Err(DirectoryError::unknown_key(dm))),
                            Some(value) => {
                                assert_eq!(result, Ok(!value.is_empty()), "{op:?}");
                                value.clear();
                            }
                        }
                    }
                    PreferenceOp::Remove(dm) => {
                        let result = prefs.remove(dm);
                        match model.values.remove(dm) {
                            None => assert_eq!(result, Err(DirectoryError::unknown_key(dm))),
                            Some(removed) => {
                                assert_eq!(result, Ok(()));
                                if model.values.is_empty() {
                                    model.orphan = if keep_shared {
                                        removed
                                    } else {
                                        Coalitions::default()
                                    };
                                }
                            }
                        }
                    }
                    PreferenceOp::SetKeepShared(keep) => {
                        prefs.set_keep_shared(*keep);
                        keep_shared = *keep;
                    }
                    PreferenceOp::Merge(other) => {
                        let changed = prefs.merge(other);
                        let mut expected = false;
                        if model.values.is_empty() {
                            expected = model.orphan.merge_from(other);
                        }
                        for value in model.values.values_mut() {
                            expected |= value.merge_from(other);
                        }
                        assert_eq!(changed, expected, "{op:?}");
                    }
                    PreferenceOp::Shared => {
                        assert_eq!(prefs.shared(), &model.shared(), "{op:?}");
                    }
                }

                assert_eq!(prefs.len(), model.values.len(), "after {op:?}");
                for (dm, value) in &model.values {
                    assert_eq!(prefs.get(dm), Ok(value), "after {op:?}");
                }
                prefs.directory().assert_invariants();
            }

            assert_eq!(prefs.shared(), &model.shared());
        }
    }
}
