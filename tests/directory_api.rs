//! Integration tests for the public directory API.

use insta::assert_snapshot;
use mcda_prefs::{SharedValueDirectory, SharingState, strategy::DefaultStrategy};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

type Directory = SharedValueDirectory<String, DefaultStrategy<Vec<u32>>>;

fn render(directory: &Directory) -> String {
    let mut entries: Vec<_> = directory.iter().collect();
    entries.sort();
    let mut lines = vec![format!("{:?}", directory.sharing_state())];
    lines.extend(entries.into_iter().map(|(k, v)| format!("{k}: {v:?}")));
    lines.join("\n")
}

#[test]
fn diverge_and_reconcile() {
    mcda_prefs::enable_determinism();
    let mut directory = Directory::with_capacity(DefaultStrategy::new(), 4);
    assert_eq!(directory.update_shared(), SharingState::SharedEmpty);

    directory.put("alice".to_owned(), vec![1, 2]);
    directory.put_shared("bob".to_owned());
    directory.put_shared("carol".to_owned());
    assert_snapshot!(render(&directory), @r"
    SharedValue
    alice: [1, 2]
    bob: [1, 2]
    carol: [1, 2]
    ");

    directory.get_mut("carol").unwrap().push(3);
    assert_snapshot!(render(&directory), @r"
    Diverged
    alice: [1, 2]
    bob: [1, 2]
    carol: [1, 2, 3]
    ");
    assert_eq!(directory.shared(), &Vec::<u32>::new());

    directory.shared_mut().push(9);
    assert_snapshot!(render(&directory), @r"
    SharedValue
    alice: [9]
    bob: [9]
    carol: [9]
    ");
}

#[test]
fn empty_values_are_shared_too() {
    let mut directory = Directory::new(DefaultStrategy::new());
    assert!(directory.put_empty("alice".to_owned()));
    assert!(directory.put_empty("bob".to_owned()));
    assert!(!directory.put_empty("bob".to_owned()));
    assert_eq!(directory.update_shared(), SharingState::SharedEmpty);
    assert_eq!(directory.get_non_empty("alice"), Ok(None));

    // modifiers that leave empty values alone can skip them entirely
    let changed = directory.apply_to_all(
        |v| {
            let before = v.len();
            v.retain(|x| *x != 1);
            v.len() != before
        },
        false,
    );
    assert!(!changed);
    assert_eq!(directory.sharing_state(), SharingState::SharedEmpty);
}

#[quickcheck]
fn shared_discovery(keys: Vec<String>, value: Vec<u32>) -> TestResult {
    if keys.is_empty() {
        return TestResult::discard();
    }
    let mut directory = Directory::new(DefaultStrategy::new());
    for key in keys {
        directory.put(key, value.clone());
    }
    TestResult::from_bool(*directory.shared() == value)
}

#[quickcheck]
fn divergence_detection(keys: Vec<String>, a: Vec<u32>, b: Vec<u32>) -> TestResult {
    let mut keys = keys;
    keys.sort();
    keys.dedup();
    if keys.len() < 2 || a == b {
        return TestResult::discard();
    }
    let mut directory = Directory::new(DefaultStrategy::new());
    let (first, rest) = keys.split_first().unwrap();
    for key in rest {
        directory.put(key.clone(), a.clone());
    }
    directory.put(first.clone(), b.clone());

    TestResult::from_bool(
        directory.update_shared() == SharingState::Diverged
            && directory.shared().is_empty()
            && directory.get(first.as_str()) == Ok(&b)
            && rest.iter().all(|k| directory.get(k.as_str()) == Ok(&a)),
    )
}

#[quickcheck]
fn update_then_commit(values: Vec<(String, Vec<u32>)>, shared: Vec<u32>) -> bool {
    let mut directory = Directory::new(DefaultStrategy::new());
    for (key, value) in values {
        directory.put(key, value);
    }
    *directory.shared_mut() = shared.clone();
    directory.iter().all(|(_, v)| *v == shared) && *directory.shared() == shared
}

#[test]
fn removal_preserves_minority() {
    let mut directory = Directory::new(DefaultStrategy::new());
    for key in ["a1", "a2", "a3"] {
        directory.put(key.to_owned(), vec![1]);
    }
    directory.put("b".to_owned(), vec![2]);
    assert_eq!(directory.update_shared(), SharingState::Diverged);

    directory.remove("b", false).unwrap();
    assert_eq!(directory.shared(), &vec![1]);
    assert_eq!(directory.sharing_state(), SharingState::SharedValue);
}

#[test]
fn unknown_keys() {
    let mut directory = Directory::new(DefaultStrategy::new());
    let err = directory.remove("ghost", true).unwrap_err();
    assert_eq!(err.to_string(), r#"unknown key "ghost""#);
    assert!(directory.get("ghost").is_err());
    assert!(directory.is_empty());
}
