// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use std::fmt;

/// Error returned by the fallible operations of a [`SharedValueDirectory`](crate::SharedValueDirectory)
/// and the preference containers built on top of it.
///
/// Every operation validates its input before touching any state, so a returned error implies that
/// the directory is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The key is not present in the directory.
    #[error("unknown key {key}")]
    UnknownKey {
        /// `Debug` rendering of the offending key.
        key: String,
    },
}

impl DirectoryError {
    pub(crate) fn unknown_key<Q>(key: &Q) -> Self
    where
        Q: fmt::Debug + ?Sized,
    {
        Self::UnknownKey {
            key: format!("{key:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_renders_the_key() {
        let err = DirectoryError::unknown_key("d7");
        assert_eq!(err.to_string(), r#"unknown key "d7""#);
    }
}
