// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Declares a string-backed identifier type.
///
/// The generated type is a transparent newtype around `String` that borrows as `str`, so maps
/// keyed by it can be queried with plain string slices.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}
pub(crate) use id_type;

/// Convenience macro for creating a [`Coalitions`](crate::preferences::Coalitions) value.
///
/// ```rust
/// # use mcda_prefs::coalitions;
/// let c = coalitions! { "price" => 0.5, "comfort" => 0.25 };
/// assert_eq!(c.weight("price"), Some(0.5));
/// assert_eq!(c.majority_threshold(), None);
///
/// let c = coalitions! { majority = 0.6; "price" => 0.5, "comfort" => 0.25 };
/// assert_eq!(c.majority_threshold(), Some(0.6));
/// ```
///
/// Weights of repeated criteria overwrite earlier ones.
#[macro_export]
macro_rules! coalitions {
    (majority = $threshold:expr; $($criterion:literal => $weight:expr),* $(,)?) => {
        {
            let mut coalitions = $crate::coalitions!($($criterion => $weight),*);
            coalitions.set_majority_threshold(Some($threshold));
            coalitions
        }
    };
    ($($criterion:literal => $weight:expr),* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut coalitions = $crate::preferences::Coalitions::new();
            $( coalitions.set_weight($criterion, $weight); )*
            coalitions
        }
    };
}
