//! Strongly-typed wrappers for game concepts
//!
//! Newtypes keep subtypes, counter kinds and names from being mixed up with
//! each other or with arbitrary strings.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_newtype!(
    /// Card subtype (creature type, land type, planeswalker type, etc.)
    ///
    /// Examples: "Goblin", "Aura", "Equipment", "Forest", "Jace"
    Subtype
);

string_newtype!(
    /// Counter kind (e.g. "+1/+1", "-1/-1", "loyalty", "charge")
    CounterType
);

string_newtype!(CardName);

string_newtype!(PlayerName);

impl Subtype {
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl CounterType {
    pub fn plus_one() -> Self {
        CounterType("+1/+1".to_string())
    }

    pub fn minus_one() -> Self {
        CounterType("-1/-1".to_string())
    }

    pub fn loyalty() -> Self {
        CounterType("loyalty".to_string())
    }

    pub fn is_plus_one(&self) -> bool {
        self.0 == "+1/+1"
    }

    pub fn is_minus_one(&self) -> bool {
        self.0 == "-1/-1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newtypes_are_transparent() {
        let subtype = Subtype::from("Goblin");
        assert_eq!(serde_json::to_string(&subtype).unwrap(), "\"Goblin\"");
        assert!(subtype.matches("goblin"));
        assert!(CounterType::from("+1/+1").is_plus_one());
        assert_eq!(CardName::new("Grizzly Bears").to_string(), "Grizzly Bears");
    }
}
