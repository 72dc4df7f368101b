// 🏷️ Identifiers
// Banks, activities, services and hazards are distinct identifier spaces.
// Keeping them as separate types stops a service id being looked up in a
// hazard column at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute tolerance used for every "sums to 1.0" check.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

identifier!(
    /// Financial institution holding a portfolio.
    BankId
);
identifier!(
    /// Economic activity (sector / NACE-like code).
    ActivityId
);
identifier!(
    /// Ecosystem service, e.g. pollination or water regulation.
    ServiceId
);
identifier!(
    /// Climate hazard factor, e.g. floods or transition risk.
    HazardId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_order_by_string() {
        let mut ids = vec![BankId::from("b"), BankId::from("a"), BankId::from("c")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(ids[2].to_string(), "c");
    }

    #[test]
    fn test_identifier_serializes_as_plain_string() {
        let json = serde_json::to_string(&ServiceId::from("pollination")).unwrap();
        assert_eq!(json, "\"pollination\"");
    }
}
