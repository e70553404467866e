//! Version value type: a positive integer with total order, centralising the
//! precondition arithmetic the rest of the engine relies on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// A positive, monotonically increasing configuration version.
///
/// Constructed only through [`Version::initial`] or [`Version::try_from_u64`];
/// arithmetic never wraps or underflows below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version assigned to a freshly created configuration.
    pub fn initial() -> Self {
        Version(1)
    }

    /// Construct a version from a raw integer, rejecting anything below 1.
    pub fn try_from_u64(raw: u64) -> Result<Self, ConfigError> {
        if raw < 1 {
            return Err(ConfigError::InvalidVersion { value: raw });
        }
        Ok(Version(raw))
    }

    /// The next version after this one.
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }

    /// Whether this is the initial version (1).
    pub fn is_initial(self) -> bool {
        self.0 == 1
    }

    /// The raw integer value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Version {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Version::try_from_u64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_one() {
        assert_eq!(Version::initial().get(), 1);
        assert!(Version::initial().is_initial());
    }

    #[test]
    fn next_increments_by_one() {
        let v = Version::initial();
        assert_eq!(v.next().get(), 2);
        assert_eq!(v.next().next().get(), 3);
    }

    #[test]
    fn rejects_zero() {
        assert!(matches!(
            Version::try_from_u64(0),
            Err(ConfigError::InvalidVersion { value: 0 })
        ));
    }

    #[test]
    fn total_order() {
        let a = Version::try_from_u64(3).unwrap();
        let b = Version::try_from_u64(5).unwrap();
        assert!(a < b);
        assert!(b > a);
        assert_eq!(a, Version::try_from_u64(3).unwrap());
    }

    #[test]
    fn serde_roundtrip() {
        let v = Version::try_from_u64(42).unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "42");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
