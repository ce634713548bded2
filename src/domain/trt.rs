use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A tectonic region type (TRT), such as `Active Shallow Crust`.
///
/// TRTs partition both the sources of a source model and the ground-motion
/// model choices of a GSIM logic tree. The label is free text but must not be
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Trt(NonEmptyString);

impl Trt {
    /// Creates a new `Trt` from a string.
    ///
    /// Leading and trailing whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTrtError`] if the label is empty after trimming.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidTrtError> {
        let s = s.into();
        let trimmed = s.trim().to_string();
        NonEmptyString::new(trimmed)
            .map(Self)
            .map_err(|_| InvalidTrtError(s))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Trt {
    type Error = InvalidTrtError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Trt {
    type Error = InvalidTrtError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Trt> for String {
    fn from(trt: Trt) -> Self {
        trt.as_str().to_owned()
    }
}

impl AsRef<str> for Trt {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for Trt {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Trt {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for Trt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trt {
    type Err = InvalidTrtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when a tectonic region type label is empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid tectonic region type '{0}': must be non-empty")]
pub struct InvalidTrtError(String);

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn trims_whitespace() {
        let trt = Trt::new("  Stable Continental ").unwrap();
        assert_eq!(trt.as_str(), "Stable Continental");
    }

    #[test]
    fn rejects_blank_labels() {
        assert!(Trt::new("").is_err());
        assert!(Trt::new("   ").is_err());
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(Trt::new("Subduction Interface").unwrap(), 1);
        assert_eq!(map.get("Subduction Interface"), Some(&1));
    }

    #[test]
    fn deserializes_from_yaml_string() {
        let trt: Trt = serde_yaml::from_str("Active Shallow Crust").unwrap();
        assert_eq!(trt.to_string(), "Active Shallow Crust");
        assert!(serde_yaml::from_str::<Trt>("''").is_err());
    }
}
