use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Opaque numeric user identity.
///
/// Stable for the user's lifetime; primary key across access records, ban
/// entries and cache entries.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Validated display nickname: two capitalized word-tokens joined by an
/// underscore (`Name_Surname`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nickname(String);

fn nickname_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z][a-zA-Z]*_[A-Z][a-zA-Z]*$").expect("nickname pattern compiles")
    })
}

impl Nickname {
    /// Validate and wrap user-submitted input.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if nickname_pattern().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(DomainError::validation(format!(
                "nickname '{trimmed}' does not match the Name_Surname format"
            )))
        }
    }

    /// Wrap a nickname that was already validated at filing time, e.g. one
    /// read back from the store.
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nickname {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_nicknames() {
        for raw in ["Ivan_Petrov", "Ab_Cd", "X_Y", "McLovin_Da"] {
            assert!(Nickname::parse(raw).is_ok(), "expected {raw} to parse");
        }
    }

    #[test]
    fn rejects_malformed_nicknames() {
        for raw in [
            "ivan_Petrov",
            "Ivan_petrov",
            "Ivan Petrov",
            "Ivan",
            "Ivan_",
            "_Petrov",
            "Ivan__Petrov",
            "Ivan_Petrov2",
            "",
        ] {
            assert!(
                matches!(Nickname::parse(raw), Err(DomainError::Validation(_))),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let nick = Nickname::parse("  Ivan_Petrov ").unwrap();
        assert_eq!(nick.as_str(), "Ivan_Petrov");
    }
}
