use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A named, independently grantable permission.
///
/// The known set is fixed at build time; adding a capability means extending
/// this enum and [`Capability::ALL`].
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Mine,
    Oskolki,
}

impl Capability {
    /// Every capability the engine knows about.
    pub const ALL: [Capability; 2] = [Capability::Mine, Capability::Oskolki];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mine => "mine",
            Self::Oskolki => "oskolki",
        }
    }

    /// Single-letter code used in the compact wire form.
    pub fn code(self) -> char {
        match self {
            Self::Mine => 'm',
            Self::Oskolki => 'o',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.code() == code)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.name() == s)
            .ok_or_else(|| DomainError::invalid_id(format!("unknown capability '{s}'")))
    }
}

/// Canonical mapping of capability → granted flag for one user.
///
/// Absence of a capability is equivalent to "not granted".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    granted: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known capability granted.
    pub fn all() -> Self {
        Self {
            granted: Capability::ALL.into_iter().collect(),
        }
    }

    pub fn of(caps: &[Capability]) -> Self {
        Self {
            granted: caps.iter().copied().collect(),
        }
    }

    pub fn grant(&mut self, cap: Capability) {
        self.granted.insert(cap);
    }

    pub fn revoke(&mut self, cap: Capability) {
        self.granted.remove(&cap);
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.granted.contains(&cap)
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.granted.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.granted.iter().copied()
    }

    /// Union with `other`. Merging never removes a grant.
    pub fn merge(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet {
            granted: self.granted.union(&other.granted).copied().collect(),
        }
    }

    pub fn intersect(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet {
            granted: self.granted.intersection(&other.granted).copied().collect(),
        }
    }

    /// Known capabilities not yet granted.
    pub fn missing(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|cap| !self.granted.contains(cap))
            .collect()
    }

    /// Compact wire form: each known capability collapses to `<code><0|1>`,
    /// e.g. `m1o0`. Lets a reviewer action be correlated with the requested
    /// set without a store round-trip.
    pub fn compact(&self) -> String {
        let mut out = String::with_capacity(Capability::ALL.len() * 2);
        for cap in Capability::ALL {
            out.push(cap.code());
            out.push(if self.contains(cap) { '1' } else { '0' });
        }
        out
    }

    /// Parse the compact form. Unknown codes and trailing garbage are
    /// ignored; anything unparseable reads as "not requested".
    pub fn from_compact(raw: &str) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        let mut chars = raw.chars();
        while let Some(code) = chars.next() {
            let Some(flag) = chars.next() else { break };
            if flag == '1' {
                if let Some(cap) = Capability::from_code(code) {
                    set.grant(cap);
                }
            }
        }
        set
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}
