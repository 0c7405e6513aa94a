//! Loadable unit identifiers and set arithmetic

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable name of a loadable unit (level, zone, sub-scene)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create a new unit ID
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the unit name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for UnitId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for UnitId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Remove duplicates, keeping the first occurrence of each unit
pub fn dedup(units: &[UnitId]) -> Vec<UnitId> {
    let mut seen = HashSet::with_capacity(units.len());
    units
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Units in `from` that are not in `without`, deduplicated, in `from` order
pub fn difference(from: &[UnitId], without: &[UnitId]) -> Vec<UnitId> {
    let excluded: HashSet<&UnitId> = without.iter().collect();
    let mut seen = HashSet::new();
    from.iter()
        .filter(|id| !excluded.contains(id) && seen.insert(*id))
        .cloned()
        .collect()
}

/// Convert anything name-like into a list of unit IDs
pub fn to_units<I, S>(names: I) -> Vec<UnitId>
where
    I: IntoIterator<Item = S>,
    S: Into<UnitId>,
{
    names.into_iter().map(Into::into).collect()
}
