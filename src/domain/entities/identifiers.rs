//! Old-to-new slide identifier tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::slide::SlideId;

/// Fixed mapping from superseded slide identifiers to current ones.
///
/// Entries that map an identifier to itself are identity fallbacks and never
/// count as renames.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierMap(BTreeMap<SlideId, SlideId>);

impl IdentifierMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapped identifier for `old`, if any.
    #[must_use]
    pub fn lookup(&self, old: &SlideId) -> Option<&SlideId> {
        self.0.get(old)
    }

    /// Returns the mapped identifier only when it differs from `old`.
    #[must_use]
    pub fn rename_of(&self, old: &SlideId) -> Option<&SlideId> {
        self.lookup(old).filter(|new| *new != old)
    }

    /// Follows renames from `old` to the identifier at the end of the chain.
    ///
    /// Returns the target and the number of hops taken, or `None` if `old` is
    /// not renamed or the chain loops back on itself.
    #[must_use]
    pub fn final_target(&self, old: &SlideId) -> Option<(&SlideId, usize)> {
        let mut seen = BTreeSet::from([old]);
        let mut current = self.rename_of(old)?;
        let mut hops = 1;
        while let Some(next) = self.rename_of(current) {
            if !seen.insert(current) {
                return None;
            }
            current = next;
            hops += 1;
        }
        Some((current, hops))
    }

    /// Iterates over pairs that actually rename an identifier.
    pub fn renames(&self) -> impl Iterator<Item = (&SlideId, &SlideId)> {
        self.0.iter().filter(|(old, new)| old != new)
    }

    /// Number of entries, identity entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<O, N> FromIterator<(O, N)> for IdentifierMap
where
    O: Into<SlideId>,
    N: Into<SlideId>,
{
    fn from_iter<I: IntoIterator<Item = (O, N)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(old, new)| (old.into(), new.into()))
                .collect(),
        )
    }
}
