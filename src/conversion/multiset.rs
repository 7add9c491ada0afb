// src/conversion/multiset.rs

//! Sorted collections of prestation ids and their comparison contract
//!
//! A `PrestationIdMultiset` keeps its ids sorted at all times, so two
//! values are equal exactly when they hold the same ids with the same
//! multiplicities. Whether multiplicity matters when matching against a
//! package is a business rule, expressed as `MatchSemantics`.

use crate::ids::PrestationId;
use serde::{Deserialize, Serialize};

/// How candidate ids are compared with a package's membership
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSemantics {
    /// Two occurrences of the same prestation are two distinct billables
    #[default]
    Multiset,
    /// Repeated prestations collapse to one before comparison
    Set,
}

impl MatchSemantics {
    pub fn as_str(&self) -> &str {
        match self {
            MatchSemantics::Multiset => "multiset",
            MatchSemantics::Set => "set",
        }
    }
}

/// Sorted bag of prestation ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<PrestationId>", into = "Vec<PrestationId>")]
pub struct PrestationIdMultiset {
    ids: Vec<PrestationId>,
}

impl PrestationIdMultiset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[PrestationId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = PrestationId> + '_ {
        self.ids.iter().copied()
    }

    /// How many times `id` occurs
    pub fn count(&self, id: PrestationId) -> usize {
        let start = self.ids.partition_point(|x| *x < id);
        let end = self.ids.partition_point(|x| *x <= id);
        end - start
    }

    pub fn contains(&self, id: PrestationId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn insert(&mut self, id: PrestationId) {
        let at = self.ids.partition_point(|x| *x <= id);
        self.ids.insert(at, id);
    }

    /// Concatenate another bag into this one (no de-duplication)
    pub fn extend_from(&mut self, other: &PrestationIdMultiset) {
        self.ids.extend_from_slice(&other.ids);
        self.ids.sort_unstable();
    }

    /// Remove one occurrence of `id`, returning whether it was present
    pub fn remove_one(&mut self, id: PrestationId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(at) => {
                self.ids.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Same ids with every multiplicity reduced to one
    pub fn to_set(&self) -> Self {
        let mut ids = self.ids.clone();
        ids.dedup();
        Self { ids }
    }

    pub fn has_duplicates(&self) -> bool {
        self.ids.windows(2).any(|pair| pair[0] == pair[1])
    }

    /// Element-for-element comparison under the given semantics
    ///
    /// Exact equality only: a subset or superset never matches.
    pub fn matches(&self, other: &PrestationIdMultiset, semantics: MatchSemantics) -> bool {
        match semantics {
            MatchSemantics::Multiset => self.ids == other.ids,
            MatchSemantics::Set => self.to_set() == other.to_set(),
        }
    }
}

impl FromIterator<PrestationId> for PrestationIdMultiset {
    fn from_iter<I: IntoIterator<Item = PrestationId>>(iter: I) -> Self {
        let mut ids: Vec<PrestationId> = iter.into_iter().collect();
        ids.sort_unstable();
        Self { ids }
    }
}

impl From<Vec<PrestationId>> for PrestationIdMultiset {
    fn from(ids: Vec<PrestationId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<&[PrestationId]> for PrestationIdMultiset {
    fn from(ids: &[PrestationId]) -> Self {
        ids.iter().copied().collect()
    }
}

impl From<PrestationIdMultiset> for Vec<PrestationId> {
    fn from(multiset: PrestationIdMultiset) -> Self {
        multiset.ids
    }
}
