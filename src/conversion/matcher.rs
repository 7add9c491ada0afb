// src/conversion/matcher.rs

//! Exact package matching
//!
//! A candidate collection matches a package only when the two are equal
//! element-for-element after sorting. There is no partial credit: subsets,
//! supersets and overlaps are all non-matches.

use super::multiset::{MatchSemantics, PrestationIdMultiset};
use crate::catalog::PackageCatalog;
use crate::db::models::Package;
use crate::error::Result;
use std::cmp::Reverse;
use tracing::{debug, warn};

/// Finds the catalog package whose membership equals a candidate collection
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageMatcher {
    semantics: MatchSemantics,
}

impl PackageMatcher {
    pub fn new(semantics: MatchSemantics) -> Self {
        Self { semantics }
    }

    pub fn semantics(&self) -> MatchSemantics {
        self.semantics
    }

    /// Pure matching against a catalog snapshot
    ///
    /// Only active packages are considered. When several packages share the
    /// candidate membership (duplicate bundles in the catalog) the one with
    /// more members wins, then the smallest id.
    pub fn find_exact_match<'p>(
        &self,
        candidates: &PrestationIdMultiset,
        packages: &'p [Package],
    ) -> Option<&'p Package> {
        if candidates.is_empty() {
            return None;
        }

        let mut matches: Vec<&Package> = packages
            .iter()
            .filter(|package| package.is_active && !package.member_prestation_ids.is_empty())
            .filter(|package| {
                let members = PrestationIdMultiset::from(package.member_prestation_ids.as_slice());
                candidates.matches(&members, self.semantics)
            })
            .collect();

        if matches.len() > 1 {
            warn!(
                "{} catalog packages share membership {:?}; picking deterministically",
                matches.len(),
                candidates.as_slice()
            );
        }

        matches.sort_by_key(|package| (Reverse(package.member_count()), package.id));
        let chosen = matches.into_iter().next();

        if let Some(package) = chosen {
            debug!("Candidates {:?} match package {:?} '{}'", candidates.as_slice(), package.id, package.name);
        }
        chosen
    }

    /// Match against the catalog's current contents
    pub fn find_exact_match_in<C: PackageCatalog>(
        &self,
        catalog: &C,
        candidates: &PrestationIdMultiset,
    ) -> Result<Option<Package>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let packages = catalog.find_all()?;
        Ok(self.find_exact_match(candidates, &packages).cloned())
    }
}
