//! Owned collection of per-subset repositories.

use crate::repository::RespondentRepository;
use quota_core::{Error, Result, Subset};
use std::collections::BTreeMap;
use tracing::debug;

/// One [`RespondentRepository`] per subset.
///
/// Filled at load time, then shared by reference for queries.
#[derive(Debug, Clone, Default)]
pub struct RespondentRepositorySource {
    repositories: BTreeMap<Subset, RespondentRepository>,
}

impl RespondentRepositorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository for `subset`, created empty on first use.
    pub fn get_or_create(&mut self, subset: &Subset) -> &mut RespondentRepository {
        self.repositories.entry(subset.clone()).or_insert_with(|| {
            debug!(subset = %subset, "created respondent repository");
            RespondentRepository::new(subset.clone())
        })
    }

    /// Add a repository built elsewhere (e.g. on another thread).
    ///
    /// Fails if the subset already has one.
    pub fn insert(&mut self, repository: RespondentRepository) -> Result<()> {
        let subset = repository.subset().clone();
        if self.repositories.contains_key(&subset) {
            return Err(Error::data(format!("repository for subset {subset} already loaded")));
        }
        debug!(subset = %subset, respondents = repository.count(), "loaded respondent repository");
        self.repositories.insert(subset, repository);
        Ok(())
    }

    /// Repository for `subset`.
    pub fn get_for_subset(&self, subset: &Subset) -> Result<&RespondentRepository> {
        self.repositories
            .get(subset)
            .ok_or_else(|| Error::data(format!("no respondent repository for subset {subset}")))
    }

    pub fn subsets(&self) -> impl Iterator<Item = &Subset> {
        self.repositories.keys()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
