mod mem;
mod schema;
mod sqlite;

pub use mem::MemStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::{ExternalRepoSpec, ExternalService, Repo, ServiceKind};

/// Filter for listing external services. Empty fields match everything;
/// soft-deleted services are never returned.
#[derive(Debug, Clone, Default)]
pub struct ExternalServiceListArgs {
    pub ids: Vec<i64>,
    pub kinds: Vec<ServiceKind>,
}

impl ExternalServiceListArgs {
    #[must_use]
    pub fn ids(ids: Vec<i64>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn kinds(kinds: Vec<ServiceKind>) -> Self {
        Self {
            kinds,
            ..Default::default()
        }
    }
}

/// Store defines the persistence interface for repos and external services.
///
/// Implementations must be safe under concurrent callers: each upsert batch is
/// a single atomic unit, and writes to the same entity are serialized so that
/// concurrent sync passes over different connections cannot lose updates.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Inserts or updates repos, keyed on the external identity triple for
    /// rows without an id. Store-assigned ids are written back into `repos`.
    fn upsert_repos(&self, repos: &mut [Repo]) -> Result<()>;

    /// Inserts or updates external services. Assigned ids are written back.
    fn upsert_external_services(&self, svcs: &mut [ExternalService]) -> Result<()>;

    fn list_external_services(
        &self,
        args: &ExternalServiceListArgs,
    ) -> Result<Vec<ExternalService>>;

    fn get_repo_by_name(&self, name: &str) -> Result<Option<Repo>>;
    fn get_repo_by_id(&self, id: i64) -> Result<Option<Repo>>;
    fn get_repo_by_external_id(&self, spec: &ExternalRepoSpec) -> Result<Option<Repo>>;

    /// Active repos carrying a `sources` entry for the given service URN.
    fn list_repos_by_source(&self, urn: &str) -> Result<Vec<Repo>>;
}
