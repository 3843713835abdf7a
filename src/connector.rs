//! Boundary to the per-provider wire clients. The clients themselves live
//! outside this crate; the server and syncer only depend on this trait and
//! receive implementations by injection.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Error;
use crate::server::protocol::RepoInfo;
use crate::types::{Repo, ServiceKind};

/// Failure modes of a direct lookup-by-name call.
///
/// `NotFound` and `Unauthoritative` both normalize to a not-found result at
/// the RPC layer: callers must not be able to distinguish "does not exist"
/// from "the provider could not conclusively say". Only `Upstream` (the
/// provider answered authoritatively with a real failure) propagates.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("repository {name:?} not found")]
    NotFound { name: String },

    #[error("provider could not resolve {name:?}: {reason}")]
    Unauthoritative { name: String, reason: String },

    #[error(transparent)]
    Upstream(#[from] Error),
}

/// One provider connection's listing/lookup capabilities.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Host segment the connection's repo names are qualified with,
    /// e.g. `github.com`.
    fn host(&self) -> &str;

    /// One full listing pass of the connection's repositories, already
    /// decoded to catalog shape. Pagination and rate limits are the wire
    /// client's business.
    async fn list_repos(&self) -> crate::error::Result<Vec<Repo>>;

    /// Authoritative lookup of a single repository by catalog name.
    /// `Ok(None)` means the provider answered and the repo does not exist.
    async fn get_by_name(&self, name: &str) -> Result<Option<RepoInfo>, LookupError>;
}
