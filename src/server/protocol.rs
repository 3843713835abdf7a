//! Wire types of the internal RPC surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExternalRepoSpec, ExternalService, Repo, RepoLinks};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoLookupArgs {
    /// Host-qualified repository name, e.g. `github.com/foo/bar`.
    pub repo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoLookupResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoInfo>,
    /// True when the repository conclusively does not exist, or no resolver
    /// could say. Callers cannot tell the two cases apart.
    #[serde(default)]
    pub error_not_found: bool,
}

impl RepoLookupResult {
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            repo: None,
            error_not_found: true,
        }
    }

    #[must_use]
    pub fn found(repo: RepoInfo) -> Self {
        Self {
            repo: Some(repo),
            error_not_found: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsInfo {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_repo: Option<ExternalRepoSpec>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub vcs: VcsInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<RepoLinks>,
}

impl RepoInfo {
    /// Projects a stored repo to its lookup view. The clone URL comes from
    /// the first source in URN order, so the choice is stable for a given
    /// set of sources; links derive from the provider metadata.
    #[must_use]
    pub fn from_repo(repo: &Repo) -> Self {
        Self {
            external_repo: Some(repo.external_repo.clone()),
            name: repo.name.clone(),
            description: repo.description.clone(),
            fork: repo.fork,
            archived: repo.archived,
            vcs: VcsInfo {
                url: repo
                    .clone_urls()
                    .first()
                    .map(|url| (*url).to_string())
                    .unwrap_or_default(),
            },
            links: repo.metadata.as_ref().and_then(|md| md.links(&repo.name)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoUpdateRequest {
    pub name: String,
    /// Explicit clone URL; takes precedence over any stored source.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoUpdateResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeRepoRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRepoResponse {
    #[serde(default)]
    pub external_services: Vec<ExternalServiceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoExternalServicesRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoExternalServicesResponse {
    #[serde(default)]
    pub external_services: Vec<ExternalServiceView>,
}

/// Public projection of an external service record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalServiceView {
    pub id: i64,
    pub kind: String,
    pub display_name: String,
    pub config: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&ExternalService> for ExternalServiceView {
    fn from(svc: &ExternalService) -> Self {
        Self {
            id: svc.id,
            kind: svc.kind.as_str().to_string(),
            display_name: svc.display_name.clone(),
            config: svc.config.clone(),
            created_at: svc.created_at,
            updated_at: svc.updated_at,
            deleted_at: svc.deleted_at,
        }
    }
}
