use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::jsonc;

use super::metadata::RepoMetadata;

/// Supported code host provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    #[serde(rename = "GITHUB")]
    Github,
    #[serde(rename = "GITLAB")]
    Gitlab,
    #[serde(rename = "BITBUCKETSERVER")]
    BitbucketServer,
    #[serde(rename = "AWSCODECOMMIT")]
    AwsCodeCommit,
}

impl ServiceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Github => "GITHUB",
            ServiceKind::Gitlab => "GITLAB",
            ServiceKind::BitbucketServer => "BITBUCKETSERVER",
            ServiceKind::AwsCodeCommit => "AWSCODECOMMIT",
        }
    }

    /// Case-insensitive parse, accepting both the catalog spelling
    /// (`GITHUB`) and provider service types (`github`, `bitbucketServer`).
    pub fn parse(s: &str) -> Option<ServiceKind> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Some(ServiceKind::Github),
            "gitlab" => Some(ServiceKind::Gitlab),
            "bitbucketserver" => Some(ServiceKind::BitbucketServer),
            "awscodecommit" => Some(ServiceKind::AwsCodeCommit),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServiceKind::parse(s).ok_or_else(|| Error::Config(format!("unknown service kind {s:?}")))
    }
}

/// The provider's own identity triple for a repository. This, not the
/// catalog name, is the durable reconciliation key: names can be renamed
/// upstream while the provider ID stays put.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRepoSpec {
    pub id: String,
    pub service_type: String,
    pub service_id: String,
}

impl ExternalRepoSpec {
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.id.is_empty() && !self.service_type.is_empty() && !self.service_id.is_empty()
    }
}

/// One configured connection's view of a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// URN of the owning external service.
    pub id: String,
    /// Clone URL as resolved by that connection; may embed credentials.
    pub clone_url: String,
}

/// Canonical internal representation of one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: i64,
    /// Host-qualified path, e.g. `github.com/foo/bar`. Unique among
    /// non-deleted repos.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub enabled: bool,
    pub external_repo: ExternalRepoSpec,
    /// External-service URN -> that service's view. Empty means the repo is
    /// not managed by any configured connection.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceInfo>,
    #[serde(default)]
    pub metadata: Option<RepoMetadata>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Repo {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Clone URLs of all sources, in stable URN order.
    #[must_use]
    pub fn clone_urls(&self) -> Vec<&str> {
        self.sources
            .values()
            .map(|s| s.clone_url.as_str())
            .filter(|url| !url.is_empty())
            .collect()
    }

    /// Merges descriptive fields from a fresher observation of the same
    /// external identity. Sources, id and created_at are left alone; a
    /// previously soft-deleted repo is resurrected.
    pub fn update_from(&mut self, fresh: &Repo) {
        self.name = fresh.name.clone();
        self.description = fresh.description.clone();
        self.language = fresh.language.clone();
        self.fork = fresh.fork;
        self.archived = fresh.archived;
        self.external_repo = fresh.external_repo.clone();
        self.metadata = fresh.metadata.clone();
        self.deleted_at = None;
    }

    /// The `{id, name}` pair an exclusion rule for this repo should carry.
    /// Derived from provider metadata when present; otherwise falls back to
    /// the external ID and the name with its host prefix dropped.
    #[must_use]
    pub fn exclude_rule(&self) -> ExcludeRule {
        if let Some(md) = &self.metadata {
            let rule = md.exclude_rule();
            if rule.id.is_some() || rule.name.is_some() {
                return rule;
            }
        }
        ExcludeRule {
            id: (!self.external_repo.id.is_empty()).then(|| self.external_repo.id.clone()),
            name: Some(name_without_host(&self.name).to_string()),
        }
    }
}

/// Strips the leading host segment of a catalog name:
/// `github.com/foo/bar` -> `foo/bar`.
fn name_without_host(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => name,
    }
}

/// One `{name?, id?}` entry of a connection's `exclude` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One configured connection to a code host provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalService {
    pub id: i64,
    pub kind: ServiceKind,
    pub display_name: String,
    /// Connection configuration as JSON-with-comments text.
    pub config: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ExternalService {
    /// Stable identity used as the `sources` map key. Never collides across
    /// services because the store-assigned id is unique.
    #[must_use]
    pub fn urn(&self) -> String {
        format!("extsvc:{}:{}", self.kind.as_str().to_ascii_lowercase(), self.id)
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Decoded `exclude` rules of this connection's configuration.
    pub fn exclude_rules(&self) -> Result<Vec<ExcludeRule>> {
        let config = jsonc::parse(&self.config)?;
        match config.get("exclude") {
            Some(rules) => serde_json::from_value(rules.clone()).map_err(Error::from),
            None => Ok(Vec::new()),
        }
    }

    /// Appends an exclusion rule for `repo` to this connection's
    /// configuration. Already-present rules are not duplicated.
    pub fn exclude(&mut self, repo: &Repo) -> Result<()> {
        let rule = repo.exclude_rule();
        if rule.id.is_none() && rule.name.is_none() {
            return Err(Error::Config(format!(
                "repo {:?} carries no excludable identity",
                repo.name
            )));
        }

        let mut config = jsonc::parse(&self.config)?;
        let obj = config
            .as_object_mut()
            .ok_or_else(|| Error::Config("external service config is not an object".to_string()))?;

        let mut rules: Vec<ExcludeRule> = match obj.get("exclude") {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => Vec::new(),
        };
        if !rules.contains(&rule) {
            rules.push(rule);
        }
        obj.insert("exclude".to_string(), serde_json::to_value(&rules)?);

        self.config = jsonc::format(&config)?;
        Ok(())
    }
}

/// Parses the store-assigned service id out of a `sources` URN.
pub fn service_id_from_urn(urn: &str) -> Option<i64> {
    urn.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::metadata::GithubRepo;

    fn github_service() -> ExternalService {
        ExternalService {
            id: 1,
            kind: ServiceKind::Github,
            display_name: "github.com - test".to_string(),
            config: r#"
            {
                // Some comment
                "url": "https://github.com",
                "repositoryQuery": ["none"],
                "token": "secret"
            }"#
            .to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn github_repo() -> Repo {
        Repo {
            name: "github.com/foo/bar".to_string(),
            external_repo: ExternalRepoSpec {
                id: "bar".to_string(),
                service_type: "github".to_string(),
                service_id: "http://github.com".to_string(),
            },
            metadata: Some(RepoMetadata::Github(GithubRepo {
                id: "bar".to_string(),
                name_with_owner: "foo/bar".to_string(),
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_urn_is_stable_function_of_kind_and_id() {
        let svc = github_service();
        assert_eq!(svc.urn(), "extsvc:github:1");
        assert_eq!(service_id_from_urn(&svc.urn()), Some(1));
    }

    #[test]
    fn test_exclude_appends_rule_and_keeps_config_fields() {
        let mut svc = github_service();
        svc.exclude(&github_repo()).unwrap();

        let config = jsonc::parse(&svc.config).unwrap();
        assert_eq!(config["url"], "https://github.com");
        assert_eq!(config["token"], "secret");
        assert_eq!(config["repositoryQuery"][0], "none");

        let rules = svc.exclude_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id.as_deref(), Some("bar"));
        assert_eq!(rules[0].name.as_deref(), Some("foo/bar"));
    }

    #[test]
    fn test_exclude_does_not_duplicate_rules() {
        let mut svc = github_service();
        let repo = github_repo();
        svc.exclude(&repo).unwrap();
        svc.exclude(&repo).unwrap();
        assert_eq!(svc.exclude_rules().unwrap().len(), 1);
    }

    #[test]
    fn test_exclude_rule_falls_back_to_external_identity() {
        let repo = Repo {
            name: "gitolite.example.com/oldschool".to_string(),
            external_repo: ExternalRepoSpec {
                id: "nosources".to_string(),
                service_type: "gitolite".to_string(),
                service_id: "http://gitolite.my.corp".to_string(),
            },
            ..Default::default()
        };
        let rule = repo.exclude_rule();
        assert_eq!(rule.id.as_deref(), Some("nosources"));
        assert_eq!(rule.name.as_deref(), Some("oldschool"));
    }

    #[test]
    fn test_clone_urls_follow_urn_order() {
        let mut repo = github_repo();
        repo.sources.insert(
            "extsvc:github:2".to_string(),
            SourceInfo {
                id: "extsvc:github:2".to_string(),
                clone_url: "https://two@github.com/foo/bar".to_string(),
            },
        );
        repo.sources.insert(
            "extsvc:github:1".to_string(),
            SourceInfo {
                id: "extsvc:github:1".to_string(),
                clone_url: "https://one@github.com/foo/bar".to_string(),
            },
        );
        assert_eq!(
            repo.clone_urls(),
            vec![
                "https://one@github.com/foo/bar",
                "https://two@github.com/foo/bar",
            ]
        );
    }

    #[test]
    fn test_update_from_resurrects_and_merges_descriptive_fields() {
        let mut stored = github_repo();
        stored.id = 7;
        stored.deleted_at = Some(Utc::now());
        stored.sources.insert(
            "extsvc:github:1".to_string(),
            SourceInfo::default(),
        );

        let mut fresh = github_repo();
        fresh.name = "github.com/foo/renamed".to_string();
        fresh.description = "fresh description".to_string();
        fresh.archived = true;

        stored.update_from(&fresh);
        assert_eq!(stored.id, 7);
        assert_eq!(stored.name, "github.com/foo/renamed");
        assert_eq!(stored.description, "fresh description");
        assert!(stored.archived);
        assert!(stored.deleted_at.is_none());
        assert_eq!(stored.sources.len(), 1);
    }

    #[test]
    fn test_service_kind_parse_accepts_service_types() {
        assert_eq!(ServiceKind::parse("github"), Some(ServiceKind::Github));
        assert_eq!(
            ServiceKind::parse("bitbucketServer"),
            Some(ServiceKind::BitbucketServer)
        );
        assert_eq!(ServiceKind::parse("GITLAB"), Some(ServiceKind::Gitlab));
        assert_eq!(ServiceKind::parse("gitolite"), None);
    }
}
