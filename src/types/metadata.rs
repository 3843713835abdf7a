use serde::{Deserialize, Serialize};

use super::models::ExcludeRule;

/// Browse URL templates for a repository, derived from its provider metadata.
/// `{rev}`, `{path}` and `{commit}` are placeholders substituted by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLinks {
    pub root: String,
    pub tree: String,
    pub blob: String,
    pub commit: String,
}

/// Provider-specific repository payload, one variant per supported code host.
///
/// The variant tag mirrors `ExternalRepoSpec::service_type`, so a stored
/// metadata blob round-trips without dynamic type inspection at call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service_type")]
pub enum RepoMetadata {
    #[serde(rename = "github")]
    Github(GithubRepo),
    #[serde(rename = "gitlab")]
    Gitlab(GitlabProject),
    #[serde(rename = "bitbucketServer")]
    BitbucketServer(BitbucketServerRepo),
    #[serde(rename = "awscodecommit")]
    AwsCodeCommit(CodeCommitRepo),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubRepo {
    pub id: String,
    pub name_with_owner: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitlabProject {
    pub id: i64,
    pub path_with_namespace: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitbucketServerRepo {
    pub id: i64,
    pub slug: String,
    pub project_key: String,
    /// Self link of the repository browse page.
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub clone_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeCommitRepo {
    pub arn: String,
    pub account_id: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub http_clone_url: String,
}

impl RepoMetadata {
    /// Browse link templates for a repo named `name` (the catalog's
    /// host-qualified name). Returns `None` when the payload is missing the
    /// pieces the templates need.
    pub fn links(&self, name: &str) -> Option<RepoLinks> {
        match self {
            RepoMetadata::Github(_) => Some(RepoLinks {
                root: name.to_string(),
                tree: format!("{name}/tree/{{rev}}/{{path}}"),
                blob: format!("{name}/blob/{{rev}}/{{path}}"),
                commit: format!("{name}/commit/{{commit}}"),
            }),
            RepoMetadata::Gitlab(p) => {
                if p.web_url.is_empty() {
                    return None;
                }
                let root = p.web_url.trim_end_matches('/').to_string();
                Some(RepoLinks {
                    tree: format!("{root}/tree/{{rev}}/{{path}}"),
                    blob: format!("{root}/blob/{{rev}}/{{path}}"),
                    commit: format!("{root}/commit/{{commit}}"),
                    root,
                })
            }
            RepoMetadata::BitbucketServer(r) => {
                if r.href.is_empty() {
                    return None;
                }
                let root = r.href.trim_end_matches('/').to_string();
                Some(RepoLinks {
                    tree: format!("{root}/{{path}}?at={{rev}}"),
                    blob: format!("{root}/{{path}}?at={{rev}}"),
                    commit: format!(
                        "{}/commits/{{commit}}",
                        root.trim_end_matches("/browse")
                    ),
                    root,
                })
            }
            RepoMetadata::AwsCodeCommit(r) => {
                let region = codecommit_region(&r.arn)?;
                let root = format!(
                    "https://{region}.console.aws.amazon.com/codecommit/home#/repository/{}",
                    r.name
                );
                Some(RepoLinks {
                    tree: format!("{root}/browse/{{rev}}/--/{{path}}"),
                    blob: format!("{root}/browse/{{rev}}/--/{{path}}"),
                    commit: format!("{root}/commit/{{commit}}"),
                    root,
                })
            }
        }
    }

    /// Default clone URL for this repository, used when no configured
    /// connection has resolved one of its own.
    pub fn clone_url(&self) -> Option<String> {
        match self {
            RepoMetadata::Github(r) => {
                if r.url.is_empty() {
                    return None;
                }
                Some(format!("{}.git", with_scheme(&r.url)))
            }
            RepoMetadata::Gitlab(p) => {
                if p.web_url.is_empty() {
                    return None;
                }
                Some(format!("{}.git", with_scheme(&p.web_url)))
            }
            RepoMetadata::BitbucketServer(r) => {
                if r.clone_url.is_empty() {
                    None
                } else {
                    Some(r.clone_url.clone())
                }
            }
            RepoMetadata::AwsCodeCommit(r) => {
                if r.http_clone_url.is_empty() {
                    None
                } else {
                    Some(r.http_clone_url.clone())
                }
            }
        }
    }

    /// The `{id, name}` pair an exclusion rule for this repository carries.
    /// Names are provider-native (e.g. `owner/name`), not host-qualified.
    pub fn exclude_rule(&self) -> ExcludeRule {
        match self {
            RepoMetadata::Github(r) => ExcludeRule {
                id: some_nonempty(&r.id),
                name: some_nonempty(&r.name_with_owner),
            },
            RepoMetadata::Gitlab(p) => ExcludeRule {
                id: Some(p.id.to_string()),
                name: some_nonempty(&p.path_with_namespace),
            },
            RepoMetadata::BitbucketServer(r) => ExcludeRule {
                id: Some(r.id.to_string()),
                name: some_nonempty(&format!("{}/{}", r.project_key, r.slug)),
            },
            RepoMetadata::AwsCodeCommit(r) => ExcludeRule {
                id: some_nonempty(&r.id),
                name: some_nonempty(&r.name),
            },
        }
    }
}

fn some_nonempty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn with_scheme(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Region segment of a CodeCommit ARN, e.g.
/// `arn:aws:codecommit:us-west-1:999999999999:stripe-go` -> `us-west-1`.
fn codecommit_region(arn: &str) -> Option<&str> {
    let region = arn.split(':').nth(3)?;
    if region.is_empty() { None } else { Some(region) }
}
