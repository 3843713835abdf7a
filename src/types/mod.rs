mod metadata;
mod models;

pub use metadata::{
    BitbucketServerRepo, CodeCommitRepo, GithubRepo, GitlabProject, RepoLinks, RepoMetadata,
};
pub use models::{
    ExcludeRule, ExternalRepoSpec, ExternalService, Repo, ServiceKind, SourceInfo,
    service_id_from_urn,
};
