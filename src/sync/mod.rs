mod exclusion;

pub use exclusion::ExcludeFilter;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::connector::Connector;
use crate::error::Result;
use crate::store::Store;
use crate::types::{ExternalRepoSpec, ExternalService, Repo, SourceInfo};

/// One configured connection paired with the wire client that serves it.
pub struct SyncSource {
    pub service: ExternalService,
    pub connector: Arc<dyn Connector>,
}

/// Outcome of one connection's reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSummary {
    pub urn: String,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub urn: String,
    pub error: String,
}

/// Outcome of a full sync pass over all connections. A failed connection
/// contributes an entry to `errors` and leaves its repos untouched.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub sources: Vec<SourceSummary>,
    pub errors: Vec<SyncFailure>,
}

/// Reconciles each configured connection's live listing with the store.
pub struct Syncer {
    store: Arc<dyn Store>,
    // One lock per connection: passes over different connections run in
    // parallel, two passes over the same connection never overlap.
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Syncer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn connection_lock(&self, service_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(service_id).or_default())
    }

    /// Runs one pass over every source, in parallel, and collects the
    /// results. Individual failures are reported, never fatal to the pass.
    pub async fn sync_all(self: Arc<Self>, sources: Vec<SyncSource>) -> SyncReport {
        let mut tasks = JoinSet::new();
        for source in sources {
            let syncer = Arc::clone(&self);
            tasks.spawn(async move {
                let urn = source.service.urn();
                let outcome = syncer.sync_source(&source).await;
                (urn, outcome)
            });
        }

        let mut report = SyncReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(summary))) => report.sources.push(summary),
                Ok((urn, Err(e))) => {
                    warn!(%urn, error = %e, "sync pass failed");
                    report.errors.push(SyncFailure {
                        urn,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "sync task panicked");
                    report.errors.push(SyncFailure {
                        urn: String::new(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.sources.sort_by(|a, b| a.urn.cmp(&b.urn));
        report
    }

    /// One reconciliation pass for a single connection.
    ///
    /// The listing is filtered through the connection's exclusion rules,
    /// merged into existing rows by external identity, and upserted as one
    /// batch. Repos this connection previously sourced but no longer lists
    /// lose their `sources` entry; a repo left with no sources at all is
    /// soft-deleted.
    pub async fn sync_source(&self, source: &SyncSource) -> Result<SourceSummary> {
        let service = &source.service;
        let urn = service.urn();

        let lock = self.connection_lock(service.id);
        let _guard = lock.lock().await;

        let filter = ExcludeFilter::for_service(service)?;
        let listed = source.connector.list_repos().await?;

        let mut summary = SourceSummary {
            urn: urn.clone(),
            ..Default::default()
        };
        let mut seen: HashSet<ExternalRepoSpec> = HashSet::new();
        let mut batch: Vec<Repo> = Vec::new();

        for fresh in listed {
            let rule = fresh.exclude_rule();
            if filter.excludes(
                rule.id.as_deref().unwrap_or(""),
                rule.name.as_deref().unwrap_or(""),
            ) {
                debug!(%urn, repo = %fresh.name, "excluded by connection rules");
                summary.excluded += 1;
                continue;
            }

            seen.insert(fresh.external_repo.clone());

            let clone_url = fresh
                .sources
                .values()
                .map(|s| s.clone_url.clone())
                .find(|url| !url.is_empty())
                .or_else(|| fresh.metadata.as_ref().and_then(|m| m.clone_url()))
                .unwrap_or_default();
            let source_info = SourceInfo {
                id: urn.clone(),
                clone_url,
            };

            match self.store.get_repo_by_external_id(&fresh.external_repo)? {
                Some(mut existing) => {
                    existing.update_from(&fresh);
                    existing.sources.insert(urn.clone(), source_info);
                    summary.modified += 1;
                    batch.push(existing);
                }
                None => {
                    let mut created = fresh;
                    created.id = 0;
                    created.enabled = true;
                    created.sources.clear();
                    created.sources.insert(urn.clone(), source_info);
                    summary.added += 1;
                    batch.push(created);
                }
            }
        }

        for mut stale in self.store.list_repos_by_source(&urn)? {
            if seen.contains(&stale.external_repo) {
                continue;
            }
            stale.sources.remove(&urn);
            if stale.sources.is_empty() {
                stale.deleted_at = Some(Utc::now());
            }
            summary.removed += 1;
            batch.push(stale);
        }

        self.store.upsert_repos(&mut batch)?;

        info!(
            %urn,
            added = summary.added,
            modified = summary.modified,
            removed = summary.removed,
            excluded = summary.excluded,
            "sync pass completed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::connector::LookupError;
    use crate::error::Error;
    use crate::server::protocol::RepoInfo;
    use crate::store::MemStore;
    use crate::types::{GithubRepo, RepoMetadata, ServiceKind};

    struct StubConnector {
        repos: std::result::Result<Vec<Repo>, String>,
    }

    impl StubConnector {
        fn listing(repos: Vec<Repo>) -> Arc<Self> {
            Arc::new(Self { repos: Ok(repos) })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                repos: Err(msg.to_string()),
            })
        }
    }

    #[async_trait]
    impl Connector for StubConnector {
        fn kind(&self) -> ServiceKind {
            ServiceKind::Github
        }

        fn host(&self) -> &str {
            "github.com"
        }

        async fn list_repos(&self) -> Result<Vec<Repo>> {
            match &self.repos {
                Ok(repos) => Ok(repos.clone()),
                Err(msg) => Err(Error::Upstream(msg.clone())),
            }
        }

        async fn get_by_name(
            &self,
            name: &str,
        ) -> std::result::Result<Option<RepoInfo>, LookupError> {
            Err(LookupError::Unauthoritative {
                name: name.to_string(),
                reason: "stub".to_string(),
            })
        }
    }

    fn service(id: i64) -> ExternalService {
        ExternalService {
            id,
            kind: ServiceKind::Github,
            display_name: format!("github.com - {id}"),
            config: "{}".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn service_with_excludes(id: i64) -> ExternalService {
        let mut svc = service(id);
        svc.config = r#"{"exclude": [{"name": "foo/skipped"}]}"#.to_string();
        svc
    }

    fn github_repo(owner_name: &str) -> Repo {
        Repo {
            name: format!("github.com/{owner_name}"),
            enabled: true,
            external_repo: ExternalRepoSpec {
                id: owner_name.rsplit('/').next().unwrap().to_string(),
                service_type: "github".to_string(),
                service_id: "https://github.com/".to_string(),
            },
            metadata: Some(RepoMetadata::Github(GithubRepo {
                id: owner_name.rsplit('/').next().unwrap().to_string(),
                name_with_owner: owner_name.to_string(),
                url: format!("github.com/{owner_name}"),
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sync_admits_and_sources_new_repos() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        let summary = syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(vec![github_repo("foo/bar")]),
            })
            .await
            .unwrap();

        assert_eq!(summary.added, 1);
        let stored = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();
        assert!(stored.id > 0);
        assert!(stored.enabled);
        let source = &stored.sources["extsvc:github:1"];
        assert_eq!(source.id, "extsvc:github:1");
        assert_eq!(source.clone_url, "https://github.com/foo/bar.git");
    }

    #[tokio::test]
    async fn test_sync_applies_exclusion_rules() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        let summary = syncer
            .sync_source(&SyncSource {
                service: service_with_excludes(1),
                connector: StubConnector::listing(vec![
                    github_repo("foo/bar"),
                    github_repo("foo/skipped"),
                ]),
            })
            .await
            .unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.excluded, 1);
        assert!(store.get_repo_by_name("github.com/foo/skipped").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resourcing_merges_instead_of_duplicating() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        for id in [1, 2] {
            syncer
                .sync_source(&SyncSource {
                    service: service(id),
                    connector: StubConnector::listing(vec![github_repo("foo/bar")]),
                })
                .await
                .unwrap();
        }

        let stored = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();
        assert_eq!(stored.sources.len(), 2);
        assert!(stored.sources.contains_key("extsvc:github:1"));
        assert!(stored.sources.contains_key("extsvc:github:2"));
    }

    #[tokio::test]
    async fn test_vanished_repo_loses_source_and_is_soft_deleted() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        let source = SyncSource {
            service: service(1),
            connector: StubConnector::listing(vec![github_repo("foo/bar")]),
        };
        syncer.sync_source(&source).await.unwrap();

        let summary = syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(Vec::new()),
            })
            .await
            .unwrap();

        assert_eq!(summary.removed, 1);
        assert!(store.get_repo_by_name("github.com/foo/bar").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vanishing_from_one_of_two_sources_keeps_repo() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        for id in [1, 2] {
            syncer
                .sync_source(&SyncSource {
                    service: service(id),
                    connector: StubConnector::listing(vec![github_repo("foo/bar")]),
                })
                .await
                .unwrap();
        }

        syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(Vec::new()),
            })
            .await
            .unwrap();

        let stored = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();
        assert!(!stored.sources.contains_key("extsvc:github:1"));
        assert!(stored.sources.contains_key("extsvc:github:2"));
    }

    #[tokio::test]
    async fn test_one_failing_connection_does_not_abort_others() {
        let store = Arc::new(MemStore::new());
        let syncer = Arc::new(Syncer::new(store.clone()));

        // Seed connection 1, then fail its next pass: its repos must stay.
        syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(vec![github_repo("foo/bar")]),
            })
            .await
            .unwrap();

        let report = syncer
            .sync_all(vec![
                SyncSource {
                    service: service(1),
                    connector: StubConnector::failing("listing blew up"),
                },
                SyncSource {
                    service: service(2),
                    connector: StubConnector::listing(vec![github_repo("foo/baz")]),
                },
            ])
            .await;

        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].urn, "extsvc:github:1");

        // No partial removal on error.
        let kept = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();
        assert!(kept.sources.contains_key("extsvc:github:1"));
        assert!(store.get_repo_by_name("github.com/foo/baz").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_descriptive_fields_follow_fresher_record() {
        let store = Arc::new(MemStore::new());
        let syncer = Syncer::new(store.clone());

        syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(vec![github_repo("foo/bar")]),
            })
            .await
            .unwrap();
        let first = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();

        let mut fresher = github_repo("foo/bar");
        fresher.description = "now with a description".to_string();
        fresher.archived = true;
        let summary = syncer
            .sync_source(&SyncSource {
                service: service(1),
                connector: StubConnector::listing(vec![fresher]),
            })
            .await
            .unwrap();

        assert_eq!(summary.modified, 1);
        let second = store.get_repo_by_name("github.com/foo/bar").unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.description, "now with a description");
        assert!(second.archived);
    }
}
