use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{ExternalServiceListArgs, Store};
use crate::error::{Error, Result};
use crate::types::{ExternalRepoSpec, ExternalService, Repo};

/// In-memory reference implementation of [`Store`], guarded by one mutex.
///
/// Used by tests and as an executable statement of the store contract; the
/// real deployment uses [`super::SqliteStore`].
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    repos: Vec<Repo>,
    services: Vec<ExternalService>,
    fail: Option<String>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent store call fail with the given message. Lets
    /// tests exercise persistence-failure paths.
    pub fn break_with(&self, msg: &str) {
        self.lock().fail = Some(msg.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn check(&self) -> Result<()> {
        match &self.fail {
            Some(msg) => Err(Error::Store(msg.clone())),
            None => Ok(()),
        }
    }

    fn next_repo_id(&self) -> i64 {
        self.repos.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    fn next_service_id(&self) -> i64 {
        self.services.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }
}

impl Store for MemStore {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn upsert_repos(&self, repos: &mut [Repo]) -> Result<()> {
        let mut inner = self.lock();
        inner.check()?;
        let now = Utc::now();

        for repo in repos.iter_mut() {
            if repo.id == 0 && repo.external_repo.is_set() {
                if let Some(existing) = inner
                    .repos
                    .iter()
                    .find(|r| !r.is_deleted() && r.external_repo == repo.external_repo)
                {
                    repo.id = existing.id;
                    repo.created_at = existing.created_at;
                }
            }
            if repo.created_at == DateTime::<Utc>::default() {
                repo.created_at = now;
            }
            repo.updated_at = now;

            if repo.id == 0 {
                repo.id = inner.next_repo_id();
                inner.repos.push(repo.clone());
            } else if let Some(slot) = inner.repos.iter_mut().find(|r| r.id == repo.id) {
                *slot = repo.clone();
            } else {
                inner.repos.push(repo.clone());
            }
        }
        Ok(())
    }

    fn upsert_external_services(&self, svcs: &mut [ExternalService]) -> Result<()> {
        let mut inner = self.lock();
        inner.check()?;
        let now = Utc::now();

        for svc in svcs.iter_mut() {
            if svc.created_at == DateTime::<Utc>::default() {
                svc.created_at = now;
            }
            svc.updated_at = now;

            if svc.id == 0 {
                svc.id = inner.next_service_id();
                inner.services.push(svc.clone());
            } else if let Some(slot) = inner.services.iter_mut().find(|s| s.id == svc.id) {
                *slot = svc.clone();
            } else {
                inner.services.push(svc.clone());
            }
        }
        Ok(())
    }

    fn list_external_services(
        &self,
        args: &ExternalServiceListArgs,
    ) -> Result<Vec<ExternalService>> {
        let inner = self.lock();
        inner.check()?;
        let mut svcs: Vec<ExternalService> = inner
            .services
            .iter()
            .filter(|s| !s.is_deleted())
            .filter(|s| args.ids.is_empty() || args.ids.contains(&s.id))
            .filter(|s| args.kinds.is_empty() || args.kinds.contains(&s.kind))
            .cloned()
            .collect();
        svcs.sort_by_key(|s| s.id);
        Ok(svcs)
    }

    fn get_repo_by_name(&self, name: &str) -> Result<Option<Repo>> {
        let inner = self.lock();
        inner.check()?;
        Ok(inner
            .repos
            .iter()
            .find(|r| !r.is_deleted() && r.name == name)
            .cloned())
    }

    fn get_repo_by_id(&self, id: i64) -> Result<Option<Repo>> {
        let inner = self.lock();
        inner.check()?;
        Ok(inner
            .repos
            .iter()
            .find(|r| !r.is_deleted() && r.id == id)
            .cloned())
    }

    fn get_repo_by_external_id(&self, spec: &ExternalRepoSpec) -> Result<Option<Repo>> {
        let inner = self.lock();
        inner.check()?;
        Ok(inner
            .repos
            .iter()
            .find(|r| !r.is_deleted() && r.external_repo == *spec)
            .cloned())
    }

    fn list_repos_by_source(&self, urn: &str) -> Result<Vec<Repo>> {
        let inner = self.lock();
        inner.check()?;
        let mut repos: Vec<Repo> = inner
            .repos
            .iter()
            .filter(|r| !r.is_deleted() && r.sources.contains_key(urn))
            .cloned()
            .collect();
        repos.sort_by_key(|r| r.id);
        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceInfo;

    fn repo(name: &str, external_id: &str) -> Repo {
        Repo {
            name: name.to_string(),
            enabled: true,
            external_repo: ExternalRepoSpec {
                id: external_id.to_string(),
                service_type: "github".to_string(),
                service_id: "https://github.com/".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_reconciles_on_external_identity() {
        let store = MemStore::new();

        let mut batch = [repo("github.com/foo/bar", "bar")];
        store.upsert_repos(&mut batch).unwrap();
        let id = batch[0].id;
        assert!(id > 0);

        let mut batch = [repo("github.com/foo/renamed", "bar")];
        store.upsert_repos(&mut batch).unwrap();
        assert_eq!(batch[0].id, id);
        assert!(store.get_repo_by_name("github.com/foo/bar").unwrap().is_none());
        assert!(
            store
                .get_repo_by_name("github.com/foo/renamed")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_break_with_fails_all_calls() {
        let store = MemStore::new();
        store.break_with("boom");

        let err = store.get_repo_by_name("x").unwrap_err();
        assert_eq!(err.to_string(), "store error: boom");
        let err = store.upsert_repos(&mut []).unwrap_err();
        assert_eq!(err.to_string(), "store error: boom");
    }

    #[test]
    fn test_list_repos_by_source_filters_on_urn() {
        let store = MemStore::new();
        let mut sourced = repo("github.com/foo/bar", "bar");
        sourced.sources.insert(
            "extsvc:github:1".to_string(),
            SourceInfo {
                id: "extsvc:github:1".to_string(),
                clone_url: String::new(),
            },
        );
        let mut batch = [sourced, repo("github.com/foo/other", "other")];
        store.upsert_repos(&mut batch).unwrap();

        let repos = store.list_repos_by_source("extsvc:github:1").unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "github.com/foo/bar");
    }
}
