use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::SCHEMA;
use super::{ExternalServiceListArgs, Store};
use crate::error::{Error, Result};
use crate::types::{ExternalRepoSpec, ExternalService, Repo, ServiceKind};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const REPO_COLS: &str = "id, name, description, language, fork, archived, enabled, \
     external_service_type, external_service_id, external_id, metadata, sources, \
     created_at, updated_at, deleted_at";

const SVC_COLS: &str = "id, kind, display_name, config, created_at, updated_at, deleted_at";

struct RepoRow {
    repo: Repo,
    metadata: Option<String>,
    sources: String,
}

fn repo_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepoRow> {
    Ok(RepoRow {
        repo: Repo {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            language: row.get(3)?,
            fork: row.get(4)?,
            archived: row.get(5)?,
            enabled: row.get(6)?,
            external_repo: ExternalRepoSpec {
                service_type: row.get(7)?,
                service_id: row.get(8)?,
                id: row.get(9)?,
            },
            metadata: None,
            sources: Default::default(),
            created_at: parse_datetime(&row.get::<_, String>(12)?),
            updated_at: parse_datetime(&row.get::<_, String>(13)?),
            deleted_at: row
                .get::<_, Option<String>>(14)?
                .map(|s| parse_datetime(&s)),
        },
        metadata: row.get(10)?,
        sources: row.get(11)?,
    })
}

impl RepoRow {
    fn into_repo(self) -> Result<Repo> {
        let mut repo = self.repo;
        if let Some(raw) = self.metadata {
            repo.metadata = Some(serde_json::from_str(&raw)?);
        }
        repo.sources = serde_json::from_str(&self.sources)?;
        Ok(repo)
    }
}

fn service_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ExternalService, String)> {
    let kind: String = row.get(1)?;
    Ok((
        ExternalService {
            id: row.get(0)?,
            kind: ServiceKind::Github, // fixed up by the caller
            display_name: row.get(2)?,
            config: row.get(3)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?),
            updated_at: parse_datetime(&row.get::<_, String>(5)?),
            deleted_at: row
                .get::<_, Option<String>>(6)?
                .map(|s| parse_datetime(&s)),
        },
        kind,
    ))
}

fn into_service((mut svc, kind): (ExternalService, String)) -> Result<ExternalService> {
    svc.kind = ServiceKind::parse(&kind)
        .ok_or_else(|| Error::Config(format!("unknown service kind {kind:?} in store")))?;
    Ok(svc)
}

fn upsert_repo(conn: &Connection, repo: &mut Repo, now: DateTime<Utc>) -> Result<()> {
    if repo.id == 0 && repo.external_repo.is_set() {
        let existing: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, created_at FROM repos
                 WHERE external_service_type = ?1 AND external_service_id = ?2
                   AND external_id = ?3 AND deleted_at IS NULL",
                params![
                    repo.external_repo.service_type,
                    repo.external_repo.service_id,
                    repo.external_repo.id,
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((id, created_at)) = existing {
            repo.id = id;
            repo.created_at = parse_datetime(&created_at);
        }
    }

    if repo.created_at == DateTime::<Utc>::default() {
        repo.created_at = now;
    }
    repo.updated_at = now;

    let metadata = repo
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let sources = serde_json::to_string(&repo.sources)?;

    if repo.id != 0 {
        let updated = conn.execute(
            "UPDATE repos SET name = ?1, description = ?2, language = ?3, fork = ?4,
                 archived = ?5, enabled = ?6, external_service_type = ?7,
                 external_service_id = ?8, external_id = ?9, metadata = ?10,
                 sources = ?11, created_at = ?12, updated_at = ?13, deleted_at = ?14
             WHERE id = ?15",
            params![
                repo.name,
                repo.description,
                repo.language,
                repo.fork,
                repo.archived,
                repo.enabled,
                repo.external_repo.service_type,
                repo.external_repo.service_id,
                repo.external_repo.id,
                metadata,
                sources,
                format_datetime(&repo.created_at),
                format_datetime(&repo.updated_at),
                repo.deleted_at.as_ref().map(format_datetime),
                repo.id,
            ],
        )?;
        if updated > 0 {
            return Ok(());
        }
    }

    conn.execute(
        "INSERT INTO repos (name, description, language, fork, archived, enabled,
             external_service_type, external_service_id, external_id, metadata,
             sources, created_at, updated_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            repo.name,
            repo.description,
            repo.language,
            repo.fork,
            repo.archived,
            repo.enabled,
            repo.external_repo.service_type,
            repo.external_repo.service_id,
            repo.external_repo.id,
            metadata,
            sources,
            format_datetime(&repo.created_at),
            format_datetime(&repo.updated_at),
            repo.deleted_at.as_ref().map(format_datetime),
        ],
    )?;
    repo.id = conn.last_insert_rowid();
    Ok(())
}

fn upsert_service(conn: &Connection, svc: &mut ExternalService, now: DateTime<Utc>) -> Result<()> {
    if svc.created_at == DateTime::<Utc>::default() {
        svc.created_at = now;
    }
    svc.updated_at = now;

    if svc.id != 0 {
        conn.execute(
            "INSERT INTO external_services (id, kind, display_name, config,
                 created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 kind = excluded.kind,
                 display_name = excluded.display_name,
                 config = excluded.config,
                 updated_at = excluded.updated_at,
                 deleted_at = excluded.deleted_at",
            params![
                svc.id,
                svc.kind.as_str(),
                svc.display_name,
                svc.config,
                format_datetime(&svc.created_at),
                format_datetime(&svc.updated_at),
                svc.deleted_at.as_ref().map(format_datetime),
            ],
        )?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO external_services (kind, display_name, config, created_at,
             updated_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            svc.kind.as_str(),
            svc.display_name,
            svc.config,
            format_datetime(&svc.created_at),
            format_datetime(&svc.updated_at),
            svc.deleted_at.as_ref().map(format_datetime),
        ],
    )?;
    svc.id = conn.last_insert_rowid();
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn upsert_repos(&self, repos: &mut [Repo]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();
        for repo in repos.iter_mut() {
            upsert_repo(&tx, repo, now)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_external_services(&self, svcs: &mut [ExternalService]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();
        for svc in svcs.iter_mut() {
            upsert_service(&tx, svc, now)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_external_services(
        &self,
        args: &ExternalServiceListArgs,
    ) -> Result<Vec<ExternalService>> {
        let mut sql = format!("SELECT {SVC_COLS} FROM external_services WHERE deleted_at IS NULL");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if !args.ids.is_empty() {
            let placeholders: Vec<String> = (0..args.ids.len())
                .map(|i| format!("?{}", params.len() + i + 1))
                .collect();
            sql.push_str(&format!(" AND id IN ({})", placeholders.join(", ")));
            for id in &args.ids {
                params.push(Box::new(*id));
            }
        }
        if !args.kinds.is_empty() {
            let placeholders: Vec<String> = (0..args.kinds.len())
                .map(|i| format!("?{}", params.len() + i + 1))
                .collect();
            sql.push_str(&format!(" AND kind IN ({})", placeholders.join(", ")));
            for kind in &args.kinds {
                params.push(Box::new(kind.as_str()));
            }
        }
        sql.push_str(" ORDER BY id");

        let conn = self.conn();
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), service_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_service).collect()
    }

    fn get_repo_by_name(&self, name: &str) -> Result<Option<Repo>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {REPO_COLS} FROM repos WHERE name = ?1 AND deleted_at IS NULL"),
                params![name],
                repo_row,
            )
            .optional()?;
        row.map(RepoRow::into_repo).transpose()
    }

    fn get_repo_by_id(&self, id: i64) -> Result<Option<Repo>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {REPO_COLS} FROM repos WHERE id = ?1 AND deleted_at IS NULL"),
                params![id],
                repo_row,
            )
            .optional()?;
        row.map(RepoRow::into_repo).transpose()
    }

    fn get_repo_by_external_id(&self, spec: &ExternalRepoSpec) -> Result<Option<Repo>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {REPO_COLS} FROM repos
                     WHERE external_service_type = ?1 AND external_service_id = ?2
                       AND external_id = ?3 AND deleted_at IS NULL"
                ),
                params![spec.service_type, spec.service_id, spec.id],
                repo_row,
            )
            .optional()?;
        row.map(RepoRow::into_repo).transpose()
    }

    fn list_repos_by_source(&self, urn: &str) -> Result<Vec<Repo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLS} FROM repos
             WHERE deleted_at IS NULL
               AND EXISTS (SELECT 1 FROM json_each(repos.sources) WHERE json_each.key = ?1)
             ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![urn], repo_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(RepoRow::into_repo).collect()
    }
}
