pub const SCHEMA: &str = r#"
-- Repositories observed from configured code hosts.
-- The external identity triple, not the name, is the reconciliation key:
-- names can be renamed upstream while the provider ID stays stable.
CREATE TABLE IF NOT EXISTS repos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT '',
    fork INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    enabled INTEGER NOT NULL DEFAULT 1,

    external_service_type TEXT NOT NULL DEFAULT '',
    external_service_id TEXT NOT NULL DEFAULT '',
    external_id TEXT NOT NULL DEFAULT '',

    -- Provider-specific payload (tagged JSON), used to derive links and
    -- default clone URLs
    metadata TEXT,

    -- external-service URN -> { id, clone_url } (JSON object)
    sources TEXT NOT NULL DEFAULT '{}',

    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT  -- soft delete; NULL = active
);

CREATE UNIQUE INDEX IF NOT EXISTS repos_external_identity
ON repos (external_service_type, external_service_id, external_id)
WHERE deleted_at IS NULL AND external_id <> '';

CREATE UNIQUE INDEX IF NOT EXISTS repos_name
ON repos (name)
WHERE deleted_at IS NULL;

-- Configured connections to code host providers
CREATE TABLE IF NOT EXISTS external_services (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    display_name TEXT NOT NULL,
    config TEXT NOT NULL DEFAULT '{}',  -- JSON-with-comments text
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS external_services_kind
ON external_services (kind)
WHERE deleted_at IS NULL;
"#;
