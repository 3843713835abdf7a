use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("repo {0:?} not found in store")]
    RepoNotFound(String),

    #[error("repository with ID {0} does not exist")]
    RepoIdNotFound(i64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, Error>;
