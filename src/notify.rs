//! Best-effort notification of the internal metadata sink after a live
//! lookup resolves a repository the store did not know about.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub name: String,
    pub description: String,
    pub fork: bool,
    pub archived: bool,
}

/// Receiver of repository metadata updates. Delivery is fire-and-forget:
/// the caller spawns the notification and ignores its outcome.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn notify_metadata(&self, update: MetadataUpdate) -> Result<()>;
}

/// Sink that drops every update. Used when no internal API is wired up.
pub struct NullSink;

#[async_trait]
impl MetadataSink for NullSink {
    async fn notify_metadata(&self, _update: MetadataUpdate) -> Result<()> {
        Ok(())
    }
}
