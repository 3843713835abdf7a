use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::handlers;
use crate::connector::Connector;
use crate::notify::MetadataSink;
use crate::store::{ExternalServiceListArgs, Store};
use crate::sync::{SyncSource, Syncer};
use crate::types::ServiceKind;

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Provider kinds this server reconciles. Exclusion requests for other
    /// kinds are silently ignored.
    pub kinds: Vec<ServiceKind>,
    /// Lookup-capable connectors, one per provider kind.
    pub connectors: Vec<Arc<dyn Connector>>,
    pub sink: Arc<dyn MetadataSink>,
    pub syncer: Arc<Syncer>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        kinds: Vec<ServiceKind>,
        connectors: Vec<Arc<dyn Connector>>,
        sink: Arc<dyn MetadataSink>,
    ) -> Self {
        let syncer = Arc::new(Syncer::new(Arc::clone(&store)));
        Self {
            store,
            kinds,
            connectors,
            sink,
            syncer,
        }
    }

    /// Connector to consult for a live lookup of `name`. Matches on the
    /// name's host segment; unknown hosts fall back to the GitHub connector,
    /// which answers non-authoritatively for hosts it does not own.
    pub fn connector_for(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .find(|c| {
                name.strip_prefix(c.host())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .or_else(|| {
                self.connectors
                    .iter()
                    .find(|c| c.kind() == ServiceKind::Github)
            })
            .cloned()
    }

    /// Pairs every active service of an enabled kind with the registered
    /// connector for that kind. Services without a connector are skipped.
    pub fn sync_sources(&self) -> crate::error::Result<Vec<SyncSource>> {
        let services = self
            .store
            .list_external_services(&ExternalServiceListArgs::kinds(self.kinds.clone()))?;

        let mut sources = Vec::new();
        for service in services {
            match self.connectors.iter().find(|c| c.kind() == service.kind) {
                Some(connector) => sources.push(SyncSource {
                    connector: Arc::clone(connector),
                    service,
                }),
                None => tracing::debug!(
                    urn = %service.urn(),
                    "no connector registered for service kind, skipping"
                ),
            }
        }
        Ok(sources)
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/repo-lookup", post(handlers::repo_lookup))
        .route("/enqueue-repo-update", post(handlers::enqueue_repo_update))
        .route("/exclude-repo", post(handlers::exclude_repo))
        .route("/repo-external-services", post(handlers::repo_external_services))
        .route("/sync", post(handlers::trigger_sync))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
