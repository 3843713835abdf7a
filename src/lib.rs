//! # Corral
//!
//! A repository catalog server. Corral keeps an internal catalog of
//! source-code repositories synchronized with external code hosts (GitHub,
//! GitLab, Bitbucket Server, AWS CodeCommit) and answers lookup/update
//! requests about individual repositories over an internal HTTP+JSON
//! interface.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use corral::notify::NullSink;
//! use corral::server::{AppState, create_router};
//! use corral::store::SqliteStore;
//! use corral::types::ServiceKind;
//!
//! let store = SqliteStore::new("./data/corral.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     vec![ServiceKind::Github],
//!     Vec::new(), // connectors, injected per deployment
//!     Arc::new(NullSink),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI binary. Disable with
//!   `default-features = false`.

pub mod config;
pub mod connector;
pub mod error;
pub mod jsonc;
pub mod notify;
pub mod server;
pub mod store;
pub mod sync;
pub mod types;
