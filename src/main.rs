use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use corral::config::ServerConfig;
use corral::notify::NullSink;
use corral::server::{AppState, create_router};
use corral::store::{SqliteStore, Store};
use corral::types::{ExternalService, ServiceKind};

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "A repository catalog server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog database
    Init {
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Register an external service from a config file
    AddService {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Provider kind (github, gitlab, bitbucketserver, awscodecommit)
        #[arg(long)]
        kind: String,

        #[arg(long)]
        display_name: String,

        /// Path to the connection config (JSON, // comments allowed)
        #[arg(long)]
        config_file: String,
    },

    /// Start the server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Seconds between background reconciliation passes
        #[arg(long, default_value_t = 600)]
        sync_interval: u64,

        /// Comma-separated provider kinds to reconcile
        #[arg(long, default_value = "github,gitlab,bitbucketserver,awscodecommit")]
        kinds: String,
    },
}

fn parse_kinds(raw: &str) -> anyhow::Result<Vec<ServiceKind>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(anyhow::Error::from))
        .collect()
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {data_dir}"))?;
    let store = SqliteStore::new(std::path::Path::new(data_dir).join("corral.db"))?;
    store.initialize()?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("corral=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            let store = open_store(&data_dir)?;
            drop(store);
            info!("Catalog database initialized in {}", data_dir);
        }

        Commands::AddService {
            data_dir,
            kind,
            display_name,
            config_file,
        } => {
            let kind: ServiceKind = kind.parse()?;
            let config = fs::read_to_string(&config_file)
                .with_context(|| format!("failed to read {config_file}"))?;
            // Reject unparsable config up front rather than at sync time.
            corral::jsonc::parse(&config)?;

            let store = open_store(&data_dir)?;
            let mut svcs = [ExternalService {
                id: 0,
                kind,
                display_name,
                config,
                created_at: Default::default(),
                updated_at: Default::default(),
                deleted_at: None,
            }];
            store.upsert_external_services(&mut svcs)?;
            info!(
                "Registered {} service {:?} with id {}",
                kind, svcs[0].display_name, svcs[0].id
            );
        }

        Commands::Serve {
            host,
            port,
            data_dir,
            sync_interval,
            kinds,
        } => {
            let kinds = parse_kinds(&kinds)?;
            if kinds.is_empty() {
                bail!("at least one provider kind must be enabled");
            }

            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.clone().into(),
                sync_interval: Duration::from_secs(sync_interval),
                kinds: kinds.clone(),
            };

            let store = open_store(&data_dir)?;
            let state = Arc::new(AppState::new(
                Arc::new(store),
                kinds,
                // Wire clients are injected per deployment; the stock binary
                // serves catalog state and manual sync triggers only.
                Vec::new(),
                Arc::new(NullSink),
            ));

            if state.connectors.is_empty() {
                warn!("no connectors registered; background sync disabled, POST /sync is a no-op");
            } else {
                let state = Arc::clone(&state);
                let interval = config.sync_interval;
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    loop {
                        ticker.tick().await;
                        match state.sync_sources() {
                            Ok(sources) => {
                                let report =
                                    Arc::clone(&state.syncer).sync_all(sources).await;
                                if !report.errors.is_empty() {
                                    warn!(errors = report.errors.len(), "sync pass had failures");
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to resolve sync sources"),
                        }
                    }
                });
            }

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
