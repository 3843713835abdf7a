use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::ServiceKind;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Interval between background reconciliation passes.
    pub sync_interval: Duration,
    /// Provider kinds this server reconciles; exclusion requests for other
    /// kinds are ignored.
    pub kinds: Vec<ServiceKind>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("corral.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            sync_interval: Duration::from_secs(600),
            kinds: vec![
                ServiceKind::Github,
                ServiceKind::Gitlab,
                ServiceKind::BitbucketServer,
                ServiceKind::AwsCodeCommit,
            ],
        }
    }
}
