//! Configuration types for the solsend transfer tool

mod cluster;

pub use cluster::{Cluster, Commitment};

use {
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

use crate::errors::{Error, Result};

pub const DEFAULT_KEY_FILE: &str = "phantom-keypair.json";
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 5000;

/// Endpoint and policy settings for a single run.
///
/// Built once at startup and passed by reference to everything that talks to
/// the node. Nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's JSON-RPC endpoint
    pub rpc_url: Option<String>,
    /// Overrides the cluster's websocket endpoint
    pub ws_url: Option<String>,
    pub commitment: Commitment,
    pub confirmation_timeout_secs: u64,
    /// Flat allowance added to the amount during the balance check
    pub fee_buffer_lamports: u64,
    pub default_key_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_cluster(Cluster::default())
    }
}

impl ClientConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            rpc_url: None,
            ws_url: None,
            commitment: Commitment::Finalized,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            fee_buffer_lamports: DEFAULT_FEE_BUFFER_LAMPORTS,
            default_key_file: PathBuf::from(DEFAULT_KEY_FILE),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.confirmation_timeout_secs == 0 {
            return Err(Error::Config(
                "confirmation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.default_key_file.as_os_str().is_empty() {
            return Err(Error::Config("default_key_file must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or_else(|| self.cluster.url())
    }

    pub fn ws_url(&self) -> &str {
        self.ws_url.as_deref().unwrap_or_else(|| self.cluster.ws_url())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}
