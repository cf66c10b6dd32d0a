use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;

use crate::errors::Error;

/// Supported Solana clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    /// Mainnet Beta
    MainnetBeta,
    /// Testnet
    Testnet,
    /// Devnet
    #[default]
    Devnet,
    /// Localnet
    Localnet,
}

impl Cluster {
    /// Get the JSON-RPC URL for the cluster
    pub fn url(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Localnet => "http://localhost:8899",
        }
    }

    /// Get the websocket URL for the cluster
    pub fn ws_url(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "wss://api.mainnet-beta.solana.com",
            Cluster::Testnet => "wss://api.testnet.solana.com",
            Cluster::Devnet => "wss://api.devnet.solana.com",
            Cluster::Localnet => "ws://localhost:8900",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Testnet => "testnet",
            Cluster::Devnet => "devnet",
            Cluster::Localnet => "localnet",
        }
    }

    /// Explorer link for a transaction on this cluster
    pub fn explorer_url(&self, signature: &Signature) -> String {
        match self {
            Cluster::MainnetBeta => format!("https://explorer.solana.com/tx/{}", signature),
            Cluster::Localnet => format!(
                "https://explorer.solana.com/tx/{}?cluster=custom&customUrl={}",
                signature,
                self.url()
            ),
            _ => format!(
                "https://explorer.solana.com/tx/{}?cluster={}",
                signature,
                self.name()
            ),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cluster {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            "testnet" => Ok(Cluster::Testnet),
            "devnet" => Ok(Cluster::Devnet),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(Error::Config(format!("unknown cluster: {}", other))),
        }
    }
}

/// Commitment level requested from the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_parsing() {
        assert_eq!("devnet".parse::<Cluster>().unwrap(), Cluster::Devnet);
        assert_eq!("Mainnet".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);
        assert!(matches!("moonnet".parse::<Cluster>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_explorer_url() {
        let sig = Signature::default();
        let devnet = Cluster::Devnet.explorer_url(&sig);
        assert!(devnet.ends_with("?cluster=devnet"));
        assert!(devnet.contains(&sig.to_string()));

        let mainnet = Cluster::MainnetBeta.explorer_url(&sig);
        assert!(!mainnet.contains('?'));
    }

    #[test]
    fn test_commitment_serde() {
        let json = serde_json::to_string(&Commitment::Finalized).unwrap();
        assert_eq!(json, "\"finalized\"");
        let parsed: Commitment = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(parsed, Commitment::Confirmed);
    }
}
