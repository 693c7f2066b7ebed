//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory for project state, backups, and trash
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    pub rpc: RpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    /// Named cluster (devnet / testnet / mainnet). Empty means "use endpoint"
    #[serde(default)]
    pub cluster: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            cluster: String::new(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rpc: RpcConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("data_dir", default_data_dir().to_string_lossy().to_string())?
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.cluster", "")?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.max_retries", default_max_retries() as i64)?
            .set_default(
                "rpc.retry_base_delay_ms",
                default_retry_base_delay_ms() as i64,
            )?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SOLFLEET_)
            .add_source(
                config::Environment::with_prefix("SOLFLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.is_empty() {
            anyhow::bail!("rpc.endpoint must not be empty");
        }
        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }
        Ok(())
    }

    /// Resolve the RPC endpoint for one operation.
    ///
    /// Priority: explicit `rpc_url` > named `cluster` preset > configured
    /// default endpoint.
    pub fn resolve_rpc(&self, cluster: Option<&str>, rpc_url: Option<&str>) -> String {
        if let Some(url) = rpc_url {
            let url = url.trim();
            if !url.is_empty() {
                return url.to_string();
            }
        }
        let cluster = cluster
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.rpc.cluster);
        if let Some(preset) = cluster_preset(cluster) {
            return preset;
        }
        self.rpc.endpoint.clone()
    }
}

/// Well-known cluster endpoints, overridable via environment
pub fn cluster_preset(cluster: &str) -> Option<String> {
    let (env_var, default) = match cluster.trim().to_lowercase().as_str() {
        "mainnet" | "mainnet-beta" => {
            ("SOLANA_MAINNET_RPC", "https://api.mainnet-beta.solana.com")
        }
        "testnet" => ("SOLANA_TESTNET_RPC", "https://api.testnet.solana.com"),
        "devnet" => ("SOLANA_DEVNET_RPC", "https://api.devnet.solana.com"),
        _ => return None,
    };
    Some(std::env::var(env_var).unwrap_or_else(|_| default.to_string()))
}

/// Whether an endpoint points at a development cluster.
///
/// Airdrops are refused anywhere else; a production endpoint must never
/// receive a faucet call.
pub fn is_dev_endpoint(url: &str) -> bool {
    let u = url.to_lowercase();
    u.contains("devnet")
        || u.contains("testnet")
        || u.contains("localhost")
        || u.contains("127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rpc_priority() {
        let config = Config::default();
        // Explicit URL wins
        assert_eq!(
            config.resolve_rpc(Some("devnet"), Some("http://localhost:8899")),
            "http://localhost:8899"
        );
        // Cluster preset next
        assert_eq!(
            config.resolve_rpc(Some("devnet"), None),
            "https://api.devnet.solana.com"
        );
        // Default endpoint last
        assert_eq!(config.resolve_rpc(None, None), config.rpc.endpoint);
        // Blank override falls through
        assert_eq!(
            config.resolve_rpc(Some("testnet"), Some("  ")),
            "https://api.testnet.solana.com"
        );
    }

    #[test]
    fn test_unknown_cluster_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.resolve_rpc(Some("moonnet"), None), config.rpc.endpoint);
    }

    #[test]
    fn test_is_dev_endpoint() {
        assert!(is_dev_endpoint("https://api.devnet.solana.com"));
        assert!(is_dev_endpoint("https://api.testnet.solana.com"));
        assert!(is_dev_endpoint("http://localhost:8899"));
        assert!(is_dev_endpoint("http://127.0.0.1:8899"));
        assert!(!is_dev_endpoint("https://api.mainnet-beta.solana.com"));
    }
}
