//! Configuration

use std::path::Path;

use adasend_cardano::NetworkConfig;
use adasend_provider::{BlockfrostConfig, RateLimitConfig};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "adasend.json";
pub const PROJECT_ID_ENV: &str = "BLOCKFROST_PROJECT_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdasendConfig {
    pub network: String,
    pub blockfrost: BlockfrostSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockfrostSettings {
    /// Overrides the network's default endpoint
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for AdasendConfig {
    fn default() -> Self {
        Self {
            network: "preprod".to_string(),
            blockfrost: BlockfrostSettings {
                url: None,
                project_id: None,
                timeout_secs: 30,
                requests_per_second: 10,
            },
        }
    }
}

impl AdasendConfig {
    /// Reads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    pub fn network(&self) -> anyhow::Result<NetworkConfig> {
        NetworkConfig::by_name(&self.network)
            .ok_or_else(|| anyhow!("unknown network '{}'", self.network))
    }

    /// Project id from the environment, then from the file.
    pub fn project_id(&self) -> Option<String> {
        std::env::var(PROJECT_ID_ENV)
            .ok()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.blockfrost.project_id.clone())
    }

    pub fn blockfrost(&self) -> anyhow::Result<BlockfrostConfig> {
        let network = self.network()?;
        let project_id = self.project_id().ok_or_else(|| {
            anyhow!("no Blockfrost project id: set {PROJECT_ID_ENV} or blockfrost.project_id")
        })?;

        let mut config = BlockfrostConfig::for_network(&network, project_id)
            .with_timeout(self.blockfrost.timeout_secs)
            .with_rate_limit(Some(RateLimitConfig {
                requests_per_second: self.blockfrost.requests_per_second,
                ..RateLimitConfig::default()
            }));
        if let Some(url) = &self.blockfrost.url {
            config.base_url = url.clone();
        }
        Ok(config)
    }
}
