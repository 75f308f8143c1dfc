//! `swarmville.toml` loading.

use serde::Deserialize;
use std::path::Path;
use swarmville_agent::BackendConfig;
use swarmville_core::WorkerDescriptor;
use swarmville_orchestrator::{default_roster, OrchestratorConfig};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct SwarmConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub workers: Vec<WorkerDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl SwarmConfig {
    /// Read and parse `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: SwarmConfig = toml::from_str(raw)?;
        if let Some(dup) = duplicate_worker(&config.workers) {
            anyhow::bail!("Worker id '{dup}' appears more than once in [[workers]]");
        }
        Ok(config)
    }

    /// Configured workers, or the demo roster when none are listed.
    pub fn roster(&self) -> Vec<WorkerDescriptor> {
        if self.workers.is_empty() {
            default_roster()
        } else {
            self.workers.clone()
        }
    }
}

fn duplicate_worker(workers: &[WorkerDescriptor]) -> Option<&str> {
    workers.iter().enumerate().find_map(|(i, w)| {
        workers[..i]
            .iter()
            .any(|earlier| earlier.id == w.id)
            .then_some(w.id.as_str())
    })
}
