use elevare_capabilities::CapabilityConfig;
use elevare_pipeline::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `elevare.toml`. Every section may be omitted.
#[derive(Debug, Deserialize)]
pub struct ElevareConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub capabilities: CapabilityConfig,
}

impl Default for ElevareConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            capabilities: CapabilityConfig::default(),
        }
    }
}

impl ElevareConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<(Self, bool)> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok((toml::from_str(&text)?, true)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), false)),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            )),
        }
    }
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Interval of the background flush of sessions left dirty by an outage.
    #[serde(default = "default_persist_retry_secs")]
    pub persist_retry_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            persist_retry_secs: default_persist_retry_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    #[serde(default = "default_research_timeout_secs")]
    pub research_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            research_timeout_secs: default_research_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
            research_timeout: Duration::from_secs(self.research_timeout_secs),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9000
}
fn default_persist_retry_secs() -> u64 {
    30
}
fn default_stage_timeout_secs() -> u64 {
    120
}
fn default_research_timeout_secs() -> u64 {
    600
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use elevare_capabilities::GenerationProvider;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ElevareConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.pipeline.engine_config(), EngineConfig::default());
        assert!(!config.capabilities.offline);
    }

    #[test]
    fn sections_override_defaults() {
        let config: ElevareConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/elevare"

            [server]
            port = 8080

            [storage]
            backend = "sqlite"
            persist_retry_secs = 5

            [pipeline]
            stage_timeout_secs = 30

            [capabilities]
            offline = true

            [capabilities.generation]
            provider = "groq"
            model_id = "llama-3.1-8b-instant"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.persist_retry_secs, 5);
        assert_eq!(
            config.pipeline.engine_config().stage_timeout,
            Duration::from_secs(30)
        );
        assert_eq!(
            config.pipeline.engine_config().research_timeout,
            Duration::from_secs(600)
        );
        assert!(config.capabilities.offline);
        assert_eq!(config.capabilities.generation.provider, GenerationProvider::Groq);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = toml::from_str::<ElevareConfig>("[storage]\nbackend = \"redis\"\n");
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let tmp = std::env::temp_dir().join("elevare-no-such-config.toml");
        let (config, found) = ElevareConfig::load(&tmp).await.unwrap();
        assert!(!found);
        assert_eq!(config.server.port, 9000);
    }
}
