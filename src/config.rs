use crate::node::NodeRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub nmap: NmapConfig,
    pub sqlmap: SqlmapConfig,
    pub reporting: ReportingConfig,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Used for node records that do not declare `max_conns`
    pub default_max_conns: usize,
    pub default_ssh_port: u16,
    pub connect_timeout: u64, // seconds
    pub command_timeout: u64, // seconds
    /// Lazy directory re-sync on acquire; `None` means on-demand only
    pub resync_interval: Option<u64>, // seconds
    /// External node file re-read on every sync instead of `[[nodes]]`
    pub node_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NmapConfig {
    pub binary: String,
    pub capability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlmapConfig {
    pub binary: String,
    pub capability: String,
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            nmap: NmapConfig::default(),
            sqlmap: SqlmapConfig::default(),
            reporting: ReportingConfig::default(),
            nodes: Vec::new(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_max_conns: 10,
            default_ssh_port: 22,
            connect_timeout: 10,
            command_timeout: 600,
            resync_interval: Some(60),
            node_file: None,
        }
    }
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            binary: "nmap".to_string(),
            capability: "nmap".to_string(),
        }
    }
}

impl Default for SqlmapConfig {
    fn default() -> Self {
        Self {
            binary: "sqlmap".to_string(),
            capability: "sqlmap".to_string(),
            preview_rows: 5,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./reports"),
            formats: vec![OutputFormat::Json],
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| crate::FleetError::Parse(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }
}

impl PoolConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_interval.map(Duration::from_secs)
    }
}
