use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use lap_ingest_core::UdpConfig;
use model::DEFAULT_SIM;
use personal_best::{EvaluatorConfig, PipelineConfig};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "pb-tracker";
const CONFIG_FILE_NAME: &str = "config.json";
const STORE_FILE_NAME: &str = "laps.ndjson";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store_path: Option<PathBuf>,
    pub sim: String,
    pub store_timeout_ms: u64,
    pub detect_session_change: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: UdpConfig::default().bind_addr,
            store_path: None,
            sim: DEFAULT_SIM.to_string(),
            store_timeout_ms: 5_000,
            detect_session_change: false,
        }
    }
}

impl AppConfig {
    /// Reads `path` when given, otherwise the per-user config file if there
    /// is one, otherwise defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("could not open config file {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("could not parse config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        Some(dirs_next::config_dir()?.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        match dirs_next::data_dir() {
            Some(dir) => Ok(dir.join(APP_DIR).join(STORE_FILE_NAME)),
            None => bail!("no data directory found, pass --store"),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn udp(&self) -> UdpConfig {
        UdpConfig { bind_addr: self.bind_addr.clone(), ..Default::default() }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            evaluator: EvaluatorConfig { sim: self.sim.clone(), store_timeout: self.store_timeout() },
            detect_session_change: self.detect_session_change,
        }
    }
}
