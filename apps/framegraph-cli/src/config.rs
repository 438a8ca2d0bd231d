use std::path::Path;

use anyhow::Context;
use framegraph_render::GraphConfig;
use serde::{Deserialize, Serialize};

/// Which graphics backend `run` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory backend that records calls; no GPU needed.
    #[default]
    Recording,
    /// Headless wgpu device.
    Wgpu,
}

/// CLI settings, loaded from YAML and overridden by flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub width: u32,
    pub height: u32,
    /// Seed for the erosion parameter generator.
    pub seed: u64,
    pub frames: u64,
    pub backend: BackendKind,
    /// Consecutive failed frames tolerated before `run` gives up.
    pub max_consecutive_failures: u32,
    pub graph: GraphConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            seed: 42,
            frames: 10,
            backend: BackendKind::Recording,
            max_consecutive_failures: 3,
            graph: GraphConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        serde_yaml::from_reader(file).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
