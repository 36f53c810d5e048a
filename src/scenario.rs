use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::DriftParams;
use crate::engine::{EngineBuilder, EngineSettings};

fn default_replicates() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_replicates")]
    pub replicates: usize,
    #[serde(flatten)]
    pub params: DriftParams,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Reads, parses and validates a scenario file.
    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario
            .params
            .validate()
            .with_context(|| format!("Invalid parameters in {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn engine(&self, seed_override: Option<u64>) -> EngineBuilder {
        EngineBuilder::new(EngineSettings {
            scenario_name: self.name.clone(),
            seed: seed_override.unwrap_or(self.seed),
        })
        .with_params(self.params.clone())
    }

    pub fn replicates(&self, override_replicates: Option<usize>) -> usize {
        override_replicates.unwrap_or(self.replicates).max(1)
    }
}
