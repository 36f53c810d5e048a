use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DriftParams;
use crate::engine::{ReplicateResult, ReplicateSet};

/// Summary of one invocation: parameters, seed and every replicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub seed: u64,
    pub generated_at: DateTime<Utc>,
    pub params: DriftParams,
    pub mean_ft: Option<f64>,
    pub failures: usize,
    pub replicates: Vec<ReplicateResult>,
}

impl RunReport {
    pub fn new(scenario: &str, seed: u64, params: &DriftParams, set: &ReplicateSet) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            generated_at: Utc::now(),
            params: params.clone(),
            mean_ft: set.mean_ft(),
            failures: set.failures(),
            replicates: set.results.clone(),
        }
    }
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Writes `<output_dir>/<scenario>/report.json` and returns its path.
    pub fn write(&self, report: &RunReport) -> Result<PathBuf> {
        let dir = self.output_dir.join(&report.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        let path = dir.join("report.json");
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<RunReport> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        let report = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse report {}", path.display()))?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineBuilder, EngineSettings};

    #[test]
    fn report_round_trips_through_disk() {
        let temp = tempfile::tempdir().unwrap();
        let mut engine = EngineBuilder::new(EngineSettings {
            scenario_name: "unit".into(),
            seed: 3,
        })
        .build();
        let set = engine.run_replicates(2);
        let report = RunReport::new("unit", 3, engine.params(), &set);

        let path = ReportWriter::new(temp.path()).write(&report).unwrap();
        assert_eq!(path, temp.path().join("unit").join("report.json"));

        let loaded = ReportWriter::load(&path).unwrap();
        assert_eq!(loaded.replicates.len(), 2);
        assert_eq!(loaded.params, report.params);
        assert_eq!(loaded.failures, report.failures);
    }
}
