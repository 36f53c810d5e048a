use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::DriftParams;
use crate::error::DriftError;
use crate::rng::RngManager;
use crate::simulation::{DriftOutcome, DriftRun, GenerationSummary, Phase};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    params: DriftParams,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            params: DriftParams::default(),
        }
    }

    pub fn with_params(mut self, params: DriftParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            params: self.params,
            settings: self.settings,
        }
    }
}

/// Runs drift simulations under a master seed.
///
/// Each phase of a run draws from its own named stream. Streams persist on the
/// engine, so a second `run` continues them rather than repeating the first.
pub struct Engine {
    rng: RngManager,
    params: DriftParams,
    settings: EngineSettings,
}

impl Engine {
    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.settings.seed
    }

    pub fn run(&mut self) -> Result<DriftOutcome, DriftError> {
        self.run_with_hook(|_| {})
    }

    /// Like [`Engine::run`], calling `hook` after every completed generation.
    pub fn run_with_hook<F>(&mut self, hook: F) -> Result<DriftOutcome, DriftError>
    where
        F: FnMut(&GenerationSummary),
    {
        simulate(&self.settings.scenario_name, &self.params, &mut self.rng, hook)
    }

    /// Runs `count` independent replicates, each on a seed drawn from the
    /// master stream. Failed replicates are recorded, not propagated.
    pub fn run_replicates(&mut self, count: usize) -> ReplicateSet {
        let mut results = Vec::with_capacity(count);
        for replicate in 0..count {
            let seed = self.rng.derive_seed();
            let mut rng = RngManager::new(seed);
            let result = simulate(&self.settings.scenario_name, &self.params, &mut rng, |_| {});
            results.push(match result {
                Ok(outcome) => ReplicateResult {
                    replicate,
                    seed,
                    outcome: Some(outcome),
                    error: None,
                },
                Err(err) => ReplicateResult {
                    replicate,
                    seed,
                    outcome: None,
                    error: Some(err.to_string()),
                },
            });
        }
        ReplicateSet { results }
    }
}

fn simulate<F>(
    scenario_name: &str,
    params: &DriftParams,
    rng: &mut RngManager,
    mut hook: F,
) -> Result<DriftOutcome, DriftError>
where
    F: FnMut(&GenerationSummary),
{
    info!(
        "'{scenario_name}': {} populations, {} generations, f0 = {}",
        params.populations, params.generations, params.f0
    );
    let mut run = DriftRun::new(params.clone());
    while !run.phase().is_finished() {
        let phase = run.phase();
        let mut stream = rng.stream(phase.stream_name());
        if let Err(err) = run.advance(&mut stream) {
            warn!("'{scenario_name}' failed during {phase:?}: {err}");
            return Err(err);
        }
        if let (Phase::Generation(_), Some(summary)) = (phase, run.history().last()) {
            hook(summary);
        }
    }
    let outcome = run
        .outcome()
        .expect("a run that finished without error is done");
    info!(
        "'{scenario_name}' finished: ft = {:.4}, final focal size {}",
        outcome.ft,
        outcome.n_eff.last().copied().unwrap_or_default()
    );
    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateResult {
    pub replicate: usize,
    pub seed: u64,
    pub outcome: Option<DriftOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateSet {
    pub results: Vec<ReplicateResult>,
}

impl ReplicateSet {
    pub fn outcomes(&self) -> impl Iterator<Item = &DriftOutcome> {
        self.results.iter().filter_map(|r| r.outcome.as_ref())
    }

    pub fn successes(&self) -> usize {
        self.outcomes().count()
    }

    pub fn failures(&self) -> usize {
        self.results.len() - self.successes()
    }

    /// Mean final focal frequency over the successful replicates.
    pub fn mean_ft(&self) -> Option<f64> {
        let successes = self.successes();
        if successes == 0 {
            return None;
        }
        Some(self.outcomes().map(|o| o.ft).sum::<f64>() / successes as f64)
    }
}
