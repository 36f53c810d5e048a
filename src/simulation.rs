//! The generational drift state machine.
//!
//! A run moves through `Init -> Bottleneck -> GrowthPlan -> Generation(1..=t)
//! -> Done`, or to `Failed` as soon as a population cannot continue. Each call
//! to [`DriftRun::advance`] performs exactly one transition.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::breeding::{breed_in_pairs, form_pairs};
use crate::config::DriftParams;
use crate::error::DriftError;
use crate::genotype::{allele_frequency, draw_founder, Genotype};
use crate::growth::growth_schedule;
use crate::migration::{migrate, MigrationMatrix};
use crate::rng::Sampler;

/// The transition a run will perform next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Assign starting frequencies.
    Init,
    /// Draw founders and thin them to survivors.
    Bottleneck,
    /// Compute each population's growth schedule.
    GrowthPlan,
    /// Breed, migrate, validate and select for the given generation (1-based).
    Generation(usize),
    Done,
    Failed,
}

impl Phase {
    /// Name of the random stream this transition draws from.
    pub fn stream_name(self) -> &'static str {
        match self {
            Phase::Init => "start_frequencies",
            Phase::Bottleneck => "bottleneck",
            Phase::GrowthPlan => "growth",
            Phase::Generation(_) => "generations",
            Phase::Done | Phase::Failed => "idle",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Per-population state carried from one generation to the next.
#[derive(Debug, Clone, Default)]
pub struct PopulationState {
    pub start_frequency: f64,
    /// Individuals that will breed in the next generation.
    pub pool: Vec<Genotype>,
    pub survivors: usize,
    /// Target pair counts for generations `1..=t`.
    pub schedule: Vec<usize>,
}

/// What one generation left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: usize,
    /// Pool sizes after breeding and migration, before selection.
    pub offspring: Vec<usize>,
    /// Breeding pool sizes after selection.
    pub sizes: Vec<usize>,
    pub frequencies: Vec<f64>,
    /// Target pair count of the focal population.
    pub focal_target: usize,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftOutcome {
    /// Final reference-allele frequency of the focal population.
    pub ft: f64,
    /// Focal target pair count per generation.
    pub n_eff: Vec<usize>,
    /// Starting frequency of every population, focal first.
    pub start_frequencies: Vec<f64>,
    /// Survivors of the bottleneck per population.
    pub survivors: Vec<usize>,
    /// Focal frequency after each generation.
    pub focal_trajectory: Vec<f64>,
}

pub struct DriftRun {
    params: DriftParams,
    matrix: MigrationMatrix,
    populations: Vec<PopulationState>,
    phase: Phase,
    history: Vec<GenerationSummary>,
    final_offspring: Vec<Genotype>,
    failure: Option<DriftError>,
}

impl DriftRun {
    /// Prepares a run. `params` are assumed to be validated.
    pub fn new(params: DriftParams) -> Self {
        let matrix = MigrationMatrix::ring_with_hub(params.populations, params.mig);
        let populations = vec![PopulationState::default(); params.populations];
        Self {
            params,
            matrix,
            populations,
            phase: Phase::Init,
            history: Vec::new(),
            final_offspring: Vec::new(),
            failure: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn populations(&self) -> &[PopulationState] {
        &self.populations
    }

    pub fn history(&self) -> &[GenerationSummary] {
        &self.history
    }

    /// The focal population's offspring from the last generation, after
    /// migration and before selection.
    pub fn final_offspring(&self) -> &[Genotype] {
        &self.final_offspring
    }

    /// Performs the next transition and returns the phase the run is now in.
    ///
    /// Once `Done` this is a no-op; once `Failed` it keeps returning the
    /// error that stopped the run.
    pub fn advance<S: Sampler + ?Sized>(&mut self, sampler: &mut S) -> Result<Phase, DriftError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let result = match self.phase {
            Phase::Init => {
                self.assign_start_frequencies(sampler);
                Ok(Phase::Bottleneck)
            }
            Phase::Bottleneck => self.bottleneck(sampler).map(|_| Phase::GrowthPlan),
            Phase::GrowthPlan => {
                self.plan_growth();
                if self.params.generations == 0 {
                    Ok(Phase::Done)
                } else {
                    Ok(Phase::Generation(1))
                }
            }
            Phase::Generation(generation) => self.step_generation(generation, sampler).map(|_| {
                if generation == self.params.generations {
                    Phase::Done
                } else {
                    Phase::Generation(generation + 1)
                }
            }),
            Phase::Done | Phase::Failed => Ok(self.phase),
        };
        match result {
            Ok(next) => {
                self.phase = next;
                Ok(next)
            }
            Err(err) => {
                self.phase = Phase::Failed;
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Advances until the run is done or fails.
    pub fn run_to_end<S: Sampler + ?Sized>(&mut self, sampler: &mut S) -> Result<(), DriftError> {
        while !self.phase.is_finished() {
            self.advance(sampler)?;
        }
        Ok(())
    }

    /// The outcome of a finished run; `None` before `Done`.
    pub fn outcome(&self) -> Option<DriftOutcome> {
        if self.phase != Phase::Done {
            return None;
        }
        let focal = &self.populations[0];
        let final_pool = if self.final_offspring.is_empty() {
            &focal.pool
        } else {
            &self.final_offspring
        };
        Some(DriftOutcome {
            ft: allele_frequency(final_pool),
            n_eff: focal.schedule.clone(),
            start_frequencies: self.populations.iter().map(|p| p.start_frequency).collect(),
            survivors: self.populations.iter().map(|p| p.survivors).collect(),
            focal_trajectory: self.history.iter().map(|g| g.frequencies[0]).collect(),
        })
    }

    fn assign_start_frequencies<S: Sampler + ?Sized>(&mut self, sampler: &mut S) {
        let f0 = self.params.f0;
        let mode = self.params.mode;
        let sd = self.params.sd;
        for (i, population) in self.populations.iter_mut().enumerate() {
            population.start_frequency = if i == 0 {
                f0
            } else {
                mode.start_frequency(f0, sd, sampler)
            };
        }
        debug!("start frequencies ({mode:?}): {:?}", self.start_frequencies());
    }

    fn start_frequencies(&self) -> Vec<f64> {
        self.populations.iter().map(|p| p.start_frequency).collect()
    }

    fn bottleneck<S: Sampler + ?Sized>(&mut self, sampler: &mut S) -> Result<(), DriftError> {
        let founders_per_population = 2 * self.params.n0;
        let surv = self.params.surv;
        let selection = self.params.selection;
        for (index, population) in self.populations.iter_mut().enumerate() {
            let founders: Vec<Genotype> = (0..founders_per_population)
                .map(|_| draw_founder(population.start_frequency, sampler))
                .collect();
            let weights = selection.for_pool(&founders);
            let eligible = weights.iter().filter(|w| **w > 0.0).count();
            let drawn = sampler.binomial(founders.len() as u64, surv) as usize;
            let survivors = drawn.min(eligible);
            if survivors < 2 {
                return Err(DriftError::Viability {
                    population: index,
                    survivors,
                });
            }
            let picked = sampler
                .weighted_sample(&weights, survivors)
                .ok_or(DriftError::Viability {
                    population: index,
                    survivors: eligible,
                })?;
            population.pool = picked.into_iter().map(|i| founders[i]).collect();
            population.survivors = survivors;
        }
        info!(
            "bottleneck survivors per population: {:?}",
            self.populations.iter().map(|p| p.survivors).collect::<Vec<_>>()
        );
        Ok(())
    }

    fn plan_growth(&mut self) {
        let nt = self.params.nt as f64;
        let generations = self.params.generations;
        for population in &mut self.populations {
            population.schedule = growth_schedule(population.survivors as f64 / 2.0, nt, generations);
        }
        debug!("focal growth schedule: {:?}", self.populations[0].schedule);
    }

    fn step_generation<S: Sampler + ?Sized>(
        &mut self,
        generation: usize,
        sampler: &mut S,
    ) -> Result<(), DriftError> {
        let slot = generation - 1;
        let litter = self.params.litter;
        let pairing = self.params.pairing;
        let selection = self.params.selection;

        let mut offspring = Vec::with_capacity(self.populations.len());
        for population in &self.populations {
            let pairs = form_pairs(&population.pool, pairing, sampler);
            offspring.push(breed_in_pairs(&pairs, litter, sampler));
        }
        let offspring = migrate(offspring, self.params.mig, &self.matrix, sampler);

        let mut weights = Vec::with_capacity(offspring.len());
        for (index, (population, pool)) in self.populations.iter().zip(&offspring).enumerate() {
            let required = 2 * population.schedule[slot];
            let pool_weights = selection.for_pool(pool);
            let available = pool_weights.iter().filter(|w| **w > 0.0).count();
            if available <= required {
                return Err(DriftError::Capacity {
                    population: index,
                    generation,
                    available,
                    required,
                });
            }
            weights.push((required, pool_weights));
        }

        for (index, ((population, pool), (required, pool_weights))) in self
            .populations
            .iter_mut()
            .zip(&offspring)
            .zip(weights)
            .enumerate()
        {
            let picked = sampler
                .weighted_sample(&pool_weights, required)
                .ok_or(DriftError::Capacity {
                    population: index,
                    generation,
                    available: pool.len(),
                    required,
                })?;
            population.pool = picked.into_iter().map(|i| pool[i]).collect();
        }

        let summary = GenerationSummary {
            generation,
            offspring: offspring.iter().map(Vec::len).collect(),
            sizes: self.populations.iter().map(|p| p.pool.len()).collect(),
            frequencies: self
                .populations
                .iter()
                .map(|p| allele_frequency(&p.pool))
                .collect(),
            focal_target: self.populations[0].schedule[slot],
        };
        debug!(
            "generation {generation}: offspring {:?}, focal frequency {:.4}",
            summary.offspring, summary.frequencies[0]
        );
        self.history.push(summary);
        if generation == self.params.generations {
            self.final_offspring = offspring.into_iter().next().unwrap_or_default();
        }
        Ok(())
    }
}

/// Runs a whole simulation on one sampler and returns its outcome.
pub fn sim_drift<S: Sampler + ?Sized>(
    params: &DriftParams,
    sampler: &mut S,
) -> Result<DriftOutcome, DriftError> {
    let mut run = DriftRun::new(params.clone());
    run.run_to_end(sampler)?;
    Ok(run
        .outcome()
        .expect("a run that finished without error is done"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistributionMode;
    use crate::genotype::SelectionWeights;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    /// Replays scripted draws; anything not scripted falls back to a seeded
    /// generator.
    struct ScriptedSampler {
        binomials: VecDeque<u64>,
        fallback: ChaCha8Rng,
    }

    impl ScriptedSampler {
        fn new(binomials: &[u64]) -> Self {
            Self {
                binomials: binomials.iter().copied().collect(),
                fallback: ChaCha8Rng::seed_from_u64(0),
            }
        }
    }

    impl Sampler for ScriptedSampler {
        fn bernoulli(&mut self, p: f64) -> bool {
            self.fallback.bernoulli(p)
        }

        fn binomial(&mut self, trials: u64, p: f64) -> u64 {
            match self.binomials.pop_front() {
                Some(value) => value.min(trials),
                None => self.fallback.binomial(trials, p),
            }
        }

        fn normal(&mut self, mean: f64, sd: f64) -> f64 {
            self.fallback.normal(mean, sd)
        }

        fn uniform_index(&mut self, len: usize) -> usize {
            self.fallback.uniform_index(len)
        }

        fn categorical(&mut self, weights: &[f64]) -> usize {
            self.fallback.categorical(weights)
        }

        fn weighted_sample(&mut self, weights: &[f64], amount: usize) -> Option<Vec<usize>> {
            self.fallback.weighted_sample(weights, amount)
        }
    }

    fn small_params() -> DriftParams {
        DriftParams {
            f0: 0.5,
            n0: 10,
            nt: 20,
            generations: 4,
            populations: 3,
            mig: 0.0,
            surv: 0.5,
            litter: 6,
            mode: DistributionMode::Same,
            sd: 0.0,
            ..DriftParams::default()
        }
    }

    #[test]
    fn streams_are_named_after_what_they_draw() {
        assert_eq!(Phase::Init.stream_name(), "start_frequencies");
        assert_eq!(Phase::Bottleneck.stream_name(), "bottleneck");
        assert_eq!(Phase::Generation(3).stream_name(), "generations");
    }

    #[test]
    fn phases_advance_in_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut run = DriftRun::new(small_params());
        assert_eq!(run.phase(), Phase::Init);
        assert_eq!(run.advance(&mut rng).unwrap(), Phase::Bottleneck);
        assert_eq!(run.advance(&mut rng).unwrap(), Phase::GrowthPlan);
        assert_eq!(run.advance(&mut rng).unwrap(), Phase::Generation(1));
        for generation in 2..=4 {
            assert_eq!(run.advance(&mut rng).unwrap(), Phase::Generation(generation));
        }
        assert_eq!(run.advance(&mut rng).unwrap(), Phase::Done);
        assert_eq!(run.advance(&mut rng).unwrap(), Phase::Done);
        assert_eq!(run.history().len(), 4);
    }

    #[test]
    fn scripted_bottleneck_sets_survivors_and_schedule() {
        // Every founder is scripted as a heterozygote, followed by the
        // population's survivor count.
        let params = small_params();
        let mut run = DriftRun::new(params.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        run.advance(&mut rng).unwrap();

        let founders = 2 * params.n0;
        let mut script = Vec::new();
        for survivors in [8_u64, 12, 6] {
            script.extend(std::iter::repeat(1).take(founders));
            script.push(survivors);
        }
        let mut sampler = ScriptedSampler::new(&script);
        run.advance(&mut sampler).unwrap();
        let survivors: Vec<usize> = run.populations().iter().map(|p| p.survivors).collect();
        assert_eq!(survivors, vec![8, 12, 6]);
        assert!(run
            .populations()
            .iter()
            .all(|p| p.pool.iter().all(|g| *g == Genotype::HETEROZYGOUS)));

        run.advance(&mut sampler).unwrap();
        assert_eq!(run.populations()[0].schedule.len(), params.generations);
        assert_eq!(*run.populations()[0].schedule.last().unwrap(), params.nt);
    }

    #[test]
    fn scripted_collapse_is_a_viability_error() {
        let params = small_params();
        let founders = 2 * params.n0;
        let mut script: Vec<u64> = std::iter::repeat(1).take(founders).collect();
        script.push(1);
        let mut sampler = ScriptedSampler::new(&script);
        let err = sim_drift(&params, &mut sampler).unwrap_err();
        assert_eq!(
            err,
            DriftError::Viability {
                population: 0,
                survivors: 1
            }
        );
    }

    #[test]
    fn failed_run_keeps_reporting_its_error() {
        let params = DriftParams {
            surv: 0.0,
            ..small_params()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut run = DriftRun::new(params);
        let err = run.run_to_end(&mut rng).unwrap_err();
        assert_eq!(run.phase(), Phase::Failed);
        assert_eq!(run.advance(&mut rng).unwrap_err(), err);
        assert!(run.outcome().is_none());
    }

    #[test]
    fn pools_match_targets_each_generation() {
        let mut rng = ChaCha8Rng::seed_from_u64(30);
        let mut run = DriftRun::new(small_params());
        run.run_to_end(&mut rng).unwrap();
        for summary in run.history() {
            for (population, size) in run.populations().iter().zip(&summary.sizes) {
                assert_eq!(*size, 2 * population.schedule[summary.generation - 1]);
            }
        }
    }

    #[test]
    fn lethal_genotype_never_survives_selection() {
        let params = DriftParams {
            selection: SelectionWeights::new([1.0, 1.0, 0.0]),
            ..small_params()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(44);
        let mut run = DriftRun::new(params);
        run.run_to_end(&mut rng).unwrap();
        for population in run.populations() {
            assert!(population.pool.iter().all(|g| *g != Genotype::HOMOZYGOUS_REF));
        }
    }

    #[test]
    fn final_frequency_reads_offspring_before_selection() {
        let params = DriftParams {
            selection: SelectionWeights::new([1.0, 1.0, 0.0]),
            ..small_params()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(44);
        let mut run = DriftRun::new(params);
        run.run_to_end(&mut rng).unwrap();
        let outcome = run.outcome().unwrap();
        let last = run.history().last().unwrap();

        assert_eq!(run.final_offspring().len(), last.offspring[0]);
        assert_eq!(outcome.ft, allele_frequency(run.final_offspring()));
        assert!(run.final_offspring().contains(&Genotype::HOMOZYGOUS_REF));
        assert!(run.populations()[0]
            .pool
            .iter()
            .all(|g| *g != Genotype::HOMOZYGOUS_REF));
    }

    #[test]
    fn same_seed_same_outcome() {
        let params = DriftParams {
            mig: 0.1,
            sd: 0.4,
            ..small_params()
        };
        let a = sim_drift(&params, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
        let b = sim_drift(&params, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
        assert_eq!(a, b);
    }
}
