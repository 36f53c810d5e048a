//! Drift parameters and their validation.

use serde::{Deserialize, Serialize};

use crate::breeding::PairingStrategy;
use crate::error::ConfigError;
use crate::genotype::SelectionWeights;
use crate::link::{inv_logit, logit};
use crate::rng::Sampler;

fn default_f0() -> f64 {
    0.8
}

fn default_n0() -> usize {
    100
}

fn default_nt() -> usize {
    200
}

fn default_generations() -> usize {
    10
}

fn default_populations() -> usize {
    6
}

fn default_mig() -> f64 {
    0.01
}

fn default_surv() -> f64 {
    0.1
}

fn default_litter() -> usize {
    6
}

fn default_sd() -> f64 {
    0.5
}

/// How the neighbouring populations' starting frequencies relate to the
/// focal frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Scattered around the focal frequency on the logit scale.
    #[default]
    Same,
    /// Scattered around `1.5 - f0`.
    Flip50,
    /// Scattered around `1 - f0`.
    Flip100,
    /// Every neighbour starts at 1.
    Fixed,
    /// Every neighbour starts at 0.
    Absent,
}

impl DistributionMode {
    /// Starting frequency of one neighbour. Draws only for the scattered
    /// modes with a positive spread.
    pub fn start_frequency<S: Sampler + ?Sized>(self, f0: f64, sd: f64, sampler: &mut S) -> f64 {
        let centre = match self {
            DistributionMode::Same => f0,
            DistributionMode::Flip50 => 1.5 - f0,
            DistributionMode::Flip100 => 1.0 - f0,
            DistributionMode::Fixed => return 1.0,
            DistributionMode::Absent => return 0.0,
        };
        if sd == 0.0 {
            return centre;
        }
        inv_logit(sampler.normal(logit(centre), sd))
    }
}

/// Everything a single drift run needs.
///
/// `n0` and `nt` count breeding pairs: the founders number `2 * n0`
/// individuals and the terminal target is `nt` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftParams {
    /// Starting frequency of the focal population.
    #[serde(default = "default_f0")]
    pub f0: f64,
    #[serde(default = "default_n0")]
    pub n0: usize,
    #[serde(default = "default_nt")]
    pub nt: usize,
    #[serde(default = "default_generations", alias = "t")]
    pub generations: usize,
    /// Focal population plus its neighbours.
    #[serde(default = "default_populations", alias = "n")]
    pub populations: usize,
    #[serde(default = "default_mig")]
    pub mig: f64,
    /// Survival probability through the bottleneck.
    #[serde(default = "default_surv")]
    pub surv: f64,
    #[serde(default = "default_litter")]
    pub litter: usize,
    #[serde(default, alias = "pops")]
    pub mode: DistributionMode,
    #[serde(default = "default_sd")]
    pub sd: f64,
    #[serde(default, alias = "geno_probs")]
    pub selection: SelectionWeights,
    #[serde(default)]
    pub pairing: PairingStrategy,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            f0: default_f0(),
            n0: default_n0(),
            nt: default_nt(),
            generations: default_generations(),
            populations: default_populations(),
            mig: default_mig(),
            surv: default_surv(),
            litter: default_litter(),
            mode: DistributionMode::default(),
            sd: default_sd(),
            selection: SelectionWeights::default(),
            pairing: PairingStrategy::default(),
        }
    }
}

impl DriftParams {
    /// Checks the ranges the simulation core assumes without re-checking.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.f0 > 0.0 && self.f0 < 1.0) {
            return Err(out_of_range("f0", "(0, 1)", self.f0));
        }
        if self.mode == DistributionMode::Flip50 && self.f0 <= 0.5 {
            return Err(out_of_range("f0 with flip50", "(0.5, 1)", self.f0));
        }
        if !(self.mig >= 0.0 && self.mig < 1.0) {
            return Err(out_of_range("mig", "[0, 1)", self.mig));
        }
        if !(self.surv > 0.0 && self.surv <= 1.0) {
            return Err(out_of_range("surv", "(0, 1]", self.surv));
        }
        if !(self.sd.is_finite() && self.sd >= 0.0) {
            return Err(out_of_range("sd", "[0, inf)", self.sd));
        }
        at_least("n0", 1, self.n0)?;
        at_least("nt", 1, self.nt)?;
        at_least("generations", 1, self.generations)?;
        at_least("populations", 2, self.populations)?;
        at_least("litter", 3, self.litter)?;

        let weights = self.selection.as_array();
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) || weights.iter().all(|w| *w == 0.0) {
            return Err(ConfigError::InvalidWeights(weights));
        }
        Ok(())
    }
}

fn out_of_range(name: &'static str, range: &'static str, value: f64) -> ConfigError {
    ConfigError::OutOfRange { name, range, value }
}

fn at_least(name: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { name, min, value });
    }
    Ok(())
}
