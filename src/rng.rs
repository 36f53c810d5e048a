//! Deterministic random streams and the sampling service used by the core.

use std::collections::HashMap;

use rand::distributions::WeightedIndex;
use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution, Normal};

/// Owns the master generator of a run and the named streams derived from it.
///
/// Streams are seeded lazily from the master the first time they are asked
/// for, so the order in which names are first requested is part of the
/// reproducibility contract.
pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let master = &mut self.master;
        let entry = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(master.next_u64()));
        SystemRng { inner: entry }
    }

    /// Draws a fresh seed from the master, e.g. for an independent replicate.
    pub fn derive_seed(&mut self) -> u64 {
        self.master.next_u64()
    }
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for SystemRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// The statistical draws the simulation needs.
///
/// Every `rand::Rng` is a `Sampler`; tests can implement it directly to feed
/// a scripted sequence of draws.
pub trait Sampler {
    /// `true` with probability `p`.
    fn bernoulli(&mut self, p: f64) -> bool;

    /// Number of successes out of `trials` with success probability `p`.
    fn binomial(&mut self, trials: u64, p: f64) -> u64;

    fn normal(&mut self, mean: f64, sd: f64) -> f64;

    /// Uniform index in `0..len`. `len` must be positive.
    fn uniform_index(&mut self, len: usize) -> usize;

    /// Index drawn proportionally to `weights`.
    fn categorical(&mut self, weights: &[f64]) -> usize;

    /// `amount` distinct indices drawn without replacement, proportionally to
    /// `weights`. Returns `None` when fewer than `amount` weights are positive.
    fn weighted_sample(&mut self, weights: &[f64], amount: usize) -> Option<Vec<usize>>;
}

impl<R: Rng + ?Sized> Sampler for R {
    fn bernoulli(&mut self, p: f64) -> bool {
        self.gen_bool(p.clamp(0.0, 1.0))
    }

    fn binomial(&mut self, trials: u64, p: f64) -> u64 {
        Binomial::new(trials, p.clamp(0.0, 1.0))
            .expect("probability is clamped to [0, 1]")
            .sample(self)
    }

    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        if sd == 0.0 {
            return mean;
        }
        Normal::new(mean, sd)
            .expect("standard deviation is validated as finite and non-negative")
            .sample(self)
    }

    fn uniform_index(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }

    fn categorical(&mut self, weights: &[f64]) -> usize {
        WeightedIndex::new(weights)
            .expect("categorical weights must have a positive total")
            .sample(self)
    }

    fn weighted_sample(&mut self, weights: &[f64], amount: usize) -> Option<Vec<usize>> {
        let positive = weights.iter().filter(|w| **w > 0.0).count();
        if positive < amount {
            return None;
        }
        index::sample_weighted(self, weights.len(), |i| weights[i], amount)
            .ok()
            .map(|picked| picked.into_vec())
    }
}
