//! Breeding: litters from pairs, and pairing of a breeding pool.

use serde::{Deserialize, Serialize};

use crate::genotype::Genotype;
use crate::rng::Sampler;

pub type Pair = [Genotype; 2];

/// How a pool with an odd number of individuals is paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingStrategy {
    /// The unpaired individual mates with a uniformly chosen partner from the
    /// rest of the pool, which then breeds twice.
    #[default]
    Polygamy,
    /// The unpaired individual does not breed.
    Truncate,
}

/// Breeds one pair into a litter of `litter` offspring.
pub fn breed<S: Sampler + ?Sized>(pair: Pair, litter: usize, sampler: &mut S) -> Vec<Genotype> {
    let [mother, father] = pair;
    (0..litter)
        .map(|_| {
            let maternal = mother.transmit(sampler);
            let paternal = father.transmit(sampler);
            Genotype::from_alleles(maternal, paternal)
        })
        .collect()
}

/// Breeds every pair and concatenates the litters in pair order.
pub fn breed_in_pairs<S: Sampler + ?Sized>(
    pairs: &[Pair],
    litter: usize,
    sampler: &mut S,
) -> Vec<Genotype> {
    let mut offspring = Vec::with_capacity(pairs.len() * litter);
    for pair in pairs {
        offspring.extend(breed(*pair, litter, sampler));
    }
    offspring
}

/// Pairs consecutive individuals of `pool`.
///
/// Even pools give exactly `len / 2` pairs. For odd pools the trailing
/// individual is handled by `strategy`. Pools with fewer than two individuals
/// give no pairs.
pub fn form_pairs<S: Sampler + ?Sized>(
    pool: &[Genotype],
    strategy: PairingStrategy,
    sampler: &mut S,
) -> Vec<Pair> {
    if pool.len() < 2 {
        return Vec::new();
    }
    let mut pairs: Vec<Pair> = pool
        .chunks_exact(2)
        .map(|chunk| [chunk[0], chunk[1]])
        .collect();
    if let ([lone], PairingStrategy::Polygamy) = (pool.chunks_exact(2).remainder(), strategy) {
        let partner = sampler.uniform_index(pool.len() - 1);
        pairs.push([*lone, pool[partner]]);
    }
    pairs
}
