
use serde::{Deserialize, Serialize};

use crate::rng::Sampler;

/// Copies of the reference allele carried by one diploid individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Genotype(u8);

impl Genotype {
    pub const HOMOZYGOUS_ALT: Genotype = Genotype(0);
    pub const HETEROZYGOUS: Genotype = Genotype(1);
    pub const HOMOZYGOUS_REF: Genotype = Genotype(2);

    pub fn new(dosage: u8) -> Option<Self> {
        (dosage <= 2).then_some(Self(dosage))
    }

    /// Builds a genotype from two transmitted alleles.
    pub fn from_alleles(first: bool, second: bool) -> Self {
        Self(first as u8 + second as u8)
    }

    pub fn dosage(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Draws the allele this individual passes on: the reference allele with
    /// probability dosage / 2.
    pub fn transmit<S: Sampler + ?Sized>(self, sampler: &mut S) -> bool {
        match self.0 {
            0 => false,
            2 => true,
            _ => sampler.bernoulli(0.5),
        }
    }
}

impl TryFrom<u8> for Genotype {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Genotype::new(value).ok_or_else(|| format!("genotype {value} is outside 0..=2"))
    }
}

impl From<Genotype> for u8 {
    fn from(value: Genotype) -> Self {
        value.0
    }
}

/// Relative fitness of each genotype, indexed by dosage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct SelectionWeights([f64; 3]);

impl SelectionWeights {
    pub fn new(weights: [f64; 3]) -> Self {
        Self(weights)
    }

    /// Equal weights: subsampling without selection.
    pub fn neutral() -> Self {
        Self([1.0; 3])
    }

    pub fn weight(&self, genotype: Genotype) -> f64 {
        self.0[genotype.index()]
    }

    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }

    /// Per-individual weights for a pool, in pool order.
    pub fn for_pool(&self, pool: &[Genotype]) -> Vec<f64> {
        pool.iter().map(|g| self.weight(*g)).collect()
    }
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self::neutral()
    }
}

impl From<[f64; 3]> for SelectionWeights {
    fn from(value: [f64; 3]) -> Self {
        Self(value)
    }
}

impl From<SelectionWeights> for [f64; 3] {
    fn from(value: SelectionWeights) -> Self {
        value.0
    }
}

/// Reference-allele frequency of a pool: mean dosage over two. Empty pools
/// report 0.
pub fn allele_frequency(pool: &[Genotype]) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }
    let dosage: u64 = pool.iter().map(|g| g.dosage() as u64).sum();
    dosage as f64 / (2.0 * pool.len() as f64)
}

/// Draws a founder genotype: two independent alleles, each the reference
/// allele with probability `1 - frequency`.
pub fn draw_founder<S: Sampler + ?Sized>(frequency: f64, sampler: &mut S) -> Genotype {
    let dosage = sampler.binomial(2, 1.0 - frequency);
    Genotype(dosage as u8)
}
