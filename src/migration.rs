//! Ring-with-hub migration topology and migrant reassignment.
//!
//! Population 0 is the hub. Populations `1..n` form a ring; each exchanges
//! migrants with its two ring neighbours and with the hub, while the hub sends
//! migrants uniformly to every other population.

use log::debug;
use ndarray::{Array2, ArrayView1};

use crate::genotype::Genotype;
use crate::rng::Sampler;

const ROW_TOLERANCE: f64 = 1e-9;

/// Row-stochastic matrix: row = population of origin, column = destination.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationMatrix {
    probs: Array2<f64>,
}

impl MigrationMatrix {
    /// Builds the ring-with-hub matrix for `n >= 2` populations.
    ///
    /// When ring neighbours coincide with each other or with the population
    /// itself (n = 2 or n = 3) their shares are added to the same cell, so a
    /// "neighbour" equal to the origin keeps its share at home.
    pub fn ring_with_hub(n: usize, mig: f64) -> Self {
        let mut probs = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            probs[[i, i]] = 1.0 - mig;
        }
        if n < 2 {
            return Self { probs };
        }

        let spread = mig / (n - 1) as f64;
        for j in 1..n {
            probs[[0, j]] += spread;
        }

        let share = mig / 3.0;
        for i in 1..n {
            let (prev, next) = ring_neighbours(i, n);
            probs[[i, 0]] += share;
            probs[[i, prev]] += share;
            probs[[i, next]] += share;
        }
        Self { probs }
    }

    pub fn population_count(&self) -> usize {
        self.probs.nrows()
    }

    pub fn get(&self, origin: usize, destination: usize) -> f64 {
        self.probs[[origin, destination]]
    }

    pub fn row(&self, origin: usize) -> ArrayView1<'_, f64> {
        self.probs.row(origin)
    }

    /// Probability of leaving `origin`.
    pub fn departure(&self, origin: usize) -> f64 {
        1.0 - self.probs[[origin, origin]]
    }

    /// Scales every row's off-diagonal mass down to at most `rate`, moving
    /// the remainder onto the diagonal. Rows already within the cap are kept.
    pub fn capped(&self, rate: f64) -> Self {
        let mut probs = self.probs.clone();
        for (origin, mut row) in probs.rows_mut().into_iter().enumerate() {
            let leaving = 1.0 - row[origin];
            if leaving <= rate || leaving <= 0.0 {
                continue;
            }
            let scale = rate / leaving;
            for (destination, p) in row.iter_mut().enumerate() {
                if destination != origin {
                    *p *= scale;
                }
            }
            row[origin] = 1.0 - rate;
        }
        Self { probs }
    }

    /// Every row is a probability distribution.
    pub fn is_row_stochastic(&self) -> bool {
        self.probs.rows().into_iter().all(|row| {
            row.iter().all(|p| *p >= 0.0) && (row.sum() - 1.0).abs() < ROW_TOLERANCE
        })
    }

    /// Non-zero entries only on the diagonal, the hub column and ring
    /// neighbours (the hub row may reach anyone).
    pub fn respects_ring_topology(&self) -> bool {
        let n = self.population_count();
        (1..n).all(|i| {
            let (prev, next) = ring_neighbours(i, n);
            (0..n).all(|j| j == 0 || j == i || j == prev || j == next || self.get(i, j) == 0.0)
        })
    }

    pub fn is_identity(&self) -> bool {
        self.probs
            .indexed_iter()
            .all(|((i, j), p)| if i == j { *p == 1.0 } else { *p == 0.0 })
    }
}

/// Ring neighbours of non-hub population `i` among `1..n`.
fn ring_neighbours(i: usize, n: usize) -> (usize, usize) {
    let prev = if i == 1 { n - 1 } else { i - 1 };
    let next = if i == n - 1 { 1 } else { i + 1 };
    (prev, next)
}

pub fn set_mig_probs(n: usize, mig: f64) -> MigrationMatrix {
    MigrationMatrix::ring_with_hub(n, mig)
}

/// Reassigns every individual to a destination drawn from its origin's row.
///
/// `rate` is an upper bound on the per-individual chance of leaving: rows
/// whose departure probability exceeds it are rescaled with
/// [`MigrationMatrix::capped`]. At zero nobody moves and no draws are made.
/// The total head count is conserved.
pub fn migrate<S: Sampler + ?Sized>(
    pops: Vec<Vec<Genotype>>,
    rate: f64,
    matrix: &MigrationMatrix,
    sampler: &mut S,
) -> Vec<Vec<Genotype>> {
    if rate <= 0.0 || pops.len() < 2 {
        return pops;
    }

    let n = pops.len();
    let matrix = matrix.capped(rate);
    let mut regrouped: Vec<Vec<Genotype>> = pops.iter().map(|p| Vec::with_capacity(p.len())).collect();
    let mut moved = 0_usize;
    for (origin, pool) in pops.into_iter().enumerate() {
        let weights: Vec<f64> = matrix.row(origin).iter().copied().collect();
        for individual in pool {
            let destination = sampler.categorical(&weights);
            if destination != origin {
                moved += 1;
            }
            regrouped[destination].push(individual);
        }
    }
    debug!(
        "migration moved {moved} individuals across {n} populations (upper rate {rate})"
    );
    regrouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pools() -> Vec<Vec<Genotype>> {
        vec![
            vec![Genotype::HOMOZYGOUS_REF; 30],
            vec![Genotype::HETEROZYGOUS; 20],
            vec![Genotype::HOMOZYGOUS_ALT; 25],
            vec![Genotype::HOMOZYGOUS_REF, Genotype::HOMOZYGOUS_ALT],
            vec![],
        ]
    }

    #[test]
    fn rows_sum_to_one_for_every_size() {
        for n in 2..12 {
            for mig in [0.0, 0.01, 0.3, 0.75, 0.999] {
                let matrix = set_mig_probs(n, mig);
                assert_eq!(matrix.population_count(), n);
                assert!(matrix.is_row_stochastic(), "n={n} mig={mig}");
                assert!(matrix.respects_ring_topology(), "n={n} mig={mig}");
            }
        }
    }

    #[test]
    fn zero_migration_is_identity() {
        for n in 2..8 {
            assert!(set_mig_probs(n, 0.0).is_identity());
        }
    }

    #[test]
    fn hub_spreads_uniformly() {
        let matrix = set_mig_probs(5, 0.2);
        assert!((matrix.get(0, 0) - 0.8).abs() < 1e-12);
        for j in 1..5 {
            assert!((matrix.get(0, j) - 0.05).abs() < 1e-12);
        }
    }

    #[test]
    fn ring_rows_reach_hub_and_both_neighbours() {
        let matrix = set_mig_probs(6, 0.3);
        let third = 0.1;
        assert!((matrix.get(1, 0) - third).abs() < 1e-12);
        assert!((matrix.get(1, 2) - third).abs() < 1e-12);
        assert!((matrix.get(1, 5) - third).abs() < 1e-12);
        assert_eq!(matrix.get(1, 3), 0.0);
        assert!((matrix.get(5, 1) - third).abs() < 1e-12);
        assert!((matrix.get(5, 4) - third).abs() < 1e-12);
    }

    #[test]
    fn degenerate_two_populations_fold_neighbours_home() {
        let matrix = set_mig_probs(2, 0.3);
        assert!((matrix.get(0, 1) - 0.3).abs() < 1e-12);
        assert!((matrix.get(1, 0) - 0.1).abs() < 1e-12);
        assert!((matrix.get(1, 1) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn degenerate_three_populations_merge_neighbours() {
        let matrix = set_mig_probs(3, 0.3);
        assert!((matrix.get(1, 2) - 0.2).abs() < 1e-12);
        assert!((matrix.get(2, 1) - 0.2).abs() < 1e-12);
        assert!((matrix.get(1, 0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_keeps_everyone_home() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let matrix = set_mig_probs(5, 0.0);
        let moved = migrate(pools(), 0.0, &matrix, &mut rng);
        assert_eq!(moved, pools());
    }

    #[test]
    fn identity_matrix_keeps_composition_even_with_positive_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let matrix = set_mig_probs(5, 0.0);
        let moved = migrate(pools(), 0.5, &matrix, &mut rng);
        for (before, after) in pools().iter().zip(&moved) {
            let mut a = before.clone();
            let mut b = after.clone();
            a.sort();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn migration_conserves_head_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let total: usize = pools().iter().map(Vec::len).sum();
        for mig in [0.05, 0.4, 0.9] {
            let matrix = set_mig_probs(5, mig);
            let moved = migrate(pools(), mig, &matrix, &mut rng);
            assert_eq!(moved.len(), 5);
            assert_eq!(moved.iter().map(Vec::len).sum::<usize>(), total);
        }
    }

    #[test]
    fn heavy_migration_mixes_genotypes() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let matrix = set_mig_probs(5, 0.9);
        let moved = migrate(pools(), 0.9, &matrix, &mut rng);
        assert!(moved[0].iter().any(|g| *g != Genotype::HOMOZYGOUS_REF));
    }

    #[test]
    fn capping_limits_departure_and_keeps_rows_stochastic() {
        let matrix = set_mig_probs(6, 0.6);
        let capped = matrix.capped(0.05);
        assert!(capped.is_row_stochastic());
        assert!(capped.respects_ring_topology());
        for origin in 0..6 {
            assert!((capped.departure(origin) - 0.05).abs() < 1e-12);
        }
        // Destinations keep their relative shares.
        assert!((capped.get(1, 0) / capped.get(1, 2) - 1.0).abs() < 1e-12);
        assert_eq!(matrix.capped(0.9), matrix);
    }

    #[test]
    fn rate_below_matrix_departure_bounds_migrants() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let matrix = set_mig_probs(4, 0.6);
        let pops = vec![vec![Genotype::HOMOZYGOUS_REF; 1000], vec![], vec![], vec![]];
        let moved = migrate(pops, 0.01, &matrix, &mut rng);
        let left = 1000 - moved[0].len();
        assert!(left < 40, "{left} of 1000 left at rate 0.01");
        assert_eq!(moved.iter().map(Vec::len).sum::<usize>(), 1000);
    }
}
