use thiserror::Error;

/// Fatal outcomes of a drift run. Either one aborts the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftError {
    #[error(
        "population {population} is not viable after the bottleneck: \
         {survivors} survivor(s), at least 2 are needed to form a breeding pair"
    )]
    Viability { population: usize, survivors: usize },

    #[error(
        "population {population} cannot reach its target in generation {generation}: \
         {available} individuals available, more than {required} required; \
         raise the litter size or lower the growth target"
    )]
    Capacity {
        population: usize,
        generation: usize,
        available: usize,
        required: usize,
    },
}

/// Rejected drift parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must lie in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },

    #[error("genotype weights must be non-negative with at least one positive entry, got {0:?}")]
    InvalidWeights([f64; 3]),
}
