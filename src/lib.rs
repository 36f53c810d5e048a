pub mod breeding;
pub mod config;
pub mod engine;
pub mod error;
pub mod genotype;
pub mod growth;
pub mod link;
pub mod migration;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod simulation;

pub use breeding::{breed, breed_in_pairs, PairingStrategy};
pub use config::{DistributionMode, DriftParams};
pub use engine::{Engine, EngineBuilder, EngineSettings, ReplicateSet};
pub use error::{ConfigError, DriftError};
pub use genotype::{Genotype, SelectionWeights};
pub use migration::{migrate, set_mig_probs, MigrationMatrix};
pub use rng::Sampler;
pub use simulation::{sim_drift, DriftOutcome, DriftRun, GenerationSummary, Phase};
