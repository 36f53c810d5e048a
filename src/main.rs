use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use driftsim::{
    report::{ReportWriter, RunReport},
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Genetic drift across a ring of populations")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/focal_bottleneck.yaml")]
    scenario: PathBuf,

    /// Override the master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of replicates
    #[arg(long)]
    replicates: Option<usize>,

    /// Override the number of generations
    #[arg(long)]
    generations: Option<usize>,

    /// Directory for the JSON run report
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(generations) = cli.generations {
        scenario.params.generations = generations;
        scenario.params.validate()?;
    }
    let replicates = scenario.replicates(cli.replicates);
    let mut engine = scenario.engine(cli.seed).build();
    let set = engine.run_replicates(replicates);

    for result in &set.results {
        match (&result.outcome, &result.error) {
            (Some(outcome), _) => println!(
                "replicate {:>3} (seed {}): ft = {:.4}, nEff = {:?}",
                result.replicate, result.seed, outcome.ft, outcome.n_eff
            ),
            (None, Some(err)) => println!(
                "replicate {:>3} (seed {}): failed: {err}",
                result.replicate, result.seed
            ),
            (None, None) => {}
        }
    }

    if let Some(dir) = cli.output {
        let report = RunReport::new(&scenario.name, engine.seed(), engine.params(), &set);
        let path = ReportWriter::new(dir).write(&report)?;
        println!("Report written to {}", path.display());
    }

    match set.mean_ft() {
        Some(mean) => println!(
            "Scenario '{}' completed: {} of {} replicates succeeded, mean ft = {:.4}",
            scenario.name,
            set.successes(),
            set.results.len(),
            mean
        ),
        None => bail!(
            "Scenario '{}': all {} replicates failed",
            scenario.name,
            set.results.len()
        ),
    }
    Ok(())
}
