use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use preserve_core::{
    load_run_config_from_env, read_feature_collection, PlanarGeometryService, RoundStage,
    RunConfig, SimulationError, SimulationLoop,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rank parcels for conservation by how they grow preserved land", long_about = None)]
struct Args {
    /// Input feature collection (GeoJSON, Polygon or MultiPolygon features)
    #[arg(long)]
    parcels: PathBuf,

    /// Where to write the scored feature collection
    #[arg(long)]
    output: PathBuf,

    /// Run config JSON (defaults to $PRESERVE_RUN_CONFIG_PATH, then builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scoring method: Greedy or Patient
    #[arg(long)]
    method: Option<String>,

    /// Neighbor search radius in map units
    #[arg(long)]
    jump_distance: Option<f64>,

    /// Preserve the top parcels after each round (`--simulate=false` turns a
    /// config's simulation off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    simulate: Option<bool>,

    /// Number of rounds when simulating
    #[arg(long)]
    simulations: Option<i64>,

    /// Parcels preserved per round when simulating
    #[arg(long)]
    preserve: Option<i64>,

    /// Down-weight preserved blobs of 250 area units or more
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    deprioritize_large_blobs: Option<bool>,

    /// Print per-round metrics as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(method) = &self.method {
            config.method = method.clone();
        }
        if let Some(jump) = self.jump_distance {
            config.jump_distance = jump;
        }
        if let Some(simulate) = self.simulate {
            config.simulate = simulate;
        }
        if let Some(rounds) = self.simulations {
            config.simulations = rounds;
        }
        if let Some(count) = self.preserve {
            config.parcels_to_preserve = count;
        }
        if let Some(deprioritize) = self.deprioritize_large_blobs {
            config.deprioritize_large_blobs = deprioritize;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load run config from {}", path.display()))?,
        None => load_run_config_from_env().0,
    };
    args.apply_overrides(&mut config);
    let run = config
        .validate()
        .map_err(|err| SimulationError::new(0, RoundStage::Init, err))
        .context("Invalid run configuration")?;

    let parcels = read_feature_collection(&args.parcels)
        .with_context(|| format!("Failed to read parcels from {}", args.parcels.display()))?;

    let service = PlanarGeometryService::new();
    let outcome = SimulationLoop::new(&service, &run)
        .run(&parcels)
        .context("Ranking failed")?;
    outcome
        .write(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(
        target: "block_grower::cli",
        path = %args.output.display(),
        parcels = outcome.features.len(),
        "output.written"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.rounds)?);
    } else {
        println!("round  preserved  unpreserved  blobs  newly_preserved");
        for round in &outcome.rounds {
            println!(
                "{:>5}  {:>9}  {:>11}  {:>5}  {:>15}",
                round.round,
                round.preserved,
                round.unpreserved,
                round.blobs,
                round.newly_preserved.len()
            );
        }
        let totals = outcome.metrics();
        if totals.total_tie_extras > 0 {
            println!(
                "{} extra parcels preserved through ties at the cutoff",
                totals.total_tie_extras
            );
        }
    }
    println!(
        "Wrote {} parcels with {} to {}",
        outcome.features.len(),
        outcome.score_field(),
        args.output.display()
    );

    Ok(())
}
