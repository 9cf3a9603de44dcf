//! flowrl CLI
//!
//! Command-line launcher for ring-road RL experiments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use flowrl::encoding::{decode_flow_params, encode_flow_params};
use flowrl::env::UnlinkedKernel;
use flowrl::experiment::StopCriteria;
use flowrl::registry::EnvRegistry;
use flowrl::replay::{get_flow_params, load_trial_params, replay_env};
use flowrl::runner::{ExperimentRunner, ManifestRunner};
use flowrl_experiments::{stabilizing_the_ring, EXPERIMENTS};

#[derive(Parser)]
#[command(name = "flowrl")]
#[command(version, about = "flowrl - Ring-road traffic RL experiments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the ring experiment and submit it
    Train {
        /// Directory the job manifests are written to
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,

        /// Training iterations per trial
        #[arg(long)]
        iterations: Option<u64>,

        /// Flow-params JSON to use instead of the built-in experiment
        #[arg(long)]
        flow_params: Option<PathBuf>,
    },

    /// Print the experiment's flow params as JSON
    Params,

    /// Show the parameters a trial was trained with
    Replay {
        /// Trial directory containing params.json
        dir: PathBuf,
    },

    /// List available experiments
    List,
}

fn main() -> Result<()> {
    // Initialize logging; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            results_dir,
            iterations,
            flow_params,
        } => {
            train(&results_dir, iterations, flow_params.as_deref())?;
        }
        Commands::Params => {
            let params = stabilizing_the_ring::flow_params()?;
            println!("{}", encode_flow_params(&params)?);
        }
        Commands::Replay { dir } => {
            replay(&dir)?;
        }
        Commands::List => {
            list_experiments();
        }
    }

    Ok(())
}

fn train(results_dir: &Path, iterations: Option<u64>, flow_params: Option<&Path>) -> Result<()> {
    let mut registry = EnvRegistry::new();
    let provider = Arc::new(UnlinkedKernel);

    let mut experiments = match flow_params {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading flow params");
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let params = decode_flow_params(&json)
                .with_context(|| format!("decoding {}", path.display()))?;
            stabilizing_the_ring::prepare_from(params, &mut registry, provider)?
        }
        None => stabilizing_the_ring::prepare(&mut registry, provider)?,
    };

    if let Some(n) = iterations {
        for spec in experiments.values_mut() {
            spec.stop = StopCriteria::iterations(n);
        }
    }

    let mut runner = ManifestRunner::new(results_dir);
    runner.init(&stabilizing_the_ring::cluster())?;
    let trials = runner.run_experiments(&experiments, &registry)?;
    tracing::info!(
        results_dir = %results_dir.display(),
        experiments = experiments.len(),
        trials = trials.len(),
        "Training jobs written"
    );

    println!("Submitted {} trial(s):", trials.len());
    for trial in &trials {
        println!("  {:<48} {}", trial.id, trial.logdir.display());
    }
    Ok(())
}

fn replay(dir: &Path) -> Result<()> {
    let config = load_trial_params(dir).with_context(|| format!("loading {}", dir.display()))?;
    let params = get_flow_params(&config)?;
    let (_, env_name) = replay_env(
        &config,
        stabilizing_the_ring::ENV_VERSION,
        Arc::new(UnlinkedKernel),
    )?;

    println!("Experiment:   {}", params.exp_tag);
    println!("Environment:  {}", env_name);
    println!("Scenario:     {} ({})", params.scenario, params.generator);
    println!("Horizon:      {}", params.env.horizon);
    println!(
        "Vehicles:     {} ({} RL)",
        params.veh.num_vehicles(),
        params.veh.num_rl_vehicles()
    );
    for t in params.veh.types() {
        println!(
            "  {:<10} x{:<4} {}",
            t.veh_id,
            t.num_vehicles,
            t.acceleration_controller.class_name()
        );
    }
    if let Some(range) = params.env.additional_params.get("ring_length") {
        println!("Ring length:  {}", range);
    }
    Ok(())
}

fn list_experiments() {
    println!("Available experiments:");
    println!();
    for (name, description) in EXPERIMENTS {
        println!("  {:<22} {}", name, description);
    }
    println!();
    println!("Training jobs are written to --results-dir for an external trainer.");
}
