//! synthroute CLI: synthesis route planning over a reaction network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use synthroute::config::PlannerConfig;
use synthroute::oracle::{FEATURE_NAMES, RegressionModel};
use synthroute::planner::{PlanOutcome, Planner};
use synthroute::store::MemGraphStore;

#[derive(Parser)]
#[command(name = "synthroute", version, about = "Synthesis route planner")]
struct Cli {
    /// Planner configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, size and rank every route to a target substance.
    Discover {
        /// Store snapshot (JSON).
        #[arg(long)]
        store: PathBuf,

        /// Complexity model (JSON). Not needed with --unranked.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Target formula, e.g. "Al2O3".
        #[arg(long)]
        target: String,

        /// Target product mass.
        #[arg(long)]
        mass: f64,

        /// Concentration bound as key=value, e.g. "fe_percent=<0.05". Repeatable.
        #[arg(long = "bound", value_parser = parse_key_value)]
        bounds: Vec<(String, String)>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Skip complexity ranking; keep discovery order.
        #[arg(long)]
        unranked: bool,
    },

    /// List formulas of all non-source substances.
    Targets {
        #[arg(long)]
        store: PathBuf,
    },

    /// List direct input formulas of operations producing a target.
    Sources {
        #[arg(long)]
        store: PathBuf,

        #[arg(long)]
        target: String,
    },

    /// Validate a complexity model file.
    CheckModel {
        #[arg(long)]
        model: PathBuf,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got \"{raw}\""))
}

fn load_config(path: Option<&Path>) -> Result<PlannerConfig> {
    match path {
        Some(path) => PlannerConfig::load(path).map_err(Into::into),
        None => Ok(PlannerConfig::default()),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Discover {
            store,
            model,
            target,
            mass,
            bounds,
            json,
            unranked,
        } => {
            let store = MemGraphStore::load(&store)?;
            let oracle = match (&model, unranked) {
                (Some(path), _) => RegressionModel::load(path)?,
                (None, true) => RegressionModel::Linear {
                    intercept: 0.0,
                    weights: Default::default(),
                },
                (None, false) => miette::bail!("--model is required unless --unranked is given"),
            };
            let planner = Planner::new(config, Arc::new(store), Arc::new(oracle))?;

            let outcome = if unranked {
                planner.discover_unranked(&target, bounds, mass)
            } else {
                planner.discover_and_rank(&target, bounds, mass)
            }?;

            match outcome {
                PlanOutcome::NoChains { target } => {
                    if json {
                        println!("{}", serde_json::json!({ "target": target, "variants": [] }));
                    } else {
                        println!("No chains from source material reach {target}.");
                    }
                }
                PlanOutcome::Planned(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
                    } else {
                        print!("{report}");
                    }
                }
            }
        }

        Commands::Targets { store } => {
            let store = MemGraphStore::load(&store)?;
            let planner = listing_planner(config, store)?;
            let formulas = planner.target_formulas()?;
            if formulas.is_empty() {
                println!("No target substances.");
            }
            for formula in formulas {
                println!("{formula}");
            }
        }

        Commands::Sources { store, target } => {
            let store = MemGraphStore::load(&store)?;
            let planner = listing_planner(config, store)?;
            let formulas = planner.source_formulas_for(&target)?;
            if formulas.is_empty() {
                println!("No operations produce {target}.");
            }
            for formula in formulas {
                println!("{formula}");
            }
        }

        Commands::CheckModel { model } => {
            let model = RegressionModel::load(&model)?;
            println!("model ok: {}", model.kind());
            println!("features: {}", FEATURE_NAMES.join(", "));
        }
    }

    Ok(())
}

/// Planner for listing commands, which never consult the oracle.
fn listing_planner(config: PlannerConfig, store: MemGraphStore) -> Result<Planner> {
    let oracle = Arc::new(|_: &synthroute::oracle::FeatureVector| 0.0);
    Ok(Planner::new(config, Arc::new(store), oracle)?)
}
