//! Driver binary: runs a search strategy against a built-in benchmark
//! objective, standing in for the measurement pipeline of a live session.

use attune_core::{Flow, KeyMap, Perf, Point, SearchSpace, Session, Trial, Value};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "attune", version, about = "Simplex-based auto-tuning driver")]
struct Cli {
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search to convergence against a benchmark objective.
    Tune {
        /// Search space definition (JSON).
        #[arg(long)]
        space: PathBuf,
        /// Key/value configuration map (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extra KEY=VALUE configuration overrides.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        sets: Vec<String>,
        /// Objective to measure candidates with.
        #[arg(long, value_enum, default_value = "sphere")]
        function: Objective,
        /// Evaluation budget.
        #[arg(long, default_value_t = 5000)]
        max_evals: usize,
    },
    /// Validate a space and configuration without running a search.
    Validate {
        #[arg(long)]
        space: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Objective {
    /// sum(x_i^2)
    Sphere,
    /// The classic banana valley over the first two dimensions.
    Rosenbrock,
    /// (x_0 - 37)^2
    Parabola,
    /// Two objectives: x_0^2 and (x_0 - 5)^2.
    Biobj,
}

impl Objective {
    fn measure(self, point: &Point) -> Result<Vec<f64>> {
        let coords = numeric_terms(point)?;
        Ok(match self {
            Objective::Sphere => vec![coords.iter().map(|c| c * c).sum()],
            Objective::Rosenbrock => {
                if coords.len() < 2 {
                    return Err(miette!("rosenbrock needs at least two dimensions"));
                }
                let (x, y) = (coords[0], coords[1]);
                vec![(1.0 - x).powi(2) + 100.0 * (y - x * x).powi(2)]
            }
            Objective::Parabola => vec![(coords[0] - 37.0).powi(2)],
            Objective::Biobj => {
                vec![coords[0] * coords[0], (coords[0] - 5.0).powi(2)]
            }
        })
    }

    fn perf_count(self) -> usize {
        match self {
            Objective::Biobj => 2,
            _ => 1,
        }
    }
}

fn numeric_terms(point: &Point) -> Result<Vec<f64>> {
    point
        .terms
        .iter()
        .map(|t| match t {
            Value::Real(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Str(s) => Err(miette!(
                "benchmark objectives need numeric dimensions, found {s:?}"
            )),
        })
        .collect()
}

#[derive(Serialize)]
struct Summary {
    converged: bool,
    evaluations: usize,
    best: Option<Point>,
    best_perf: Option<Vec<f64>>,
    phase: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    match cli.command {
        Commands::Tune {
            space,
            config,
            sets,
            function,
            max_evals,
        } => tune(&space, config.as_deref(), &sets, function, max_evals),
        Commands::Validate { space, config } => validate(&space, config.as_deref()),
    }
}

fn load_space(path: &Path) -> Result<SearchSpace> {
    let raw = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading space file {}", path.display()))?;
    let space: SearchSpace = serde_json::from_str(&raw)
        .into_diagnostic()
        .wrap_err("parsing space definition")?;
    space.validate().into_diagnostic()?;
    Ok(space)
}

fn load_config(path: Option<&Path>, sets: &[String]) -> Result<KeyMap> {
    let mut cfg = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .into_diagnostic()
                .wrap_err("parsing configuration map")?
        }
        None => KeyMap::new(),
    };
    for pair in sets {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| miette!("--set expects KEY=VALUE, got {pair:?}"))?;
        cfg.set(key.trim(), value.trim());
    }
    Ok(cfg)
}

fn tune(
    space: &Path,
    config: Option<&Path>,
    sets: &[String],
    function: Objective,
    max_evals: usize,
) -> Result<()> {
    let space = load_space(space)?;
    let mut cfg = load_config(config, sets)?;
    if !cfg.contains(attune_core::keys::PERF_COUNT) {
        cfg.set(
            attune_core::keys::PERF_COUNT,
            function.perf_count().to_string(),
        );
    }

    let mut session = Session::new(space, cfg).into_diagnostic()?;

    let mut evals = 0;
    while !session.converged() && evals < max_evals {
        match session.generate().into_diagnostic()? {
            Flow::Accept(point) => {
                let objectives = function.measure(&point)?;
                tracing::debug!(id = point.id, ?objectives, "trial");
                let trial = Trial::new(point, Perf::from_objectives(&objectives));
                session.analyze(&trial).into_diagnostic()?;
                evals += 1;
            }
            Flow::Wait => {
                // Single-threaded driver: nothing is outstanding, so a wait
                // here means the strategy has nothing more to offer.
                break;
            }
        }
    }

    let summary = Summary {
        converged: session.converged(),
        evaluations: evals,
        best: session.best().map(|(point, _)| point.clone()),
        best_perf: session
            .best()
            .map(|(_, perf)| perf.objectives().to_vec()),
        phase: session
            .config()
            .get(attune_core::keys::ANGEL_PHASE)
            .map(str::to_owned),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).into_diagnostic()?
    );
    Ok(())
}

fn validate(space: &Path, config: Option<&Path>) -> Result<()> {
    let space = load_space(space)?;
    let cfg = load_config(config, &[])?;
    Session::new(space, cfg).into_diagnostic()?;
    println!("ok");
    Ok(())
}
