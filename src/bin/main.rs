//! probrem CLI - generate and learn PRM datasets
//!
//! Usage:
//!   probrem order --model <model.toml>
//!   probrem plan --model <model.toml> [--dialect <dialect>]
//!   probrem generate [--config <probrem.toml>] [--seed <n>] [--from <Class.attr>]
//!   probrem learn [--config <probrem.toml>] --attribute <Class.attr>
//!
//! Examples:
//!   probrem order --model models/school.toml
//!   probrem plan --model models/school.toml --dialect mysql
//!   probrem generate --config probrem.toml --seed 42
//!   probrem learn --config probrem.toml --attribute Student.success

use clap::{Parser, Subcommand, ValueEnum};
use probrem::config::Settings;
use probrem::generate::{generate_missing_cpds, GenerateOptions, Materializer};
use probrem::learn::cross_validate;
use probrem::model::{load_model, Prm};
use probrem::planner::AttributePlanner;
use probrem::sql::Dialect;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probrem")]
#[command(about = "probrem - data access for probabilistic relational models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the attributes of a model in topological order
    Order {
        /// Path to the model file
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Print the SELECT built for every attribute
    Plan {
        /// Path to the model file
        #[arg(short, long)]
        model: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "sqlite")]
        dialect: DialectArg,
    },

    /// Sample attribute values into every configured dataset
    Generate {
        /// Settings file (defaults to PROBREM_CONFIG or ./probrem.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed of the sampling RNG
        #[arg(long)]
        seed: Option<u64>,

        /// Resume from this attribute
        #[arg(long = "from")]
        start_from: Option<String>,
    },

    /// Cross-validate the CPD of one attribute over the configured datasets
    Learn {
        /// Settings file (defaults to PROBREM_CONFIG or ./probrem.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Qualified attribute name, e.g. Student.success
        #[arg(short, long)]
        attribute: String,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Sqlite,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Order { model } => cmd_order(&model),
        Commands::Plan { model, dialect } => cmd_plan(&model, dialect.into()),
        Commands::Generate {
            config,
            seed,
            start_from,
        } => cmd_generate(config, seed, start_from),
        Commands::Learn { config, attribute } => cmd_learn(config, &attribute),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn cmd_order(model: &Path) -> CliResult {
    let prm = load_model(model)?;
    for (i, attribute) in prm.topo_sort_attributes().iter().enumerate() {
        let parents = prm.parents(&attribute.qualified_name())?;
        if parents.is_empty() {
            println!("{:>3}. {}", i + 1, attribute);
        } else {
            let names: Vec<String> = parents.iter().map(|p| p.qualified_name()).collect();
            println!("{:>3}. {} <- {}", i + 1, attribute, names.join(", "));
        }
    }
    Ok(())
}

fn cmd_plan(model: &Path, dialect: Dialect) -> CliResult {
    let prm = load_model(model)?;
    let planner = AttributePlanner::new(&prm, dialect);
    for attribute in prm.topo_sort_attributes() {
        let query = planner.select_for(&attribute.qualified_name())?;
        println!("-- {}", attribute);
        println!("{};", query.statement.sql);
        println!();
    }
    Ok(())
}

fn load_settings(config: Option<PathBuf>) -> Result<Settings, Box<dyn Error>> {
    Ok(match config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    })
}

fn load_prm(settings: &Settings) -> Result<Prm, Box<dyn Error>> {
    Ok(load_model(&settings.model_path()?)?)
}

fn cmd_generate(
    config: Option<PathBuf>,
    seed: Option<u64>,
    start_from: Option<String>,
) -> CliResult {
    let settings = load_settings(config)?;
    let dialect = settings.dialect()?;
    let mut prm = load_prm(&settings)?;

    let mut rng = match seed.or(settings.generation.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    if settings.generation.generate_missing_cpds {
        let cpd_dir = settings.cpd_dir()?;
        let created = generate_missing_cpds(&mut prm, cpd_dir.as_deref(), &mut rng)?;
        if !created.is_empty() {
            tracing::info!(count = created.len(), "generated missing CPDs");
        }
    }

    let mut registry = settings.open_registry()?;
    registry.configure(&prm);
    registry.compute_training_sets();

    let materializer = Materializer::new(&prm, dialect).with_options(GenerateOptions {
        start_from: start_from.or_else(|| settings.generation.start_from.clone()),
    });

    for id in 0..registry.len() {
        let Some(dsi) = registry.dataset_mut(id) else {
            continue;
        };
        let report = materializer.run(dsi, &mut rng)?;
        println!(
            "{}: {} attributes, {} rows updated",
            report.dataset,
            report.attributes.len(),
            report.rows_updated()
        );
    }

    registry.close_all()?;
    Ok(())
}

fn cmd_learn(config: Option<PathBuf>, attribute: &str) -> CliResult {
    let settings = load_settings(config)?;
    let dialect = settings.dialect()?;
    let prm = load_prm(&settings)?;

    let mut registry = settings.open_registry()?;
    registry.configure(&prm);
    registry.compute_training_sets();

    let scores = cross_validate(
        &prm,
        attribute,
        &registry,
        dialect,
        settings.learning.pseudo_count,
    )?;

    println!("{} ({} folds)", attribute, scores.len());
    for score in &scores {
        println!(
            "  held out {}: log-likelihood {:.4} over {} rows (mean {:.4})",
            registry
                .dataset(score.test)
                .map(|d| d.describe())
                .unwrap_or_default(),
            score.log_likelihood,
            score.rows,
            score.mean()
        );
    }

    registry.close_all()?;
    Ok(())
}
