//! Command-line interface for the tabml library.
//!
//! A thin driver: reads JSON row files, calls the library, prints JSON
//! results. All pipeline logic lives in the library crate.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabml::algorithm::ProblemType;
use tabml::artifact::ArtifactStore;
use tabml::dataset::Record;
use tabml::predictor::Predictor;
use tabml::trainer::{DEFAULT_N_CLUSTERS, DEFAULT_TEST_SIZE, TrainRequest, Trainer};

#[derive(Parser)]
#[command(name = "tabml", version, about = "Train and serve tabular ML models")]
struct Cli {
    /// Directory holding model artifacts.
    #[arg(long, default_value = "models", env = "TABML_MODELS_DIR")]
    models_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train one or more algorithms against a JSON dataset.
    Train {
        /// Path to a JSON array of row objects.
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long, default_value = "default")]
        workspace: String,
        #[arg(long, default_value = "dataset")]
        dataset_id: String,
        /// classification | regression | clustering
        #[arg(long)]
        problem: ProblemType,
        /// Target column (required for supervised problems).
        #[arg(long)]
        target: Option<String>,
        /// Comma-separated algorithm names.
        #[arg(long, value_delimiter = ',')]
        algorithms: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
        test_size: f64,
        #[arg(long, default_value_t = DEFAULT_N_CLUSTERS)]
        n_clusters: usize,
    },
    /// Score records from a JSON file against a stored artifact.
    Predict {
        /// Artifact identifier returned by `train`.
        #[arg(long)]
        model: String,
        /// Path to a JSON row object or array of row objects.
        #[arg(long)]
        input: PathBuf,
    },
    /// Show a stored artifact's metadata.
    Metadata {
        #[arg(long)]
        model: String,
    },
    /// List a workspace's stored artifacts.
    List {
        #[arg(long, default_value = "default")]
        workspace: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = ArtifactStore::new(&cli.models_dir).context("opening artifact store")?;

    match cli.command {
        Command::Train {
            dataset,
            workspace,
            dataset_id,
            problem,
            target,
            algorithms,
            test_size,
            n_clusters,
        } => {
            let rows = read_rows(&dataset)?;
            let trainer = Trainer::new(store);
            let outcome = trainer.train(
                &rows,
                &TrainRequest {
                    workspace_id: workspace,
                    dataset_id,
                    problem_type: problem,
                    target_column: target,
                    algorithms,
                    test_size,
                    n_clusters,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Predict { model, input } => {
            let records = read_rows(&input)?;
            let predictor = Predictor::new(&store);
            let outcomes = predictor.predict(&model, &records)?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Command::Metadata { model } => {
            let metadata = store.metadata(&model)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::List { workspace } => {
            let entries = store.list(&workspace)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// Read a JSON file holding either one row object or an array of them.
fn read_rows(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => anyhow::bail!("{} must contain a JSON object or array of objects", path.display()),
    }
}
