//! Train a new outbreak model version on synthetic field data.
//!
//! Usage:
//!   train-risk-model --model-dir ./models --samples 5000 --activate

use clap::Parser;

use aquawatch_risk::model::{LogisticModel, TrainingParams};
use aquawatch_risk::registry::ModelArtifact;
use aquawatch_risk::{synthetic, ModelRegistry};

#[derive(Parser)]
#[command(name = "train-risk-model", about = "Train and register an outbreak risk model version")]
struct Cli {
    /// Directory holding versioned model artifacts.
    #[arg(long, env = "AQUAWATCH_MODEL_DIR", default_value = "models")]
    model_dir: String,

    /// Number of synthetic observations to generate.
    #[arg(long, default_value_t = 5_000)]
    samples: usize,

    /// Share of samples held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    holdout: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 400)]
    epochs: usize,

    #[arg(long, default_value_t = 0.5)]
    learning_rate: f64,

    /// Serve the new version immediately.
    #[arg(long)]
    activate: bool,
}

fn main() -> anyhow::Result<()> {
    aquawatch_shared::middleware::init_tracing("train-risk-model");
    let cli = Cli::parse();

    if !(0.0..1.0).contains(&cli.holdout) {
        anyhow::bail!("--holdout must be within [0, 1), got {}", cli.holdout);
    }

    let data = synthetic::generate(cli.samples, cli.seed);
    let split = ((1.0 - cli.holdout) * data.len() as f64).round() as usize;
    let (train, holdout) = data.split_at(split.min(data.len()));

    tracing::info!(train = train.len(), holdout = holdout.len(), "training outbreak model");
    let params = TrainingParams {
        learning_rate: cli.learning_rate,
        epochs: cli.epochs,
        ..Default::default()
    };
    let model = LogisticModel::train(train, params)?;
    let evaluation = if holdout.is_empty() {
        model.evaluate(train)
    } else {
        model.evaluate(holdout)
    };

    let registry = ModelRegistry::new(&cli.model_dir);
    let version = registry.next_version()?;
    let artifact = ModelArtifact::new(version, model, train.len(), evaluation);
    let path = registry.save(&artifact)?;

    tracing::info!(
        version,
        accuracy = evaluation.accuracy,
        log_loss = evaluation.log_loss,
        path = %path.display(),
        "model version stored"
    );

    let mut weights: Vec<_> = artifact
        .feature_columns
        .iter()
        .zip(&artifact.model.weights)
        .collect();
    weights.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    for (name, weight) in weights {
        tracing::info!(feature = %name, weight, "feature weight");
    }

    if cli.activate {
        registry.activate(version)?;
    }

    Ok(())
}
