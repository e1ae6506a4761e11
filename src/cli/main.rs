use anyhow::Context;
use clap::{Parser, Subcommand};
use dx_predictor::config::Config;
use dx_predictor::ml::{DiagnosisService, ModelArtifacts, TrainingPipeline, TrainingReport};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dx-train", version)]
#[command(about = "Train and inspect diagnosis models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model on a CSV dataset and write the artifact set
    Train {
        /// Patient CSV (defaults to training.dataset_path)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Artifact directory (defaults to artifacts.dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of trees
        #[arg(short, long)]
        trees: Option<usize>,

        /// Random seed for the split, bootstrap and feature subspaces
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Score one JSON record offline, printing the server's response body
    Predict {
        /// Artifact directory (defaults to artifacts.dir)
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// JSON file with the record, or `-` for stdin
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the metadata of a stored training run
    Inspect {
        /// Artifact directory (defaults to artifacts.dir)
        #[arg(short, long)]
        artifacts: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    config.observability.init_tracing();

    match cli.command {
        Commands::Train {
            dataset,
            output,
            trees,
            seed,
        } => {
            let mut training = config.training.clone();
            if let Some(trees) = trees {
                training.n_estimators = trees;
            }
            if let Some(seed) = seed {
                training.random_state = seed;
            }
            let dataset = dataset.unwrap_or_else(|| training.dataset_path.clone());
            let output = output.unwrap_or_else(|| config.artifacts.dir.clone());

            train(TrainingPipeline::new(training), &dataset, &output)
        }

        Commands::Predict { artifacts, input } => {
            let dir = artifacts.unwrap_or_else(|| config.artifacts.dir.clone());
            predict(&dir, &input)
        }

        Commands::Inspect { artifacts } => {
            let dir = artifacts.unwrap_or_else(|| config.artifacts.dir.clone());
            inspect(&dir)
        }
    }
}

fn section(title: &str) {
    println!();
    println!("{}", "=".repeat(50));
    println!("{}", title);
    println!("{}", "=".repeat(50));
}

fn train(pipeline: TrainingPipeline, dataset: &Path, output: &Path) -> anyhow::Result<()> {
    section("TRAINING");
    println!("Dataset: {}", dataset.display());
    println!(
        "Random forest: {} trees, max_depth {}, seed {}",
        pipeline.config().n_estimators,
        pipeline.config().max_depth,
        pipeline.config().random_state
    );

    let (artifacts, report) = pipeline
        .run_from_path(dataset)
        .context("training failed")?;

    print_report(&artifacts, &report);

    section("SAVING MODEL AND ENCODERS");
    artifacts
        .save(output)
        .with_context(|| format!("failed to write artifacts to '{}'", output.display()))?;
    println!("✓ Artifacts saved to '{}'", output.display());
    println!("✓ Run id: {}", artifacts.run_id);

    section("MODEL TRAINING COMPLETED SUCCESSFULLY!");
    println!("Next: dx-predictor --artifacts {}", output.display());
    Ok(())
}

fn print_report(artifacts: &ModelArtifacts, report: &TrainingReport) {
    section("1. DATASET");
    println!(
        "Dataset Shape: ({}, {})",
        report.dataset_shape.0, report.dataset_shape.1
    );
    println!("\nTarget distribution:");
    for (label, count) in &report.class_distribution {
        println!("  {:<12} {}", label, count);
    }

    section("2. PREPROCESSING");
    println!("Number of features: {}", artifacts.feature_dict.len());
    println!("Target classes: {:?}", artifacts.diagnosis_encoder.classes());
    println!("Gender classes: {:?}", artifacts.gender_encoder.classes());

    section("3. TRAIN-TEST SPLIT");
    println!("Training set size: ({}, {})", report.n_train, artifacts.feature_dict.len());
    println!("Testing set size: ({}, {})", report.n_test, artifacts.feature_dict.len());

    section("4. MODEL EVALUATION");
    println!("Training Accuracy: {:.4}", report.train_metrics.accuracy);
    println!("Testing Accuracy: {:.4}", report.test_metrics.accuracy);
    println!("\nClassification Report (Test Set):");
    println!("{}", report.test_metrics);
    println!("Confusion Matrix (rows = true, columns = predicted):");
    for (label, row) in artifacts
        .diagnosis_encoder
        .classes()
        .iter()
        .zip(&report.test_metrics.confusion_matrix)
    {
        let cells: Vec<String> = row.iter().map(|c| format!("{:>5}", c)).collect();
        println!("  {:<12}{}", label, cells.join(""));
    }

    section("5. FEATURE IMPORTANCE");
    println!("Top {} most important features:", report.top_features.len());
    for entry in &report.top_features {
        println!("  {:<20} {:.4}", entry.feature, entry.importance);
    }
}

fn predict(dir: &Path, input: &Path) -> anyhow::Result<()> {
    let service = DiagnosisService::from_dir(dir)
        .with_context(|| format!("failed to load model artifacts from '{}'", dir.display()))?;

    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("cannot read '{}'", input.display()))?
    };

    let outcome = serde_json::from_str::<serde_json::Value>(&raw)
        .map_err(dx_predictor::AppError::from)
        .and_then(|record| service.predict(&record));

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            let body = json!({ "success": false, "error": err.to_string() });
            println!("{}", serde_json::to_string_pretty(&body)?);
            anyhow::bail!("prediction failed: {}", err)
        }
    }
}

fn inspect(dir: &Path) -> anyhow::Result<()> {
    let (run_id, metadata) = ModelArtifacts::load_metadata(dir)
        .with_context(|| format!("failed to read metadata from '{}'", dir.display()))?;

    section("MODEL RUN");
    println!("Run id:        {}", run_id);
    println!("Trained at:    {}", metadata.trained_at.to_rfc3339());
    println!("Version:       {}", metadata.version);
    println!("Dataset:       {}", metadata.dataset);
    println!(
        "Samples:       {} train / {} test",
        metadata.n_training_samples, metadata.n_test_samples
    );
    println!("Features:      {}", metadata.n_features);
    println!("Classes:       {:?}", metadata.classes);
    println!("Parameters:    {:?}", metadata.hyperparameters);
    println!("Train acc:     {:.4}", metadata.train_accuracy);

    section("TEST SET EVALUATION");
    println!("{}", metadata.test_metrics);

    if !metadata.top_features.is_empty() {
        section("TOP FEATURES");
        for entry in &metadata.top_features {
            println!("  {:<20} {:.4}", entry.feature, entry.importance);
        }
    }

    Ok(())
}
