//! fxops CLI: FX forecasting and drift monitoring.
//!
//! Commands:
//! - `train`: fetch USD/INR daily rates, build lag features, fit and track the model
//! - `monitor`: compare recent data against the last training run's features
//!
//! Settings come from `fxops.toml` (or `$FXOPS_CONFIG`); the API key from
//! `ALPHA_VANTAGE_API_KEY`, which may be set in a `.env` file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fxops_core::data::{api_key_from_env, AlphaVantageProvider, ReqwestClient};
use fxops_runner::monitoring::DRIFT_STEP;
use fxops_runner::{
    fx_monitoring_pipeline, fx_training_pipeline, ArtifactStore, FileRunRegistry, FileTracker,
    MaterializerRegistry, MonitoringOptions, PipelineEnv, Settings, TrainingOptions,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "fxops",
    about = "fxops — FX rate forecasting with drift monitoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training pipeline: fetch, preprocess, train.
    Train,
    /// Run the monitoring pipeline against the last successful training run.
    Monitor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine; the key may come from the environment.
    dotenvy::dotenv().ok();
    let settings = Settings::load().context("loading settings")?;

    tracing_subscriber::fmt()
        .with_max_level(settings.tracing_level())
        .init();

    match cli.command {
        Commands::Train => run_train(&settings),
        Commands::Monitor => run_monitor(&settings),
    }
}

fn run_train(settings: &Settings) -> Result<()> {
    let client = ReqwestClient::new(settings.data.timeout()).context("building HTTP client")?;
    let provider = AlphaVantageProvider::new(&client, api_key_from_env())
        .with_base_url(&settings.data.base_url)
        .with_output_size(&settings.data.output_size);

    let store = ArtifactStore::new(&settings.storage.artifact_root);
    let materializers = MaterializerRegistry::with_defaults();
    let registry = FileRunRegistry::new(&settings.storage.artifact_root);
    let env = PipelineEnv {
        store: &store,
        materializers: &materializers,
        registry: &registry,
    };
    let mut tracker = FileTracker::new(
        &settings.storage.tracking_root,
        settings.training.experiment.as_str(),
    );

    let options = TrainingOptions::from_settings(settings);
    let outcome = fx_training_pipeline(env, &provider, &mut tracker, &options)
        .context("training pipeline failed")?;
    info!(run_id = %outcome.record.run_id, "training run recorded");

    let training = &outcome.value;
    println!();
    println!("=== Training Run ===");
    println!("Run:            {}", outcome.record.run_id);
    println!("Pair:           {}", options.pair);
    println!("Train rows:     {}", training.train_rows);
    println!("Test rows:      {}", training.test_rows);
    println!("RMSE:           {:.6}", training.metrics.rmse);
    println!("Training R²:    {:.4}", training.metrics.training_r2);
    println!(
        "Tracking:       {}",
        tracker.run_dir(&outcome.record.run_id).display()
    );
    Ok(())
}

fn run_monitor(settings: &Settings) -> Result<()> {
    let store = ArtifactStore::new(&settings.storage.artifact_root);
    let materializers = MaterializerRegistry::with_defaults();
    let registry = FileRunRegistry::new(&settings.storage.artifact_root);
    let env = PipelineEnv {
        store: &store,
        materializers: &materializers,
        registry: &registry,
    };

    let options = MonitoringOptions::from_settings(settings);
    let outcome =
        fx_monitoring_pipeline(env, &options).context("monitoring pipeline failed")?;

    let report = &outcome.value;
    println!();
    println!("=== Drift Report ===");
    println!("Run:            {}", outcome.record.run_id);
    println!(
        "Rows:           {} reference / {} current",
        report.reference_rows, report.current_rows
    );
    println!(
        "Drifted:        {} of {} columns ({:.1}%)",
        report.number_of_drifted_columns,
        report.number_of_columns,
        report.share_of_drifted_columns * 100.0
    );
    println!(
        "Dataset drift:  {}",
        if report.dataset_drift { "yes" } else { "no" }
    );
    if let Some(step) = outcome.record.step(DRIFT_STEP) {
        for path in step.visualizations.keys() {
            println!("Visualization:  {}", path.display());
        }
    }
    Ok(())
}
