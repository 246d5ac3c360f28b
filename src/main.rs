// src/main.rs
use clap::Parser;
use nomina_extractor::batch::STRATEGY_ENV_VAR;
use nomina_extractor::storage::StorageManager;
use nomina_extractor::utils::{self, AppError};
use nomina_extractor::{loader, BatchOptions, CatalogStrategy, PayrollBatch};
use std::path::PathBuf;

/// Command Line Interface for consolidating CFDI payroll documents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// XML files, ZIP archives or directories to process
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for the consolidated dataset
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Base name of the output files
    #[arg(long, default_value = "nomina_consolidada")]
    output_name: String,

    /// Column unification strategy: prescan or lazy
    #[arg(long)]
    strategy: Option<String>,

    /// Only read files directly inside the given directories
    #[arg(long)]
    no_recursive: bool,
}

/// Strategy from the command line, then the environment, then the default.
fn resolve_strategy(arg: Option<&str>) -> Result<CatalogStrategy, AppError> {
    if let Some(value) = arg {
        tracing::debug!("Using strategy '{}' from command-line argument", value);
        return value.parse().map_err(AppError::Config);
    }
    match std::env::var(STRATEGY_ENV_VAR) {
        Ok(value) => {
            tracing::debug!("Using strategy '{}' from {}", value, STRATEGY_ENV_VAR);
            value.parse().map_err(AppError::Config)
        }
        Err(_) => Ok(CatalogStrategy::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging("info");

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let strategy = resolve_strategy(args.strategy.as_deref())?;

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 4. Gather documents
    let documents = loader::collect_documents(&args.inputs, !args.no_recursive).await?;
    if documents.is_empty() {
        return Err(AppError::Config(format!("No XML documents found in {:?}", args.inputs)));
    }

    // 5. Run the batch off the async runtime
    let batch = PayrollBatch::new(BatchOptions { strategy });
    let (dataset, report) = tokio::task::spawn_blocking(move || batch.run(&documents))
        .await
        .map_err(|e| AppError::Processing(format!("Batch task failed: {}", e)))?;

    if dataset.is_empty() {
        return Err(AppError::Processing(format!(
            "None of the {} documents could be processed",
            report.documents_received
        )));
    }

    // 6. Save the dataset and its metadata
    let path = storage.save_dataset(&dataset, &args.output_name)?;
    tracing::info!("Saved dataset to: {}", path.display());
    let meta_path = storage.save_dataset_metadata(&dataset, &report, &args.output_name)?;
    tracing::info!("Saved dataset metadata to: {}", meta_path.display());

    tracing::info!(
        "Processing finished. Rows: {}, Skipped: {}",
        dataset.row_count(),
        report.skipped.len()
    );

    Ok(())
}
