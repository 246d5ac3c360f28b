// src/storage/mod.rs
use crate::batch::BatchReport;
use crate::cfdi::Value;
use crate::columns::Dataset;
use crate::utils::error::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Writes the dataset as `{name}.csv`: header in column order, numbers in
    /// their shortest round-trip form, blank for absent cells.
    pub fn save_dataset(&self, dataset: &Dataset, name: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}.csv", name));
        let mut writer = csv::Writer::from_path(&file_path)?;

        writer.write_record(&dataset.columns)?;
        for row in &dataset.rows {
            writer.write_record(row.iter().map(|cell| match cell {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Text(s)) => s.clone(),
                None => String::new(),
            }))?;
        }
        writer.flush().map_err(StorageError::IoError)?;

        tracing::info!(
            "Saved dataset ({} rows, {} columns) to {}",
            dataset.row_count(),
            dataset.column_count(),
            file_path.display()
        );

        Ok(file_path)
    }

    /// Saves metadata about the batch in JSON format next to the dataset
    pub fn save_dataset_metadata(
        &self,
        dataset: &Dataset,
        report: &BatchReport,
        name: &str,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}_meta.json", name));

        let metadata = serde_json::json!({
            "dataset": format!("{}.csv", name),
            "strategy": report.strategy,
            "documents_received": report.documents_received,
            "rows": dataset.row_count(),
            "skipped": report.skipped,
            "columns": dataset.columns,
            "column_kinds": dataset.kinds,
            "catalog": {
                "perceptions": report.catalog_perceptions,
                "deductions": report.catalog_deductions,
                "other_payments": report.catalog_other_payments,
            },
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }
}
