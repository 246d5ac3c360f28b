// src/batch/mod.rs
use crate::cfdi::{Collection, RawDocument};
use crate::columns::{assemble_dataset, ColumnRegistry, Dataset};
use crate::extractors::{ConceptCatalog, DocumentNormalizer};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted when no strategy is given explicitly.
pub const STRATEGY_ENV_VAR: &str = "NOMINA_CATALOG_STRATEGY";

/// How a batch reconciles documents that report different concept sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStrategy {
    /// Scan every document for concepts first, then zero-fill each record.
    #[default]
    Prescan,
    /// Register columns as they appear; missing numeric cells are zero-filled
    /// when the dataset is assembled.
    Lazy,
}

impl FromStr for CatalogStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prescan" | "pre-scan" | "catalog" => Ok(CatalogStrategy::Prescan),
            "lazy" | "dynamic" => Ok(CatalogStrategy::Lazy),
            other => Err(format!("unknown catalog strategy '{}' (expected 'prescan' or 'lazy')", other)),
        }
    }
}

impl fmt::Display for CatalogStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogStrategy::Prescan => f.write_str("prescan"),
            CatalogStrategy::Lazy => f.write_str("lazy"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub strategy: CatalogStrategy,
}

/// Informational counts for one batch. Callers detect an empty result through
/// the dataset itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub strategy: CatalogStrategy,
    pub documents_received: usize,
    pub documents_normalized: usize,
    pub skipped: Vec<String>,
    pub catalog_perceptions: usize,
    pub catalog_deductions: usize,
    pub catalog_other_payments: usize,
}

/// State owned by one batch run. Created fresh for every run so nothing leaks
/// between batches.
#[derive(Debug, Default)]
struct BatchContext {
    catalog: Option<ConceptCatalog>,
    columns: ColumnRegistry,
}

/// Sequential pipeline driver: catalog pass (pre-scan strategy), per-document
/// normalization, then column ordering and reconciliation.
#[derive(Debug, Clone, Default)]
pub struct PayrollBatch {
    options: BatchOptions,
}

impl PayrollBatch {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    pub fn strategy(&self) -> CatalogStrategy {
        self.options.strategy
    }

    /// Processes a batch. Never fails: malformed documents are logged and
    /// left out of the dataset.
    pub fn run(&self, documents: &[RawDocument]) -> (Dataset, BatchReport) {
        tracing::info!(
            "Processing batch of {} documents (strategy: {})",
            documents.len(),
            self.options.strategy
        );

        let mut context = BatchContext::default();
        if self.options.strategy == CatalogStrategy::Prescan {
            context.catalog = Some(ConceptCatalog::build(documents));
        }

        let normalizer = DocumentNormalizer::new(context.catalog.as_ref());
        let mut records = Vec::with_capacity(documents.len());
        let mut skipped = Vec::new();
        for document in documents {
            match normalizer.normalize(document, &mut context.columns) {
                Some(record) => records.push(record),
                None => skipped.push(document.name.clone()),
            }
        }

        let mut report = BatchReport {
            strategy: self.options.strategy,
            documents_received: documents.len(),
            documents_normalized: records.len(),
            skipped,
            ..BatchReport::default()
        };
        if let Some(catalog) = &context.catalog {
            report.catalog_perceptions = catalog.concepts(Collection::Perceptions).len();
            report.catalog_deductions = catalog.concepts(Collection::Deductions).len();
            report.catalog_other_payments = catalog.concepts(Collection::OtherPayments).len();
        }

        let dataset = assemble_dataset(records, &context.columns);
        tracing::info!(
            "Batch finished. Rows: {}, Columns: {}, Skipped: {}",
            dataset.row_count(),
            dataset.column_count(),
            report.skipped.len()
        );
        (dataset, report)
    }
}
