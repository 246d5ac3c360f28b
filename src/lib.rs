// src/lib.rs
//! Consolidates SAT CFDI payroll ("Nomina") documents into one table.
//!
//! Documents flow through [`batch::PayrollBatch`]: an optional concept-catalog
//! pass, per-document normalization into flat records, then column ordering
//! and reconciliation into a [`columns::Dataset`].

pub mod batch;
pub mod cfdi;
pub mod columns;
pub mod extractors;
pub mod loader;
pub mod storage;
pub mod utils;

pub use batch::{BatchOptions, BatchReport, CatalogStrategy, PayrollBatch};
pub use cfdi::{RawDocument, Record, Value};
pub use columns::Dataset;
