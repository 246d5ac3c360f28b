// src/columns/mod.rs
pub mod ordering;

use crate::cfdi::FieldKind;
use serde::Serialize;
use std::collections::HashMap;

pub use ordering::{assemble_dataset, order_columns, Dataset};

// --- Constants ---
/// Code given to columns whose classification is not an integer.
pub const NON_NUMERIC_CODE: i64 = 99_999;
/// Code reserved for a section's declared total so it closes its section.
pub const SECTION_TOTAL_CODE: i64 = i64::MAX;

/// Output sections in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Section {
    Standard = 0,
    Perceptions = 1,
    Deductions = 2,
    OtherPayments = 3,
    Totals = 4,
}

/// Ordering key of a column. Field order matters: the derived `Ord` compares
/// section, then code, then sub-item, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SortKey {
    pub section: Section,
    pub code: i64,
    pub sub_item: u8,
    pub name: String,
}

impl SortKey {
    /// Key for a column nothing registered.
    pub fn unregistered(name: &str) -> Self {
        Self {
            section: Section::Standard,
            code: NON_NUMERIC_CODE,
            sub_item: 0,
            name: name.to_string(),
        }
    }
}

/// Integer value of a classification code, `NON_NUMERIC_CODE` otherwise.
pub fn parse_code(code: &str) -> i64 {
    code.trim().parse::<i64>().unwrap_or(NON_NUMERIC_CODE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub key: SortKey,
    pub kind: FieldKind,
}

/// Batch-scoped column metadata. Keyed by column name; registering a name
/// again replaces its spec.
#[derive(Debug, Default, Clone)]
pub struct ColumnRegistry {
    specs: HashMap<String, ColumnSpec>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, section: Section, code: &str, sub_item: u8, kind: FieldKind) {
        self.register_code(name, section, parse_code(code), sub_item, kind);
    }

    pub fn register_code(&mut self, name: &str, section: Section, code: i64, sub_item: u8, kind: FieldKind) {
        let key = SortKey { section, code, sub_item, name: name.to_string() };
        if let Some(previous) = self.specs.insert(name.to_string(), ColumnSpec { key, kind }) {
            tracing::trace!("Column '{}' re-registered (was {:?})", name, previous.key);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.specs.get(name)
    }

    pub fn sort_key(&self, name: &str) -> SortKey {
        self.specs
            .get(name)
            .map(|spec| spec.key.clone())
            .unwrap_or_else(|| SortKey::unregistered(name))
    }

    /// Kind of a column; unregistered columns are treated as text.
    pub fn kind(&self, name: &str) -> FieldKind {
        self.specs.get(name).map(|spec| spec.kind).unwrap_or(FieldKind::Text)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
