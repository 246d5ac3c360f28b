// src/columns/ordering.rs
use super::ColumnRegistry;
use crate::cfdi::{FieldKind, Record, Value};
use serde::Serialize;
use std::collections::BTreeSet;

/// Final table: ordered columns, their kinds, and one row per normalized document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub kinds: Vec<FieldKind>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }
}

/// Sorts column names by their registered key, unregistered names last within
/// the standard section, ties broken by name.
pub fn order_columns<'a, I>(names: I, registry: &ColumnRegistry) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let unique: BTreeSet<&str> = names.into_iter().collect();
    let mut keyed: Vec<_> = unique.into_iter().map(|name| registry.sort_key(name)).collect();
    keyed.sort();
    keyed.into_iter().map(|key| key.name).collect()
}

/// Reindexes every record to the unified column order. A record lacking a
/// numeric column gets `0.0`; other missing cells stay blank.
pub fn assemble_dataset(records: Vec<Record>, registry: &ColumnRegistry) -> Dataset {
    if records.is_empty() {
        return Dataset::default();
    }

    let columns = order_columns(records.iter().flat_map(|r| r.columns()), registry);
    let kinds: Vec<FieldKind> = columns.iter().map(|c| registry.kind(c)).collect();

    let mut filled = 0usize;
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .zip(&kinds)
                .map(|(column, kind)| match record.get(column) {
                    Some(value) => Some(value.clone()),
                    None if kind.is_numeric() => {
                        filled += 1;
                        Some(Value::Number(0.0))
                    }
                    None => None,
                })
                .collect()
        })
        .collect();

    tracing::debug!(
        "Assembled dataset: {} rows x {} columns ({} numeric cells zero-filled)",
        records.len(),
        columns.len(),
        filled
    );

    Dataset { columns, kinds, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Section, SECTION_TOTAL_CODE};

    fn sample_registry() -> ColumnRegistry {
        let mut r = ColumnRegistry::new();
        r.register("NombreArchivo", Section::Standard, "0", 0, FieldKind::Text);
        r.register("UUID", Section::Standard, "0", 0, FieldKind::Text);
        r.register("Total", Section::Totals, "0", 0, FieldKind::Amount);
        r.register("Sueldo_Gravado", Section::Perceptions, "001", 0, FieldKind::Amount);
        r.register("Sueldo_Exento", Section::Perceptions, "001", 1, FieldKind::Amount);
        r.register("Bono_Gravado", Section::Perceptions, "038", 0, FieldKind::Amount);
        r.register_code("TotalPercepciones", Section::Perceptions, SECTION_TOTAL_CODE, 0, FieldKind::Amount);
        r.register("ISR", Section::Deductions, "001", 0, FieldKind::Amount);
        r.register("IMSS", Section::Deductions, "002", 0, FieldKind::Amount);
        r.register_code("TotalDeducciones", Section::Deductions, SECTION_TOTAL_CODE, 0, FieldKind::Amount);
        r.register("Subsidio", Section::OtherPayments, "002", 0, FieldKind::Amount);
        r.register_code("TotalOtrosPagos", Section::OtherPayments, SECTION_TOTAL_CODE, 0, FieldKind::Amount);
        r
    }

    #[test]
    fn test_order_is_independent_of_discovery_order() {
        let registry = sample_registry();
        let shuffled = [
            "IMSS", "Sueldo_Exento", "TotalDeducciones", "Total", "Subsidio", "NombreArchivo",
            "Bono_Gravado", "TotalOtrosPagos", "ISR", "TotalPercepciones", "UUID", "Sueldo_Gravado",
        ];
        let ordered = order_columns(shuffled, &registry);
        assert_eq!(
            ordered,
            vec![
                "NombreArchivo", "UUID",
                "Sueldo_Gravado", "Sueldo_Exento", "Bono_Gravado", "TotalPercepciones",
                "ISR", "IMSS", "TotalDeducciones",
                "Subsidio", "TotalOtrosPagos",
                "Total",
            ]
        );
    }

    #[test]
    fn test_section_total_closes_section_even_with_non_numeric_items() {
        let mut registry = sample_registry();
        registry.register("Zeta", Section::Perceptions, "ABC", 0, FieldKind::Amount);
        let ordered = order_columns(["TotalPercepciones", "Zeta", "ISR"], &registry);
        assert_eq!(ordered, vec!["Zeta", "TotalPercepciones", "ISR"]);
    }

    #[test]
    fn test_unregistered_columns_sort_last_in_standard() {
        let registry = sample_registry();
        let ordered = order_columns(["Sueldo_Gravado", "Beta", "UUID", "Alpha"], &registry);
        assert_eq!(ordered, vec!["UUID", "Alpha", "Beta", "Sueldo_Gravado"]);
    }

    #[test]
    fn test_assemble_fills_numeric_gaps_only() {
        let registry = sample_registry();
        let mut a = Record::new();
        a.insert("NombreArchivo", Value::Text("a.xml".into()));
        a.insert("UUID", Value::Text("u-1".into()));
        a.insert("ISR", Value::Number(10.0));
        let mut b = Record::new();
        b.insert("NombreArchivo", Value::Text("b.xml".into()));
        b.insert("IMSS", Value::Number(5.0));

        let dataset = assemble_dataset(vec![a, b], &registry);
        assert_eq!(dataset.columns, vec!["NombreArchivo", "UUID", "ISR", "IMSS"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.cell(1, "ISR"), Some(&Value::Number(0.0)));
        assert_eq!(dataset.cell(0, "IMSS"), Some(&Value::Number(0.0)));
        assert_eq!(dataset.cell(1, "UUID"), None);
    }

    #[test]
    fn test_assemble_empty() {
        let dataset = assemble_dataset(Vec::new(), &ColumnRegistry::new());
        assert!(dataset.is_empty());
        assert_eq!(dataset.column_count(), 0);
    }
}
