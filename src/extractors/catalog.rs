// src/extractors/catalog.rs
use crate::cfdi::{Collection, RawDocument};
use crate::extractors::document::{decode, line_items, locate_invoice, locate_payroll, parse_xml};
use crate::utils::error::ExtractError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Every concept label seen in a batch, per collection. Built in a first pass
/// over all documents and frozen before any record is produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConceptCatalog {
    perceptions: BTreeSet<String>,
    deductions: BTreeSet<String>,
    other_payments: BTreeSet<String>,
}

impl ConceptCatalog {
    /// Scans every document. Documents that fail to parse are logged and skipped.
    pub fn build(documents: &[RawDocument]) -> Self {
        tracing::info!("Building concept catalog from {} documents", documents.len());
        let mut catalog = Self::default();
        for document in documents {
            if let Err(e) = catalog.scan_document(document) {
                tracing::warn!("Could not scan concepts of {}: {}", document.name, e);
            }
        }
        tracing::info!(
            "Catalog built: {} perceptions, {} deductions, {} other payments",
            catalog.perceptions.len(),
            catalog.deductions.len(),
            catalog.other_payments.len()
        );
        catalog
    }

    /// Adds the concept labels of one document.
    pub fn scan_document(&mut self, document: &RawDocument) -> Result<(), ExtractError> {
        let text = decode(&document.content)?;
        let xml = parse_xml(&text)?;
        let invoice = locate_invoice(&xml).unwrap_or_else(|| xml.root_element());
        let Some(payroll) = locate_payroll(invoice) else {
            tracing::debug!("No payroll block in {}; nothing to catalog", document.name);
            return Ok(());
        };
        for item in line_items(payroll) {
            self.set_mut(item.collection).insert(item.concept);
        }
        Ok(())
    }

    pub fn concepts(&self, collection: Collection) -> &BTreeSet<String> {
        match collection {
            Collection::Perceptions => &self.perceptions,
            Collection::Deductions => &self.deductions,
            Collection::OtherPayments => &self.other_payments,
        }
    }

    pub fn contains(&self, collection: Collection, concept: &str) -> bool {
        self.concepts(collection).contains(concept)
    }

    pub fn len(&self) -> usize {
        Collection::ALL.iter().map(|c| self.concepts(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_mut(&mut self, collection: Collection) -> &mut BTreeSet<String> {
        match collection {
            Collection::Perceptions => &mut self.perceptions,
            Collection::Deductions => &mut self.deductions,
            Collection::OtherPayments => &mut self.other_payments,
        }
    }
}
