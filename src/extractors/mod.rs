// src/extractors/mod.rs
pub mod attributes;
pub mod catalog;
pub mod document;

// Re-export key extraction types for convenience
pub use attributes::{parse_amount, FieldValue, NamespaceSet};
pub use catalog::ConceptCatalog;
pub use document::DocumentNormalizer;
