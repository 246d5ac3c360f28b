// src/cfdi/mod.rs
pub mod models;
pub mod namespaces;

pub use models::{Amounts, Collection, FieldKind, LineItem, RawDocument, Record, Value};
