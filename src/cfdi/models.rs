// src/cfdi/models.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw bytes of one CFDI document together with the name it was supplied under
/// (file name, archive entry name, upload name).
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub content: Vec<u8>,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Semantic kind of an extracted field. Only `Amount` columns are zero-filled
/// when a record lacks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Amount,
    Text,
    Date,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Amount)
    }
}

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// The three line-item collections of the payroll complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Collection {
    Perceptions,
    Deductions,
    OtherPayments,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Perceptions,
        Collection::Deductions,
        Collection::OtherPayments,
    ];

    /// Container element under the payroll block (`Percepciones`, ...).
    pub fn container_tag(self) -> &'static str {
        match self {
            Collection::Perceptions => "Percepciones",
            Collection::Deductions => "Deducciones",
            Collection::OtherPayments => "OtrosPagos",
        }
    }

    /// Line-item element inside the container (`Percepcion`, ...).
    pub fn item_tag(self) -> &'static str {
        match self {
            Collection::Perceptions => "Percepcion",
            Collection::Deductions => "Deduccion",
            Collection::OtherPayments => "OtroPago",
        }
    }

    /// Attribute carrying the SAT sub-classification, also used as the code
    /// when `Clave` is empty.
    pub fn kind_attr(self) -> &'static str {
        match self {
            Collection::Perceptions => "TipoPercepcion",
            Collection::Deductions => "TipoDeduccion",
            Collection::OtherPayments => "TipoOtroPago",
        }
    }
}

/// Amounts reported by a line item. Perceptions split taxed/exempt, the other
/// collections carry a single figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amounts {
    Split { taxed: f64, exempt: f64 },
    Single(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub collection: Collection,
    pub concept: String,
    pub code: String,
    pub kind: String,
    pub amounts: Amounts,
    /// `SubsidioCausado` of a nested employment-subsidy element (other payments only).
    pub subsidy: Option<f64>,
}

/// One flat row produced from a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(column.into(), value)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
