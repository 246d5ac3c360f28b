// src/extractors/attributes.rs

// --- Imports ---
use crate::cfdi::namespaces::{CFDI_V3, CFDI_V4, NOMINA_V11, NOMINA_V12, TFD};
use crate::cfdi::{FieldKind, Value};
use roxmltree::Node;

// --- Namespace Sets ---

/// Namespaces an element may be declared under, tried in order:
/// primary, legacy (when the family has one), then no namespace at all.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceSet {
    pub primary: &'static str,
    pub legacy: Option<&'static str>,
}

pub const CFDI: NamespaceSet = NamespaceSet { primary: CFDI_V4, legacy: Some(CFDI_V3) };
pub const NOMINA: NamespaceSet = NamespaceSet { primary: NOMINA_V12, legacy: Some(NOMINA_V11) };
pub const STAMP: NamespaceSet = NamespaceSet { primary: TFD, legacy: None };

impl NamespaceSet {
    fn tiers(&self) -> Vec<Option<&'static str>> {
        let mut tiers = vec![Some(self.primary)];
        if let Some(legacy) = self.legacy {
            tiers.push(Some(legacy));
        }
        tiers.push(None);
        tiers
    }
}

fn is_element_named(node: &Node, namespace: Option<&str>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == namespace
}

// --- Element Lookup ---

/// First direct child of `parent` called `name`, trying each namespace tier in turn.
pub fn find_element<'a, 'input>(
    parent: Node<'a, 'input>,
    name: &str,
    namespaces: NamespaceSet,
) -> Option<Node<'a, 'input>> {
    namespaces
        .tiers()
        .into_iter()
        .find_map(|ns| parent.children().find(|child| is_element_named(child, ns, name)))
}

/// First element below `root` (document order, `root` excluded) called `name`.
pub fn find_descendant<'a, 'input>(
    root: Node<'a, 'input>,
    name: &str,
    namespaces: NamespaceSet,
) -> Option<Node<'a, 'input>> {
    namespaces
        .tiers()
        .into_iter()
        .find_map(|ns| root.descendants().skip(1).find(|node| is_element_named(node, ns, name)))
}

/// All direct children of `parent` called `name` under the first namespace tier
/// that yields any.
pub fn find_all<'a, 'input>(
    parent: Node<'a, 'input>,
    name: &str,
    namespaces: NamespaceSet,
) -> Vec<Node<'a, 'input>> {
    for ns in namespaces.tiers() {
        let found: Vec<_> = parent
            .children()
            .filter(|child| is_element_named(child, ns, name))
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

// --- Attribute Lookup ---

/// Attribute value by exact name, falling back to a case-insensitive scan.
pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    if let Some(value) = node.attribute(name) {
        return Some(value);
    }
    let wanted = name.to_lowercase();
    node.attributes()
        .find(|a| a.name().to_lowercase() == wanted)
        .map(|a| a.value())
}

/// Attribute value or `""`.
pub fn text_attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    attr(node, name).unwrap_or("")
}

/// Attribute value coerced to a number; missing or malformed yields `0.0`.
pub fn amount_attr(node: Node, name: &str) -> f64 {
    parse_amount(text_attr(node, name))
}

/// Lenient float parsing: empty, unparseable or non-finite input is `0.0`.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => {
            tracing::trace!("Coercing unparseable amount '{}' to 0.0", trimmed);
            0.0
        }
    }
}

// --- Typed Fields ---

/// A named attribute read off an element, before coercion.
#[derive(Debug, Clone, Copy)]
pub struct FieldValue<'a> {
    pub name: &'a str,
    pub kind: FieldKind,
    pub raw: &'a str,
}

impl<'a> FieldValue<'a> {
    pub fn read(node: Node<'a, '_>, name: &'a str, kind: FieldKind) -> Self {
        Self { name, kind, raw: text_attr(node, name) }
    }

    pub fn value(&self) -> Value {
        match self.kind {
            FieldKind::Amount => Value::Number(parse_amount(self.raw)),
            FieldKind::Text | FieldKind::Date => Value::Text(self.raw.to_string()),
        }
    }
}
