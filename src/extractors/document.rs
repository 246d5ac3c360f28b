// src/extractors/document.rs

// --- Imports ---
use crate::cfdi::{Amounts, Collection, FieldKind, LineItem, RawDocument, Record, Value};
use crate::columns::{parse_code, ColumnRegistry, Section, SECTION_TOTAL_CODE};
use crate::extractors::attributes::{
    attr, find_all, find_descendant, find_element, parse_amount, text_attr, FieldValue, CFDI, NOMINA,
    STAMP,
};
use crate::extractors::catalog::ConceptCatalog;
use crate::utils::error::ExtractError;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};
use std::borrow::Cow;

// --- Constants ---
const INVOICE_TAG: &str = "Comprobante";

pub const SOURCE_NAME_COLUMN: &str = "NombreArchivo";
pub const UUID_COLUMN: &str = "UUID";
pub const SUBSIDY_COLUMN: &str = "SubsidioCausado";

// Column code groups inside the standard section.
const CODE_DOCUMENT: i64 = 0;
const CODE_ISSUER: i64 = 1;
const CODE_RECIPIENT: i64 = 2;
const CODE_PERIOD: i64 = 3;
const CODE_DAYS: i64 = 4;

// --- Regex Patterns (Lazy Static) ---
static UUID_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("Failed to compile UUID_NAME_RE")
});

static XML_ENCODING_RE: Lazy<regex::bytes::Regex> = Lazy::new(|| {
    regex::bytes::Regex::new(r#"\A\s*<\?xml\s[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("Failed to compile XML_ENCODING_RE")
});

// --- Parsing Helpers ---

/// Encoding named by the XML declaration. Only ASCII-compatible encodings
/// count, since the declaration itself was read as ASCII.
fn declared_encoding(content: &[u8]) -> Option<&'static Encoding> {
    let label = XML_ENCODING_RE.captures(content)?.get(1)?;
    Encoding::for_label_no_replacement(label.as_bytes()).filter(|e| e.is_ascii_compatible())
}

/// Decodes document bytes to text. A byte-order mark wins, then the encoding
/// of the XML declaration, then UTF-8. The mark itself is dropped.
pub fn decode(content: &[u8]) -> Result<Cow<'_, str>, ExtractError> {
    let (encoding, body) = match Encoding::for_bom(content) {
        Some((encoding, bom_len)) => (encoding, &content[bom_len..]),
        None => (declared_encoding(content).unwrap_or(UTF_8), content),
    };
    if encoding != UTF_8 {
        tracing::debug!("Transcoding document from {}", encoding.name());
    }
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(ExtractError::Encoding(encoding.name()));
    }
    Ok(text)
}

pub fn parse_xml(text: &str) -> Result<Document<'_>, ExtractError> {
    Ok(Document::parse(text)?)
}

/// Finds the `Comprobante` element: namespaced or bare at the top level, then
/// one level down, then anywhere, then the root element itself when its tag
/// ends with `Comprobante`.
pub fn locate_invoice<'a, 'input>(xml: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    let root = xml.root_element();
    find_element(xml.root(), INVOICE_TAG, CFDI)
        .or_else(|| find_element(root, INVOICE_TAG, CFDI))
        .or_else(|| find_descendant(root, INVOICE_TAG, CFDI))
        .or_else(|| root.tag_name().name().ends_with(INVOICE_TAG).then_some(root))
}

fn locate_complement<'a, 'input>(invoice: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    find_element(invoice, "Complemento", CFDI)
}

fn locate_stamp<'a, 'input>(invoice: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    locate_complement(invoice)
        .and_then(|c| find_element(c, "TimbreFiscalDigital", STAMP))
        .or_else(|| find_descendant(invoice, "TimbreFiscalDigital", STAMP))
}

/// The payroll complement, normally `Complemento/Nomina`.
pub fn locate_payroll<'a, 'input>(invoice: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    locate_complement(invoice)
        .and_then(|c| find_element(c, "Nomina", NOMINA))
        .or_else(|| find_descendant(invoice, "Nomina", NOMINA))
}

/// Reads every perception, deduction and other-payment line item of a payroll
/// block, in document order per collection. Items without a concept are dropped.
pub fn line_items(payroll: Node) -> Vec<LineItem> {
    let mut items = Vec::new();
    for collection in Collection::ALL {
        let Some(container) = find_element(payroll, collection.container_tag(), NOMINA) else {
            continue;
        };
        for node in find_all(container, collection.item_tag(), NOMINA) {
            let concept = text_attr(node, "Concepto");
            if concept.is_empty() {
                tracing::debug!("Skipping {} without Concepto", collection.item_tag());
                continue;
            }
            let kind = text_attr(node, collection.kind_attr());
            let code = match text_attr(node, "Clave") {
                "" => kind,
                clave => clave,
            };
            let amounts = match collection {
                Collection::Perceptions => Amounts::Split {
                    taxed: parse_amount(text_attr(node, "ImporteGravado")),
                    exempt: parse_amount(text_attr(node, "ImporteExento")),
                },
                Collection::Deductions | Collection::OtherPayments => {
                    Amounts::Single(parse_amount(text_attr(node, "Importe")))
                }
            };
            let subsidy = match collection {
                Collection::OtherPayments => find_element(node, "SubsidioAlEmpleo", NOMINA)
                    .map(|s| text_attr(s, "SubsidioCausado"))
                    .filter(|raw| !raw.is_empty())
                    .map(parse_amount),
                _ => None,
            };
            items.push(LineItem {
                collection,
                concept: concept.to_string(),
                code: code.to_string(),
                kind: kind.to_string(),
                amounts,
                subsidy,
            });
        }
    }
    items
}

/// UUID-shaped substring of a source name, case preserved.
pub fn uuid_from_name(name: &str) -> Option<&str> {
    UUID_NAME_RE.find(name).map(|m| m.as_str())
}

/// Resolves the fiscal UUID: stamp block, then the invoice element, then the
/// first element in the document carrying one, then the source name.
pub fn resolve_uuid(stamp: Option<Node>, invoice: Node, xml: &Document, source_name: &str) -> String {
    let non_empty = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    if let Some(uuid) = non_empty(stamp.and_then(|s| attr(s, "UUID"))) {
        return uuid;
    }
    if let Some(uuid) = non_empty(attr(invoice, "UUID")) {
        tracing::debug!("UUID for {} taken from the invoice element", source_name);
        return uuid;
    }
    if let Some(uuid) = xml
        .descendants()
        .filter(|n| n.is_element())
        .find_map(|n| non_empty(attr(n, "UUID")))
    {
        tracing::debug!("UUID for {} taken from first element carrying one", source_name);
        return uuid;
    }
    if let Some(uuid) = uuid_from_name(source_name) {
        tracing::info!("UUID for {} taken from the source name", source_name);
        return uuid.to_string();
    }
    tracing::warn!("No UUID found in {} nor in its name", source_name);
    String::new()
}

// --- Record Assembly ---

/// Writes fields into a record and registers their ordering metadata in one step.
struct RecordBuilder<'r> {
    record: Record,
    registry: &'r mut ColumnRegistry,
}

impl<'r> RecordBuilder<'r> {
    fn new(registry: &'r mut ColumnRegistry) -> Self {
        Self { record: Record::new(), registry }
    }

    fn put(&mut self, column: &str, value: Value, section: Section, code: i64, sub_item: u8, kind: FieldKind) {
        if self.record.insert(column, value).is_some() {
            tracing::debug!("Column '{}' reported twice; keeping the last value", column);
        }
        self.registry.register_code(column, section, code, sub_item, kind);
    }

    fn put_field(&mut self, field: FieldValue, column: &str, code: i64) {
        self.put(column, field.value(), Section::Standard, code, 0, field.kind);
    }

    /// Copies `attributes` of `node` as standard columns named `{prefix}{attribute}`
    /// (or the attribute name alone when `prefix` is empty).
    fn put_attributes(&mut self, node: Node, prefix: &str, attributes: &[(&str, FieldKind)], code: i64) {
        for (name, kind) in attributes {
            let column = format!("{}{}", prefix, name);
            self.put_field(FieldValue::read(node, name, *kind), &column, code);
        }
    }

    fn finish(self) -> Record {
        self.record
    }
}

/// Turns one CFDI payroll document into a flat record.
///
/// With a catalog (pre-scan strategy) every catalog concept missing from the
/// document is written as zero so all records share the concept columns.
pub struct DocumentNormalizer<'c> {
    catalog: Option<&'c ConceptCatalog>,
}

impl<'c> DocumentNormalizer<'c> {
    pub fn new(catalog: Option<&'c ConceptCatalog>) -> Self {
        Self { catalog }
    }

    /// Normalizes a document. Parse failures are logged and yield `None`;
    /// they never escape to the caller.
    pub fn normalize(&self, document: &RawDocument, registry: &mut ColumnRegistry) -> Option<Record> {
        match self.try_normalize(document, registry) {
            Ok(record) => {
                tracing::debug!("Normalized {} into {} columns", document.name, record.len());
                Some(record)
            }
            Err(e) => {
                tracing::error!("Skipping {}: {}", document.name, e);
                None
            }
        }
    }

    fn try_normalize(&self, document: &RawDocument, registry: &mut ColumnRegistry) -> Result<Record, ExtractError> {
        let text = decode(&document.content)?;
        let xml = parse_xml(&text)?;
        let invoice = locate_invoice(&xml).unwrap_or_else(|| {
            tracing::warn!("No Comprobante element in {}; reading from the root element", document.name);
            xml.root_element()
        });

        let mut builder = RecordBuilder::new(registry);
        builder.put(
            SOURCE_NAME_COLUMN,
            Value::Text(document.name.clone()),
            Section::Standard,
            CODE_DOCUMENT,
            0,
            FieldKind::Text,
        );

        Self::extract_invoice(&mut builder, invoice);
        Self::extract_parties(&mut builder, invoice);

        let stamp = locate_stamp(invoice);
        if let Some(stamp) = stamp {
            builder.put_field(FieldValue::read(stamp, "FechaTimbrado", FieldKind::Date), "FechaTimbrado", CODE_DOCUMENT);
        }
        let uuid = resolve_uuid(stamp, invoice, &xml, &document.name);
        builder.put(UUID_COLUMN, Value::Text(uuid), Section::Standard, CODE_DOCUMENT, 0, FieldKind::Text);

        match locate_payroll(invoice) {
            Some(payroll) => {
                Self::extract_payroll(&mut builder, payroll);
                for item in line_items(payroll) {
                    Self::put_line_item(&mut builder, &item);
                }
            }
            None => tracing::warn!("No Nomina complement in {}", document.name),
        }

        let mut record = builder.finish();
        if let Some(catalog) = self.catalog {
            zero_fill(&mut record, catalog);
        }
        Ok(record)
    }

    fn extract_invoice(builder: &mut RecordBuilder, invoice: Node) {
        builder.put_attributes(
            invoice,
            "",
            &[
                ("Serie", FieldKind::Text),
                ("Folio", FieldKind::Text),
                ("Fecha", FieldKind::Date),
                ("Moneda", FieldKind::Text),
                ("Sello", FieldKind::Text),
            ],
            CODE_DOCUMENT,
        );
        for name in ["Total", "SubTotal"] {
            let field = FieldValue::read(invoice, name, FieldKind::Amount);
            builder.put(name, field.value(), Section::Totals, 0, 0, FieldKind::Amount);
        }
    }

    fn extract_parties(builder: &mut RecordBuilder, invoice: Node) {
        if let Some(issuer) = find_element(invoice, "Emisor", CFDI) {
            builder.put_field(FieldValue::read(issuer, "Rfc", FieldKind::Text), "Emisor_RFC", CODE_ISSUER);
            builder.put_attributes(
                issuer,
                "Emisor_",
                &[("Nombre", FieldKind::Text), ("RegimenFiscal", FieldKind::Text)],
                CODE_ISSUER,
            );
        }
        if let Some(recipient) = find_element(invoice, "Receptor", CFDI) {
            builder.put_field(FieldValue::read(recipient, "Rfc", FieldKind::Text), "Receptor_RFC", CODE_RECIPIENT);
            builder.put_attributes(
                recipient,
                "Receptor_",
                &[("Nombre", FieldKind::Text), ("UsoCFDI", FieldKind::Text)],
                CODE_RECIPIENT,
            );
            for (attribute, column) in [
                ("RegimenFiscalReceptor", "Receptor_RegimenFiscal"),
                ("DomicilioFiscalReceptor", "Receptor_DomicilioFiscal"),
            ] {
                builder.put_field(FieldValue::read(recipient, attribute, FieldKind::Text), column, CODE_RECIPIENT);
            }
        }
    }

    fn extract_payroll(builder: &mut RecordBuilder, payroll: Node) {
        builder.put_attributes(
            payroll,
            "",
            &[
                ("TipoNomina", FieldKind::Text),
                ("FechaPago", FieldKind::Date),
                ("FechaInicialPago", FieldKind::Date),
                ("FechaFinalPago", FieldKind::Date),
            ],
            CODE_PERIOD,
        );
        builder.put_field(FieldValue::read(payroll, "Version", FieldKind::Text), "Nomina_Version", CODE_PERIOD);
        builder.put_field(FieldValue::read(payroll, "NumDiasPagados", FieldKind::Amount), "NumDiasPagados", CODE_DAYS);

        for (name, section) in [
            ("TotalPercepciones", Section::Perceptions),
            ("TotalDeducciones", Section::Deductions),
            ("TotalOtrosPagos", Section::OtherPayments),
        ] {
            let field = FieldValue::read(payroll, name, FieldKind::Amount);
            builder.put(name, field.value(), section, SECTION_TOTAL_CODE, 0, FieldKind::Amount);
        }

        if let Some(employer) = find_element(payroll, "Emisor", NOMINA) {
            builder.put_attributes(employer, "Emisor_", &[("RegistroPatronal", FieldKind::Text)], CODE_ISSUER);
        }
        if let Some(employee) = find_element(payroll, "Receptor", NOMINA) {
            builder.put_field(FieldValue::read(employee, "Curp", FieldKind::Text), "Receptor_CURP", CODE_RECIPIENT);
            builder.put_field(
                FieldValue::read(employee, "NumSeguridadSocial", FieldKind::Text),
                "Receptor_NSS",
                CODE_RECIPIENT,
            );
            builder.put_field(
                FieldValue::read(employee, "Antigüedad", FieldKind::Text),
                "Receptor_Antiguedad",
                CODE_RECIPIENT,
            );
            builder.put_attributes(
                employee,
                "Receptor_",
                &[
                    ("NumEmpleado", FieldKind::Text),
                    ("Departamento", FieldKind::Text),
                    ("Puesto", FieldKind::Text),
                    ("PeriodicidadPago", FieldKind::Text),
                    ("TipoContrato", FieldKind::Text),
                    ("Sindicalizado", FieldKind::Text),
                    ("TipoJornada", FieldKind::Text),
                    ("TipoRegimen", FieldKind::Text),
                    ("RiesgoPuesto", FieldKind::Text),
                    ("ClaveEntFed", FieldKind::Text),
                    ("FechaInicioRelLaboral", FieldKind::Date),
                    ("SalarioBaseCotApor", FieldKind::Amount),
                    ("SalarioDiarioIntegrado", FieldKind::Amount),
                ],
                CODE_RECIPIENT,
            );
        }
    }

    fn put_line_item(builder: &mut RecordBuilder, item: &LineItem) {
        let code = parse_code(&item.code);
        let section = match item.collection {
            Collection::Perceptions => Section::Perceptions,
            Collection::Deductions => Section::Deductions,
            Collection::OtherPayments => Section::OtherPayments,
        };
        match item.amounts {
            Amounts::Split { taxed, exempt } => {
                builder.put(&taxed_column(&item.concept), Value::Number(taxed), section, code, 0, FieldKind::Amount);
                builder.put(&exempt_column(&item.concept), Value::Number(exempt), section, code, 1, FieldKind::Amount);
            }
            Amounts::Single(amount) => {
                builder.put(&item.concept, Value::Number(amount), section, code, 0, FieldKind::Amount);
            }
        }
        if let Some(subsidy) = item.subsidy {
            builder.put(SUBSIDY_COLUMN, Value::Number(subsidy), section, code, 1, FieldKind::Amount);
        }
    }
}

pub fn taxed_column(concept: &str) -> String {
    format!("{}_Gravado", concept)
}

pub fn exempt_column(concept: &str) -> String {
    format!("{}_Exento", concept)
}

fn zero_fill(record: &mut Record, catalog: &ConceptCatalog) {
    let mut columns = Vec::new();
    for concept in catalog.concepts(Collection::Perceptions) {
        columns.push(taxed_column(concept));
        columns.push(exempt_column(concept));
    }
    for collection in [Collection::Deductions, Collection::OtherPayments] {
        columns.extend(catalog.concepts(collection).iter().cloned());
    }
    for column in columns {
        if !record.contains(&column) {
            tracing::trace!("Zero-filling catalog column '{}'", column);
            record.insert(column, Value::Number(0.0));
        }
    }
}
