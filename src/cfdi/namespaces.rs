// src/cfdi/namespaces.rs
//! Namespace URIs published by the SAT for the document families we read.

/// CFDI 4.0
pub const CFDI_V4: &str = "http://www.sat.gob.mx/cfd/4";
/// CFDI 3.3 (still common in older archives)
pub const CFDI_V3: &str = "http://www.sat.gob.mx/cfd/3";
/// Payroll complement 1.2
pub const NOMINA_V12: &str = "http://www.sat.gob.mx/nomina12";
/// Payroll complement 1.1
pub const NOMINA_V11: &str = "http://www.sat.gob.mx/nomina";
/// Digital stamp complement
pub const TFD: &str = "http://www.sat.gob.mx/TimbreFiscalDigital";
