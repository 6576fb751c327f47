use serde::{Deserialize, Serialize};

/// Resultado completo de uma verificação: contagem + um relatório por
/// assinatura, na ordem em que os campos aparecem no documento.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutput {
  pub count: u32,
  pub signatures: Vec<SignatureReport>,
}

/// Atributos do titular extraídos do subject do certificado do signatário.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignerIdentity {
  pub common_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub state_or_province: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub city: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub organization: Option<String>,
}

/// Atributos do emissor (issuer) do certificado do signatário.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerIdentity {
  pub common_name: String,
  pub organization: String,
  pub country: String,
}

impl Default for IssuerIdentity {
  fn default() -> Self {
    Self {
      common_name: "N/A".to_string(),
      organization: "N/A".to_string(),
      country: "N/A".to_string(),
    }
  }
}

/// Um certificado presente no CMS, descrito sem decisão de confiança.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
  pub subject: String,
  pub issuer: String,
  pub is_self_signed: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub key_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampInfo {
  pub timestamp: String,
}

/// Classificação temporal do certificado em relação ao relógio atual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStatus {
  Expired,
  ExpiringSoon,
  Valid,
  Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureValidation {
  pub is_structure_valid: bool,
  pub validation_summary: String,
  pub warnings: Vec<String>,
  pub formatting_errors: Vec<String>,
}

impl Default for StructureValidation {
  fn default() -> Self {
    Self {
      is_structure_valid: true,
      validation_summary: "Valid".to_string(),
      warnings: Vec::new(),
      formatting_errors: Vec::new(),
    }
  }
}

/// Relatório de uma assinatura. Construído uma única vez por campo,
/// preenchido pelo orquestrador e então congelado na lista de saída.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureReport {
  pub field_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub signer: Option<SignerIdentity>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub issuer: Option<IssuerIdentity>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub signing_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub signing_timezone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub valid_from: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub valid_until: Option<String>,
  pub is_valid: bool,
  pub is_expired: bool,
  pub expiration_status: ExpirationStatus,
  pub days_until_expiry: Option<i64>,
  pub intact: bool,
  pub document_unchanged: bool,
  pub cryptographic_signature_valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cryptographic_message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coverage: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_size: Option<u64>,
  pub has_timestamp: bool,
  pub timestamp_source: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp_info: Option<TimestampInfo>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub key_size: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hash_algorithm: Option<String>,
  pub certificate_chain: Vec<ChainEntry>,
  pub is_self_signed: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub byte_range: Option<String>,
  pub structure_validation: StructureValidation,
}

impl SignatureReport {
  pub fn new(field_name: &str) -> Self {
    Self {
      field_name: field_name.to_string(),
      signer: None,
      issuer: None,
      signing_time: None,
      signing_timezone: None,
      valid_from: None,
      valid_until: None,
      is_valid: false,
      is_expired: false,
      expiration_status: ExpirationStatus::Unknown,
      days_until_expiry: None,
      intact: false,
      document_unchanged: false,
      cryptographic_signature_valid: false,
      cryptographic_message: None,
      coverage: None,
      total_size: None,
      has_timestamp: false,
      timestamp_source: "local-clock".to_string(),
      timestamp_info: None,
      key_size: None,
      hash_algorithm: None,
      certificate_chain: Vec::new(),
      is_self_signed: false,
      byte_range: None,
      structure_validation: StructureValidation::default(),
    }
  }

  /// Registra um erro de formatação (já truncado pelo orquestrador) e
  /// invalida a estrutura.
  pub fn push_error(&mut self, message: String) {
    self.structure_validation.formatting_errors.push(message);
    self.structure_validation.is_structure_valid = false;
  }

  pub fn push_warning(&mut self, message: String) {
    self.structure_validation.warnings.push(message);
  }

  /// Fecha o relatório: resumo "Valid" sem erros, senão o primeiro erro
  /// truncado a 150 caracteres.
  pub fn finalize_summary(&mut self) {
    let sv = &mut self.structure_validation;
    if sv.formatting_errors.is_empty() {
      sv.is_structure_valid = true;
      sv.validation_summary = "Valid".to_string();
    } else {
      sv.is_structure_valid = false;
      let first: String = sv.formatting_errors[0].chars().take(150).collect();
      sv.validation_summary = format!("Invalid - {}", first);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_report_defaults() {
    let report = SignatureReport::new("Signature1");
    assert_eq!(report.field_name, "Signature1");
    assert!(report.structure_validation.is_structure_valid);
    assert_eq!(report.timestamp_source, "local-clock");
    assert_eq!(report.expiration_status, ExpirationStatus::Unknown);
  }

  #[test]
  fn test_finalize_summary_valid() {
    let mut report = SignatureReport::new("Sig");
    report.finalize_summary();
    assert_eq!(report.structure_validation.validation_summary, "Valid");
    assert!(report.structure_validation.is_structure_valid);
  }

  #[test]
  fn test_finalize_summary_invalid_truncates() {
    let mut report = SignatureReport::new("Sig");
    report.push_error("e".repeat(400));
    report.finalize_summary();
    let summary = &report.structure_validation.validation_summary;
    assert!(summary.starts_with("Invalid - "));
    assert_eq!(summary.len(), "Invalid - ".len() + 150);
    assert!(!report.structure_validation.is_structure_valid);
  }

  #[test]
  fn test_expiration_status_serialization() {
    let json = serde_json::to_string(&ExpirationStatus::ExpiringSoon).unwrap();
    assert_eq!(json, "\"expiring_soon\"");
  }

  #[test]
  fn test_report_serializes_stable_layout() {
    let mut report = SignatureReport::new("Sig1");
    report.byte_range = Some("[0, 100, 200, 50]".to_string());
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["field_name"], "Sig1");
    assert_eq!(value["byte_range"], "[0, 100, 200, 50]");
    // Campos opcionais ausentes não aparecem no JSON
    assert!(value.get("signing_time").is_none());
    assert_eq!(value["structure_validation"]["validation_summary"], "Valid");
  }
}
