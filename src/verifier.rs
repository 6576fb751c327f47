use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, TimeZone, Utc};

use crate::certificate::{
  Certificate, OID_RDN_COMMON_NAME, OID_RDN_COUNTRY, OID_RDN_LOCALITY, OID_RDN_ORGANIZATION,
  OID_RDN_SERIAL_NUMBER, OID_RDN_STATE, OID_RDN_UID,
};
use crate::cms::{CmsSignature, OID_CONTENT_TYPE, OID_MESSAGE_DIGEST, OID_SIGNING_TIME};
use crate::crypto::{self, DigestAlg};
use crate::error::{truncate_message, PdfVerifyError, Result};
use crate::integrity;
use crate::reader::{PdfReader, SignatureField};
use crate::report::{
  ChainEntry, ExpirationStatus, IssuerIdentity, SignatureReport, SignerIdentity, TimestampInfo,
  VerificationOutput,
};
use crate::signing_time::{resolve_signing_time, SigningTime};
use crate::timestamp::detect_timestamp;

/// Configuração do verificador.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
  /// Janela, em dias, para classificar um certificado como `expiring_soon`.
  pub expiry_warning_days: i64,
  /// Certificados emitidos neste ano ou antes são tratados como inválidos
  /// (defesa contra datas na época zero do Unix).
  pub min_not_before_year: i32,
  /// Tamanho máximo das mensagens registradas em `formatting_errors`.
  pub max_error_len: usize,
}

impl Default for VerifyConfig {
  fn default() -> Self {
    Self {
      expiry_warning_days: 30,
      min_not_before_year: 1975,
      max_error_len: 200,
    }
  }
}

/// Estrutura principal para verificação de assinaturas em PDFs.
///
/// Síncrona e sem estado compartilhado: cada chamada é uma função pura de
/// `(bytes do PDF, relógio atual)`. O log sai pela fachada `log`; quem chama
/// decide qual sink instalar.
pub struct PdfVerifier {
  config: VerifyConfig,
}

impl Default for PdfVerifier {
  fn default() -> Self {
    Self::new()
  }
}

impl PdfVerifier {
  pub fn new() -> Self {
    Self {
      config: VerifyConfig::default(),
    }
  }

  pub fn with_config(config: VerifyConfig) -> Self {
    Self { config }
  }

  /// Verifica todas as assinaturas do PDF e devolve um relatório por campo.
  ///
  /// Nunca propaga erro: um PDF ilegível (ou um pânico inesperado em alguma
  /// biblioteca de parse) produz `count = 0` com a lista vazia.
  pub fn verify_pdf_bytes(&self, pdf_bytes: &[u8], now: DateTime<Utc>) -> VerificationOutput {
    let outcome = catch_unwind(AssertUnwindSafe(|| self.verify_inner(pdf_bytes, now)));
    match outcome {
      Ok(Ok(output)) => output,
      Ok(Err(e)) => {
        log::warn!("PDF rejeitado: {}", e);
        VerificationOutput {
          count: 0,
          signatures: Vec::new(),
        }
      }
      Err(_) => {
        log::warn!("pânico capturado durante a verificação; PDF tratado como malformado");
        VerificationOutput {
          count: 0,
          signatures: Vec::new(),
        }
      }
    }
  }

  fn verify_inner(&self, pdf_bytes: &[u8], now: DateTime<Utc>) -> Result<VerificationOutput> {
    let reader = PdfReader::open(pdf_bytes)?;

    let mut signatures = Vec::new();
    for field in reader.fields() {
      if let Some(report) = self.process_field(reader.raw_bytes(), &field, now) {
        signatures.push(report);
      }
    }

    Ok(VerificationOutput {
      count: signatures.len() as u32,
      signatures,
    })
  }

  /// Pipeline por campo:
  ///
  /// ```text
  /// READ_FIELD → PARSE_CMS → PARSE_CERT → EXTRACT_TIME → CHECK_EXPIRY
  ///            → CHECK_INTEGRITY → CHECK_CRYPTO → CHAIN_INFO → CHECK_TSA
  /// ```
  ///
  /// Só READ_FIELD e PARSE_CMS encerram o campo; qualquer outra falha é
  /// registrada e o pipeline segue com valores ausentes.
  fn process_field(
    &self,
    pdf_bytes: &[u8],
    field: &SignatureField,
    now: DateTime<Utc>,
  ) -> Option<SignatureReport> {
    // 1. PARSE_CMS
    let cms = match CmsSignature::parse(&field.contents) {
      Ok(cms) => cms,
      Err(e @ PdfVerifyError::NotSignedData(_)) | Err(e @ PdfVerifyError::NoSignerInfo) => {
        log::debug!("campo {} ignorado: {}", field.name, e);
        return None;
      }
      Err(e) => {
        // CMS ilegível: emite o relatório mínimo com o erro registrado
        let mut report = self.new_report(pdf_bytes, field);
        self.record_error(&mut report, &e.to_string());
        report.finalize_summary();
        return Some(report);
      }
    };

    let mut report = self.new_report(pdf_bytes, field);

    // 2. PARSE_CERT
    let certificate = match cms.signer_certificate_der() {
      Some(der) => match Certificate::from_der(der.to_vec()) {
        Ok(cert) => Some(cert),
        Err(e) => {
          self.record_error(&mut report, &e.to_string());
          None
        }
      },
      None => {
        self.record_error(&mut report, "No certificate found in CMS");
        None
      }
    };

    match &certificate {
      Some(cert) => self.fill_certificate_info(&mut report, cert),
      None => {
        // Sem certificado, o nome vem do próprio dicionário de assinatura
        let fallback = field
          .entry_name
          .clone()
          .or_else(|| field.entry_reason.clone())
          .unwrap_or_else(|| "N/A".to_string());
        report.signer = Some(SignerIdentity {
          common_name: fallback,
          ..SignerIdentity::default()
        });
      }
    }

    // 3. CHAIN_INFO — descritivo, nenhuma decisão de confiança
    self.fill_chain(&mut report, &cms);

    // 4. CHECK_TSA antes da data: o genTime é a última fonte de EXTRACT_TIME
    let tsa = detect_timestamp(&cms);

    // 5. EXTRACT_TIME
    let signing_time = resolve_signing_time(
      field.entry_m.as_deref(),
      cms.signed_attr(&OID_SIGNING_TIME),
      tsa.as_ref().map(|t| t.gen_time),
    );
    if let Some(time) = &signing_time {
      report.signing_time = Some(time.local.format("%Y-%m-%dT%H:%M:%S").to_string());
      report.signing_timezone = Some(time.timezone.clone());
    }

    // 6. CHECK_EXPIRY (relógio atual) + validade na hora da assinatura
    if let Some(cert) = &certificate {
      self.classify_expiration(&mut report, cert, now);
      report.is_valid = certificate_valid_at(cert, signing_time.as_ref());
    }

    // 7. CHECK_INTEGRITY e CHECK_CRYPTO compartilham o digest das regiões
    self.check_integrity_and_crypto(&mut report, pdf_bytes, field, &cms, certificate.as_ref());

    // 8. CHECK_TSA → relatório
    match &tsa {
      Some(token) => {
        report.has_timestamp = true;
        report.timestamp_source = "TSA".to_string();
        report.timestamp_info = Some(TimestampInfo {
          timestamp: token.gen_time.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        });
      }
      None => {
        report.timestamp_source = "local-clock".to_string();
        report.push_warning(
          "No TSA - signing time comes from the clock on the signer's computer".to_string(),
        );
      }
    }

    report.finalize_summary();
    Some(report)
  }

  fn new_report(&self, pdf_bytes: &[u8], field: &SignatureField) -> SignatureReport {
    let mut report = SignatureReport::new(&field.name);
    report.total_size = Some(pdf_bytes.len() as u64);

    if let Some(range) = &field.byte_range {
      report.byte_range = Some(format!(
        "[{}, {}, {}, {}]",
        range[0], range[1], range[2], range[3]
      ));
      if !pdf_bytes.is_empty() {
        let covered = (range[1] + range[3]) as f64;
        report.coverage = Some(format!("{:.1}%", covered * 100.0 / pdf_bytes.len() as f64));
      }
    }

    report
  }

  fn fill_certificate_info(&self, report: &mut SignatureReport, cert: &Certificate) {
    report.signer = Some(SignerIdentity {
      common_name: cert
        .subject_attr(&OID_RDN_COMMON_NAME)
        .unwrap_or_else(|| "N/A".to_string()),
      user_id: cert
        .subject_attr(&OID_RDN_UID)
        .or_else(|| cert.subject_attr(&OID_RDN_SERIAL_NUMBER)),
      country: cert.subject_attr(&OID_RDN_COUNTRY),
      state_or_province: cert.subject_attr(&OID_RDN_STATE),
      city: cert.subject_attr(&OID_RDN_LOCALITY),
      organization: cert.subject_attr(&OID_RDN_ORGANIZATION),
    });

    report.issuer = Some(IssuerIdentity {
      common_name: cert
        .issuer_attr(&OID_RDN_COMMON_NAME)
        .unwrap_or_else(|| "N/A".to_string()),
      organization: cert
        .issuer_attr(&OID_RDN_ORGANIZATION)
        .unwrap_or_else(|| "N/A".to_string()),
      country: cert
        .issuer_attr(&OID_RDN_COUNTRY)
        .unwrap_or_else(|| "N/A".to_string()),
    });

    report.key_size = cert.key_size();
    report.hash_algorithm = cert.hash_algorithm();
    report.valid_from = cert
      .not_before()
      .map(|t| t.format("%Y-%m-%dT%H:%M:%S%:z").to_string());
    report.valid_until = cert
      .not_after()
      .map(|t| t.format("%Y-%m-%dT%H:%M:%S%:z").to_string());
    report.is_self_signed = cert.is_self_signed();
  }

  fn fill_chain(&self, report: &mut SignatureReport, cms: &CmsSignature) {
    for der in cms.certificates_der() {
      match Certificate::from_der(der.clone()) {
        Ok(cert) => {
          report.certificate_chain.push(ChainEntry {
            subject: cert
              .subject_attr(&OID_RDN_COMMON_NAME)
              .unwrap_or_else(|| "Unknown".to_string()),
            issuer: cert
              .issuer_attr(&OID_RDN_COMMON_NAME)
              .unwrap_or_else(|| "Unknown".to_string()),
            is_self_signed: cert.is_self_signed(),
            key_size: cert.key_size(),
          });
        }
        Err(e) => log::debug!("certificado da cadeia não parseável: {}", e),
      }
    }
  }

  /// Classifica a validade temporal do certificado contra o relógio atual.
  fn classify_expiration(&self, report: &mut SignatureReport, cert: &Certificate, now: DateTime<Utc>) {
    let (status, days) = match (cert.not_before(), cert.not_after()) {
      (Some(not_before), Some(not_after)) => {
        let epoch_cutoff = Utc
          .with_ymd_and_hms(self.config.min_not_before_year, 1, 1, 0, 0, 0)
          .single();
        if epoch_cutoff.map(|cutoff| not_before <= cutoff).unwrap_or(false) {
          // Data de emissão implausível (certificado de teste/malformado)
          (ExpirationStatus::Expired, Some(-20000))
        } else {
          let days = (not_after - now).num_days();
          if days < 0 {
            (ExpirationStatus::Expired, Some(days))
          } else if days < self.config.expiry_warning_days {
            (ExpirationStatus::ExpiringSoon, Some(days))
          } else {
            (ExpirationStatus::Valid, Some(days))
          }
        }
      }
      _ => (ExpirationStatus::Unknown, None),
    };

    report.expiration_status = status;
    report.days_until_expiry = days;
    report.is_expired = status == ExpirationStatus::Expired;
  }

  /// Integridade do ByteRange + verificação matemática da assinatura.
  fn check_integrity_and_crypto(
    &self,
    report: &mut SignatureReport,
    pdf_bytes: &[u8],
    field: &SignatureField,
    cms: &CmsSignature,
    certificate: Option<&Certificate>,
  ) {
    let range = match &field.byte_range {
      Some(range) => *range,
      None => {
        report.cryptographic_message = Some("No ByteRange - cannot verify".to_string());
        self.record_error(report, "No ByteRange - cannot verify");
        return;
      }
    };

    // Validação estrutural: falha aqui vira formatting_error, mas `intact`
    // só cai se o digest também falhar
    let layout = integrity::check_byte_range_layout(pdf_bytes, &range, field.contents.len());
    for warning in layout.warnings {
      report.push_warning(warning);
    }
    for error in layout.errors {
      self.record_error(report, &error);
    }

    let alg = match DigestAlg::from_oid(cms.digest_algorithm_oid()) {
      Some(alg) => alg,
      None => {
        let message = PdfVerifyError::UnsupportedDigest.to_string();
        report.cryptographic_message = Some(message.clone());
        self.record_error(report, &message);
        return;
      }
    };

    let computed = match integrity::digest_over_ranges(pdf_bytes, &range, alg) {
      Ok(digest) => digest,
      Err(e) => {
        self.record_error(report, &e.to_string());
        return;
      }
    };

    // Entrada do verificador: o SET OF dos atributos assinados quando
    // existem, senão o digest direto das regiões
    let verifier_digest = match cms.signed_attrs_der() {
      Some(attrs_der) => {
        // O RFC 5652 exige contentType junto dos atributos assinados
        if cms.signed_attr(&OID_CONTENT_TYPE).is_none() {
          report
            .push_warning("signed attributes do not include the contentType attribute".to_string());
        }
        let digest_matches = match cms.signed_attr(&OID_MESSAGE_DIGEST) {
          Some(md_der) => integrity::message_digest_matches(&computed, md_der).unwrap_or(false),
          None => false,
        };
        report.intact = digest_matches;
        report.document_unchanged = digest_matches;
        if !digest_matches {
          let message = format!(
            "{} digest {} does not match the signed messageDigest attribute - \
             the document was modified after signing",
            alg.name(),
            hex::encode(&computed)
          );
          report.cryptographic_message = Some(message.clone());
          self.record_error(report, &message);
          return;
        }
        alg.digest_regions(&[attrs_der])
      }
      None => computed.clone(),
    };

    let spki = match certificate.and_then(|cert| cert.spki_der()) {
      Some(spki) => spki,
      None => {
        // O PARSE_CERT já registrou a causa
        report.cryptographic_message = Some("No certificate - cannot verify".to_string());
        return;
      }
    };

    let (valid, message) =
      crypto::verify_signature(&spki, alg, &verifier_digest, cms.signature_bytes());
    report.cryptographic_signature_valid = valid;
    report.cryptographic_message = Some(message.clone());
    if !valid {
      self.record_error(report, &message);
    }

    // Sem atributos assinados, a própria assinatura é o teste de integridade
    if !cms.has_signed_attrs() {
      report.intact = valid;
      report.document_unchanged = valid;
    }
  }

  fn record_error(&self, report: &mut SignatureReport, message: &str) {
    report.push_error(truncate_message(message, self.config.max_error_len));
  }
}

/// Certificado válido no instante da assinatura; sem data conhecida, não há
/// como refutar e o resultado é `true`.
fn certificate_valid_at(cert: &Certificate, signing_time: Option<&SigningTime>) -> bool {
  match (signing_time, cert.not_before(), cert.not_after()) {
    (Some(time), Some(not_before), Some(not_after)) => {
      not_before <= time.utc && time.utc <= not_after
    }
    _ => true,
  }
}
