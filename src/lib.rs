#![deny(clippy::all)]

//! Motor de extração e verificação de assinaturas digitais em PDF.
//!
//! A entrada é um buffer já carregado e um relógio explícito; a saída é um
//! relatório estruturado por assinatura. Transporte, arquivos temporários e
//! decisão de confiança ficam com quem chama. O log sai pela fachada `log` —
//! instale o sink que quiser (ou nenhum).

mod certificate;
mod cms;
mod crypto;
mod error;
mod integrity;
mod reader;
mod report;
mod signing_time;
mod timestamp;
mod verifier;

use chrono::{DateTime, Utc};

pub use error::{PdfVerifyError, Result};
pub use report::{
  ChainEntry, ExpirationStatus, IssuerIdentity, SignatureReport, SignerIdentity,
  StructureValidation, TimestampInfo, VerificationOutput,
};
pub use verifier::{PdfVerifier, VerifyConfig};

/// Verifica todas as assinaturas embutidas em `pdf_bytes`.
///
/// `now` é explícito para que as asserções temporais (expiração, janelas de
/// validade) sejam reprodutíveis em teste.
pub fn verify_pdf(pdf_bytes: &[u8], now: DateTime<Utc>) -> VerificationOutput {
  PdfVerifier::new().verify_pdf_bytes(pdf_bytes, now)
}
