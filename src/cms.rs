use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use der_parser::asn1_rs::{Any, FromDer};

use crate::error::{PdfVerifyError, Result};

pub const OID_SIGNED_DATA: ObjectIdentifier =
  ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const OID_CONTENT_TYPE: ObjectIdentifier =
  ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const OID_MESSAGE_DIGEST: ObjectIdentifier =
  ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const OID_SIGNING_TIME: ObjectIdentifier =
  ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
pub const OID_TIMESTAMP_TOKEN: ObjectIdentifier =
  ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");

/// O que interessa de um CMS `SignedData` de assinatura de PDF, já achatado
/// em valores próprios.
///
/// O acesso a atributos é sempre por OID — a ordem dentro dos SETs não é
/// significativa. Apenas o primeiro `SignerInfo` é considerado.
pub struct CmsSignature {
  digest_algorithm_oid: String,
  signature: Vec<u8>,
  signed_attrs_der: Option<Vec<u8>>,
  signed_attrs: Vec<(ObjectIdentifier, Vec<u8>)>,
  unsigned_attrs: Vec<(ObjectIdentifier, Vec<u8>)>,
  certificates: Vec<Vec<u8>>,
  signer_certificate: Option<Vec<u8>>,
}

impl CmsSignature {
  /// Decodifica um `ContentInfo`/`SignedData` estrito (DER).
  ///
  /// O `/Contents` do PDF é preenchido com zeros até o tamanho do
  /// placeholder, então o blob é primeiro recortado no comprimento do TLV
  /// mais externo.
  pub fn parse(raw: &[u8]) -> Result<Self> {
    let der_bytes = trim_outer_tlv(raw)?;

    let content_info = ContentInfo::from_der(der_bytes)
      .map_err(|e| PdfVerifyError::DecodingError(format!("ContentInfo: {}", e)))?;

    if content_info.content_type != OID_SIGNED_DATA {
      return Err(PdfVerifyError::NotSignedData(
        content_info.content_type.to_string(),
      ));
    }

    let inner = content_info
      .content
      .to_der()
      .map_err(|e| PdfVerifyError::DecodingError(format!("SignedData: {}", e)))?;
    let signed_data = SignedData::from_der(&inner)
      .map_err(|e| PdfVerifyError::DecodingError(format!("SignedData: {}", e)))?;

    let signer = signed_data
      .signer_infos
      .0
      .iter()
      .next()
      .ok_or(PdfVerifyError::NoSignerInfo)?;

    let signed_attrs_der = match &signer.signed_attrs {
      None => None,
      Some(attrs) => Some(
        attrs
          .to_der()
          .map_err(|e| PdfVerifyError::DecodingError(format!("signedAttrs: {}", e)))?,
      ),
    };

    let signed_attrs = flatten_attrs(signer.signed_attrs.as_ref());
    let unsigned_attrs = flatten_attrs(signer.unsigned_attrs.as_ref());

    let mut certificates = Vec::new();
    if let Some(set) = &signed_data.certificates {
      for choice in set.0.iter() {
        if let CertificateChoices::Certificate(cert) = choice {
          if let Ok(der) = cert.to_der() {
            certificates.push(der);
          }
        }
      }
    }

    // Certificado do signatário: casa o serial de IssuerAndSerialNumber;
    // sem correspondência, o primeiro embutido (comportamento clássico de
    // assinaturas PDF)
    let wanted_serial: Option<Vec<u8>> = match &signer.sid {
      SignerIdentifier::IssuerAndSerialNumber(ias) => {
        Some(strip_leading_zeros(ias.serial_number.as_bytes()).to_vec())
      }
      SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    let mut signer_certificate = None;
    if let (Some(wanted), Some(set)) = (&wanted_serial, &signed_data.certificates) {
      for choice in set.0.iter() {
        if let CertificateChoices::Certificate(cert) = choice {
          let serial = cert.tbs_certificate.serial_number.as_bytes();
          if strip_leading_zeros(serial) == wanted.as_slice() {
            signer_certificate = cert.to_der().ok();
            break;
          }
        }
      }
    }
    if signer_certificate.is_none() {
      signer_certificate = certificates.first().cloned();
    }

    Ok(Self {
      digest_algorithm_oid: signer.digest_alg.oid.to_string(),
      signature: signer.signature.as_bytes().to_vec(),
      signed_attrs_der,
      signed_attrs,
      unsigned_attrs,
      certificates,
      signer_certificate,
    })
  }

  /// OID do algoritmo de digest declarado pelo signatário.
  pub fn digest_algorithm_oid(&self) -> &str {
    &self.digest_algorithm_oid
  }

  pub fn signature_bytes(&self) -> &[u8] {
    &self.signature
  }

  pub fn has_signed_attrs(&self) -> bool {
    self.signed_attrs_der.is_some()
  }

  /// DER dos atributos assinados reencodados como `SET OF` (a tag implícita
  /// `[0]` volta a ser 0x31) — é sobre este encoding que a assinatura foi
  /// calculada.
  pub fn signed_attrs_der(&self) -> Option<&[u8]> {
    self.signed_attrs_der.as_deref()
  }

  /// Primeiro valor do atributo assinado com o OID dado, como DER completo.
  pub fn signed_attr(&self, oid: &ObjectIdentifier) -> Option<&[u8]> {
    self
      .signed_attrs
      .iter()
      .find(|(attr_oid, _)| attr_oid == oid)
      .map(|(_, value)| value.as_slice())
  }

  /// Primeiro valor do atributo não assinado com o OID dado.
  pub fn unsigned_attr(&self, oid: &ObjectIdentifier) -> Option<&[u8]> {
    self
      .unsigned_attrs
      .iter()
      .find(|(attr_oid, _)| attr_oid == oid)
      .map(|(_, value)| value.as_slice())
  }

  /// Certificados embutidos, em DER, na ordem do CMS.
  pub fn certificates_der(&self) -> &[Vec<u8>] {
    &self.certificates
  }

  pub fn signer_certificate_der(&self) -> Option<&[u8]> {
    self.signer_certificate.as_deref()
  }
}

fn flatten_attrs(
  attrs: Option<&x509_cert::attr::Attributes>,
) -> Vec<(ObjectIdentifier, Vec<u8>)> {
  let mut out = Vec::new();
  if let Some(attrs) = attrs {
    for attr in attrs.iter() {
      if let Some(value) = attr.values.iter().next() {
        if let Ok(der) = value.to_der() {
          out.push((attr.oid, der));
        }
      }
    }
  }
  out
}

/// Recorta o buffer no comprimento do TLV mais externo, descartando o
/// padding de zeros que o placeholder do PDF deixa depois do DER.
fn trim_outer_tlv(raw: &[u8]) -> Result<&[u8]> {
  let (rest, _) = Any::from_der(raw)
    .map_err(|e| PdfVerifyError::DecodingError(format!("TLV externo: {:?}", e)))?;
  Ok(&raw[..raw.len() - rest.len()])
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
  let mut slice = bytes;
  while slice.len() > 1 && slice[0] == 0 {
    slice = &slice[1..];
  }
  slice
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_rejects_garbage() {
    let result = CmsSignature::parse(&[0u8; 16]);
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_rejects_non_signed_data() {
    // ContentInfo com contentType id-data (1.2.840.113549.1.7.1) e um NULL
    // como conteúdo explícito
    let der = [
      0x30, 0x0f, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01, 0xa0, 0x02,
      0x05, 0x00,
    ];
    match CmsSignature::parse(&der) {
      Err(PdfVerifyError::NotSignedData(oid)) => {
        assert_eq!(oid, "1.2.840.113549.1.7.1");
      }
      Err(other) => panic!("esperava NotSignedData, veio {:?}", other),
      Ok(_) => panic!("esperava NotSignedData, veio Ok"),
    }
  }

  #[test]
  fn test_trim_outer_tlv_drops_padding() {
    // SEQUENCE vazia seguida de padding de zeros
    let raw = [0x30, 0x00, 0x00, 0x00, 0x00, 0x00];
    let trimmed = trim_outer_tlv(&raw).unwrap();
    assert_eq!(trimmed, &[0x30, 0x00]);
  }

  #[test]
  fn test_strip_leading_zeros() {
    assert_eq!(strip_leading_zeros(&[0x00, 0x01, 0x02]), &[0x01, 0x02]);
    assert_eq!(strip_leading_zeros(&[0x00]), &[0x00]);
    assert_eq!(strip_leading_zeros(&[0x7f]), &[0x7f]);
  }
}
