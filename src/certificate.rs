use chrono::{DateTime, Utc};
use der_parser::asn1_rs::{FromDer, Oid, Tag};
use der_parser::oid;
use x509_parser::prelude::{AttributeTypeAndValue, X509Certificate, X509Name};

use crate::error::{PdfVerifyError, Result};

pub const OID_RDN_COMMON_NAME: Oid<'static> = oid!(2.5.4.3);
pub const OID_RDN_SERIAL_NUMBER: Oid<'static> = oid!(2.5.4.5);
pub const OID_RDN_COUNTRY: Oid<'static> = oid!(2.5.4.6);
pub const OID_RDN_LOCALITY: Oid<'static> = oid!(2.5.4.7);
pub const OID_RDN_STATE: Oid<'static> = oid!(2.5.4.8);
pub const OID_RDN_ORGANIZATION: Oid<'static> = oid!(2.5.4.10);
pub const OID_RDN_UID: Oid<'static> = oid!(0.9.2342.19200300.100.1.1);

const OID_KEY_RSA: Oid<'static> = oid!(1.2.840.113549.1.1.1);
const OID_KEY_EC: Oid<'static> = oid!(1.2.840.10045.2.1);

const OID_CURVE_P256: Oid<'static> = oid!(1.2.840.10045.3.1.7);
const OID_CURVE_P384: Oid<'static> = oid!(1.3.132.0.34);
const OID_CURVE_P521: Oid<'static> = oid!(1.3.132.0.35);
const OID_CURVE_SECP256K1: Oid<'static> = oid!(1.3.132.0.10);

/// Certificado X.509 com o DER retido; os acessores reparseiam sob demanda
/// com o x509-parser.
#[derive(Clone)]
pub struct Certificate {
  der_bytes: Vec<u8>,
}

impl Certificate {
  pub fn from_der(der: Vec<u8>) -> Result<Self> {
    // Valida o DER já na construção
    X509Certificate::from_der(&der)
      .map_err(|e| PdfVerifyError::CertParseError(format!("{:?}", e)))?;
    Ok(Self { der_bytes: der })
  }

  fn parsed(&self) -> Result<X509Certificate<'_>> {
    X509Certificate::from_der(&self.der_bytes)
      .map(|(_, cert)| cert)
      .map_err(|e| PdfVerifyError::CertParseError(format!("{:?}", e)))
  }

  pub fn subject_attr(&self, oid: &Oid) -> Option<String> {
    let cert = self.parsed().ok()?;
    name_attr(cert.subject(), oid)
  }

  pub fn issuer_attr(&self, oid: &Oid) -> Option<String> {
    let cert = self.parsed().ok()?;
    name_attr(cert.issuer(), oid)
  }

  pub fn not_before(&self) -> Option<DateTime<Utc>> {
    let cert = self.parsed().ok()?;
    DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
  }

  pub fn not_after(&self) -> Option<DateTime<Utc>> {
    let cert = self.parsed().ok()?;
    DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
  }

  /// SubjectPublicKeyInfo completo, em DER, pronto para os verificadores.
  pub fn spki_der(&self) -> Option<Vec<u8>> {
    let cert = self.parsed().ok()?;
    Some(cert.public_key().raw.to_vec())
  }

  /// Família da chave pública ("RSA" / "ECDSA").
  pub fn key_family(&self) -> Option<&'static str> {
    let cert = self.parsed().ok()?;
    let alg = &cert.public_key().algorithm.algorithm;
    if *alg == OID_KEY_RSA {
      Some("RSA")
    } else if *alg == OID_KEY_EC {
      Some("ECDSA")
    } else {
      None
    }
  }

  /// Bits do módulo (RSA) ou da ordem da curva (ECDSA).
  pub fn key_size(&self) -> Option<u32> {
    use x509_parser::public_key::PublicKey;

    let cert = self.parsed().ok()?;
    let spki = cert.public_key();
    match spki.parsed().ok()? {
      PublicKey::RSA(rsa) => Some(big_int_bits(rsa.modulus)),
      PublicKey::EC(_) => {
        let params = spki.algorithm.parameters.as_ref()?;
        let curve = Oid::try_from(params.clone()).ok()?;
        curve_bits(&curve)
      }
      _ => None,
    }
  }

  /// Metade hash do `signatureAlgorithm` do certificado ("sha256", ...);
  /// quando o OID não é reconhecido, cai no nome da família da chave.
  pub fn hash_algorithm(&self) -> Option<String> {
    let cert = self.parsed().ok()?;
    let oid = cert.signature_algorithm.algorithm.to_string();
    match sig_alg_hash_name(&oid) {
      Some(name) => Some(name.to_string()),
      None => self.key_family().map(|family| family.to_string()),
    }
  }

  /// Subject == issuer, comparados pelo DER cru dos Names.
  pub fn is_self_signed(&self) -> bool {
    match self.parsed() {
      Ok(cert) => cert.subject().as_raw() == cert.issuer().as_raw(),
      Err(_) => false,
    }
  }
}

fn name_attr(name: &X509Name, oid: &Oid) -> Option<String> {
  name
    .iter_by_oid(oid)
    .next()
    .and_then(attr_value_to_string)
}

/// Converte o valor de um RDN para UTF-8. O x509-parser resolve
/// UTF8String/PrintableString/IA5String; BMPString (UTF-16BE) é decodificado
/// à mão.
fn attr_value_to_string(attr: &AttributeTypeAndValue) -> Option<String> {
  if let Ok(text) = attr.as_str() {
    return Some(text.to_string());
  }
  let any = attr.attr_value();
  if any.tag() == Tag::BmpString {
    let units: Vec<u16> = any
      .data
      .chunks_exact(2)
      .map(|c| u16::from_be_bytes([c[0], c[1]]))
      .collect();
    return String::from_utf16(&units).ok();
  }
  None
}

/// Bits significativos de um inteiro big-endian sem sinal.
fn big_int_bits(bytes: &[u8]) -> u32 {
  let mut slice = bytes;
  while !slice.is_empty() && slice[0] == 0 {
    slice = &slice[1..];
  }
  match slice.first() {
    None => 0,
    Some(first) => (slice.len() as u32 - 1) * 8 + (8 - first.leading_zeros()),
  }
}

fn curve_bits(curve: &Oid) -> Option<u32> {
  if *curve == OID_CURVE_P256 || *curve == OID_CURVE_SECP256K1 {
    Some(256)
  } else if *curve == OID_CURVE_P384 {
    Some(384)
  } else if *curve == OID_CURVE_P521 {
    Some(521)
  } else {
    None
  }
}

fn sig_alg_hash_name(oid: &str) -> Option<&'static str> {
  match oid {
    // RSA PKCS#1 v1.5
    "1.2.840.113549.1.1.5" => Some("sha1"),
    "1.2.840.113549.1.1.11" => Some("sha256"),
    "1.2.840.113549.1.1.12" => Some("sha384"),
    "1.2.840.113549.1.1.13" => Some("sha512"),
    "1.2.840.113549.1.1.14" => Some("sha224"),
    // ECDSA
    "1.2.840.10045.4.1" => Some("sha1"),
    "1.2.840.10045.4.3.1" => Some("sha224"),
    "1.2.840.10045.4.3.2" => Some("sha256"),
    "1.2.840.10045.4.3.3" => Some("sha384"),
    "1.2.840.10045.4.3.4" => Some("sha512"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_der_rejects_garbage() {
    let result = Certificate::from_der(vec![0u8; 32]);
    assert!(matches!(result, Err(PdfVerifyError::CertParseError(_))));
  }

  #[test]
  fn test_big_int_bits() {
    assert_eq!(big_int_bits(&[0x00, 0x80, 0x00]), 16);
    assert_eq!(big_int_bits(&[0x01]), 1);
    assert_eq!(big_int_bits(&[0xff; 256]), 2048);
    assert_eq!(big_int_bits(&[0x00]), 0);
  }

  #[test]
  fn test_sig_alg_hash_name() {
    assert_eq!(sig_alg_hash_name("1.2.840.113549.1.1.11"), Some("sha256"));
    assert_eq!(sig_alg_hash_name("1.2.840.10045.4.3.2"), Some("sha256"));
    assert_eq!(sig_alg_hash_name("1.2.3.4"), None);
  }

  #[test]
  fn test_curve_bits() {
    assert_eq!(curve_bits(&OID_CURVE_P256), Some(256));
    assert_eq!(curve_bits(&OID_CURVE_P384), Some(384));
    assert_eq!(curve_bits(&oid!(1.2.3)), None);
  }
}
