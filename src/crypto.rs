use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier;

use crate::error::PdfVerifyError;

/// Conjunto fechado de algoritmos de digest aceitos pelo verificador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlg {
  Sha1,
  Sha256,
  Sha384,
  Sha512,
}

impl DigestAlg {
  pub fn from_oid(oid: &str) -> Option<Self> {
    match oid {
      "1.3.14.3.2.26" => Some(DigestAlg::Sha1),
      "2.16.840.1.101.3.4.2.1" => Some(DigestAlg::Sha256),
      "2.16.840.1.101.3.4.2.2" => Some(DigestAlg::Sha384),
      "2.16.840.1.101.3.4.2.3" => Some(DigestAlg::Sha512),
      _ => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      DigestAlg::Sha1 => "SHA-1",
      DigestAlg::Sha256 => "SHA-256",
      DigestAlg::Sha384 => "SHA-384",
      DigestAlg::Sha512 => "SHA-512",
    }
  }

  /// Digest sobre regiões concatenadas, sem copiá-las para um buffer único.
  pub fn digest_regions(&self, regions: &[&[u8]]) -> Vec<u8> {
    match self {
      DigestAlg::Sha1 => {
        let mut hasher = Sha1::new();
        for region in regions {
          hasher.update(region);
        }
        hasher.finalize().to_vec()
      }
      DigestAlg::Sha256 => {
        let mut hasher = Sha256::new();
        for region in regions {
          hasher.update(region);
        }
        hasher.finalize().to_vec()
      }
      DigestAlg::Sha384 => {
        let mut hasher = Sha384::new();
        for region in regions {
          hasher.update(region);
        }
        hasher.finalize().to_vec()
      }
      DigestAlg::Sha512 => {
        let mut hasher = Sha512::new();
        for region in regions {
          hasher.update(region);
        }
        hasher.finalize().to_vec()
      }
    }
  }
}

/// Verifica matematicamente a assinatura sobre um digest já calculado.
///
/// Contrato: nunca propaga erro — assinatura inválida, chave fora das
/// famílias suportadas ou DER malformado retornam `(false, motivo)`.
pub fn verify_signature(
  spki_der: &[u8],
  alg: DigestAlg,
  digest: &[u8],
  signature: &[u8],
) -> (bool, String) {
  if let Ok(rsa_key) = RsaPublicKey::from_public_key_der(spki_der) {
    return verify_rsa(&rsa_key, alg, digest, signature);
  }

  if let Ok(ec_key) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
    return verify_ecdsa_p256(&ec_key, digest, signature);
  }

  if let Ok(ec_key) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
    return verify_ecdsa_p384(&ec_key, digest, signature);
  }

  (false, PdfVerifyError::UnsupportedKey.to_string())
}

fn verify_rsa(
  key: &RsaPublicKey,
  alg: DigestAlg,
  digest: &[u8],
  signature: &[u8],
) -> (bool, String) {
  let scheme = match alg {
    DigestAlg::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
    DigestAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
    DigestAlg::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
    DigestAlg::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
  };

  match key.verify(scheme, digest, signature) {
    Ok(()) => (true, "Signature valid (RSA verified)".to_string()),
    Err(e) => (false, format!("Signature INVALID - {}", e)),
  }
}

fn verify_ecdsa_p256(
  key: &p256::ecdsa::VerifyingKey,
  digest: &[u8],
  signature: &[u8],
) -> (bool, String) {
  let sig = match p256::ecdsa::Signature::from_der(signature) {
    Ok(sig) => sig,
    Err(e) => return (false, format!("Signature INVALID - {}", e)),
  };
  match key.verify_prehash(digest, &sig) {
    Ok(()) => (true, "Signature valid (ECDSA verified)".to_string()),
    Err(e) => (false, format!("Signature INVALID - {}", e)),
  }
}

fn verify_ecdsa_p384(
  key: &p384::ecdsa::VerifyingKey,
  digest: &[u8],
  signature: &[u8],
) -> (bool, String) {
  let sig = match p384::ecdsa::Signature::from_der(signature) {
    Ok(sig) => sig,
    Err(e) => return (false, format!("Signature INVALID - {}", e)),
  };
  match key.verify_prehash(digest, &sig) {
    Ok(()) => (true, "Signature valid (ECDSA verified)".to_string()),
    Err(e) => (false, format!("Signature INVALID - {}", e)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_digest_oid_mapping() {
    assert_eq!(DigestAlg::from_oid("1.3.14.3.2.26"), Some(DigestAlg::Sha1));
    assert_eq!(
      DigestAlg::from_oid("2.16.840.1.101.3.4.2.1"),
      Some(DigestAlg::Sha256)
    );
    assert_eq!(
      DigestAlg::from_oid("2.16.840.1.101.3.4.2.2"),
      Some(DigestAlg::Sha384)
    );
    assert_eq!(
      DigestAlg::from_oid("2.16.840.1.101.3.4.2.3"),
      Some(DigestAlg::Sha512)
    );
    assert_eq!(DigestAlg::from_oid("1.2.3.4"), None);
  }

  #[test]
  fn test_digest_regions_concatenates() {
    let whole = DigestAlg::Sha256.digest_regions(&[b"abcdef"]);
    let split = DigestAlg::Sha256.digest_regions(&[b"abc", b"def"]);
    assert_eq!(whole, split);
    assert_eq!(whole.len(), 32);
  }

  #[test]
  fn test_verify_rejects_garbage_key() {
    let (valid, message) = verify_signature(&[0u8; 10], DigestAlg::Sha256, &[0u8; 32], &[0u8; 64]);
    assert!(!valid);
    assert_eq!(message, "unsupported key type");
  }
}
