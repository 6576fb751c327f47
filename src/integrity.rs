use der_parser::asn1_rs::{FromDer, OctetString};

use crate::crypto::DigestAlg;
use crate::error::{PdfVerifyError, Result};

/// Resultado da validação estrutural do ByteRange: problemas que viram
/// `formatting_errors` e observações que viram `warnings`.
#[derive(Debug, Default)]
pub struct ByteRangeLayout {
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

/// Valida a geometria do ByteRange contra o arquivo: as duas regiões devem
/// ser disjuntas, começar no offset 0 e o vão entre elas deve conter
/// exatamente o literal `/Contents`.
///
/// Falha aqui sozinha não derruba `intact` — isso é decidido pelo digest.
pub fn check_byte_range_layout(
  pdf_bytes: &[u8],
  range: &[u64; 4],
  contents_len: usize,
) -> ByteRangeLayout {
  let mut layout = ByteRangeLayout::default();
  let file_size = pdf_bytes.len() as u64;
  let [off1, len1, off2, len2] = *range;

  if off1 != 0 {
    layout
      .errors
      .push(format!("ByteRange does not start at offset 0 (starts at {})", off1));
  }

  let end1 = off1.saturating_add(len1);
  let end2 = off2.saturating_add(len2);
  if end1 > file_size || end2 > file_size || off2 < end1 {
    layout.errors.push(format!(
      "ByteRange [{}, {}, {}, {}] out of bounds for file of {} bytes",
      off1, len1, off2, len2, file_size
    ));
    return layout;
  }

  let gap = off2 - end1;
  if gap == 0 {
    layout
      .errors
      .push("ByteRange leaves no room for /Contents".to_string());
    return layout;
  }

  let gap_bytes = &pdf_bytes[end1 as usize..off2 as usize];
  let first = gap_bytes
    .iter()
    .copied()
    .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
  match first {
    Some(b'<') => {
      // String hex: o vão deve acomodar exatamente <hex> do placeholder
      let expected = 2 + 2 * contents_len as u64;
      if gap != expected {
        layout.errors.push(format!(
          "ByteRange gap ({} bytes) does not match /Contents length ({} bytes expected)",
          gap, expected
        ));
      }
    }
    Some(b'(') => {
      // String literal: o tamanho codificado varia com o escape; sem
      // verificação exata
    }
    _ => {
      layout
        .errors
        .push("ByteRange gap does not contain the /Contents string".to_string());
    }
  }

  if end2 != file_size {
    layout.warnings.push(format!(
      "signature does not cover the last {} bytes of the file (later revisions present)",
      file_size - end2
    ));
  }

  layout
}

/// Digest sobre as duas regiões cobertas, na ordem do ByteRange.
pub fn digest_over_ranges(pdf_bytes: &[u8], range: &[u64; 4], alg: DigestAlg) -> Result<Vec<u8>> {
  let [off1, len1, off2, len2] = *range;
  let file_size = pdf_bytes.len() as u64;

  let end1 = off1.checked_add(len1).filter(|e| *e <= file_size);
  let end2 = off2.checked_add(len2).filter(|e| *e <= file_size);
  let (end1, end2) = match (end1, end2) {
    (Some(a), Some(b)) => (a, b),
    _ => {
      return Err(PdfVerifyError::IntegrityFailed(
        "ByteRange fora dos limites do arquivo".to_string(),
      ))
    }
  };

  let region1 = &pdf_bytes[off1 as usize..end1 as usize];
  let region2 = &pdf_bytes[off2 as usize..end2 as usize];
  Ok(alg.digest_regions(&[region1, region2]))
}

/// Compara o digest calculado com o atributo assinado `messageDigest`
/// (um OCTET STRING em DER).
pub fn message_digest_matches(computed: &[u8], attr_der: &[u8]) -> Result<bool> {
  let (_, octets) = OctetString::from_der(attr_der)
    .map_err(|e| PdfVerifyError::DecodingError(format!("messageDigest: {:?}", e)))?;
  Ok(octets.as_cow().as_ref() == computed)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_pdf(contents_hex_len: usize) -> (Vec<u8>, [u64; 4]) {
    // corpo .. <hex> .. cauda
    let head = b"%PDF-1.7 corpo assinado ".to_vec();
    let gap = {
      let mut g = vec![b'0'; contents_hex_len + 2];
      g[0] = b'<';
      let last = g.len() - 1;
      g[last] = b'>';
      g
    };
    let tail = b" resto do trailer %%EOF".to_vec();

    let mut pdf = head.clone();
    pdf.extend_from_slice(&gap);
    pdf.extend_from_slice(&tail);

    let range = [
      0,
      head.len() as u64,
      (head.len() + gap.len()) as u64,
      tail.len() as u64,
    ];
    (pdf, range)
  }

  #[test]
  fn test_layout_ok() {
    let (pdf, range) = sample_pdf(64);
    let layout = check_byte_range_layout(&pdf, &range, 32);
    assert!(layout.errors.is_empty(), "{:?}", layout.errors);
    assert!(layout.warnings.is_empty());
  }

  #[test]
  fn test_layout_rejects_nonzero_start() {
    let (pdf, mut range) = sample_pdf(64);
    range[0] = 4;
    range[1] -= 4;
    let layout = check_byte_range_layout(&pdf, &range, 32);
    assert!(layout.errors.iter().any(|e| e.contains("offset 0")));
  }

  #[test]
  fn test_layout_rejects_gap_mismatch() {
    let (pdf, range) = sample_pdf(64);
    // contents_len errado: o vão de 66 bytes não corresponde
    let layout = check_byte_range_layout(&pdf, &range, 16);
    assert!(layout.errors.iter().any(|e| e.contains("gap")));
  }

  #[test]
  fn test_layout_warns_about_uncovered_tail() {
    let (pdf, mut range) = sample_pdf(64);
    range[3] -= 5;
    let layout = check_byte_range_layout(&pdf, &range, 32);
    assert!(layout.errors.is_empty());
    assert_eq!(layout.warnings.len(), 1);
  }

  #[test]
  fn test_layout_rejects_out_of_bounds() {
    let (pdf, mut range) = sample_pdf(64);
    range[3] += 1000;
    let layout = check_byte_range_layout(&pdf, &range, 32);
    assert!(!layout.errors.is_empty());
  }

  #[test]
  fn test_digest_over_ranges_skips_gap() {
    let (pdf, range) = sample_pdf(64);
    let digest = digest_over_ranges(&pdf, &range, DigestAlg::Sha256).unwrap();

    let mut expected_input = Vec::new();
    expected_input.extend_from_slice(&pdf[..range[1] as usize]);
    expected_input.extend_from_slice(&pdf[range[2] as usize..]);
    let expected = DigestAlg::Sha256.digest_regions(&[&expected_input]);
    assert_eq!(digest, expected);
  }

  #[test]
  fn test_digest_over_ranges_out_of_bounds() {
    let (pdf, mut range) = sample_pdf(64);
    range[3] += 1;
    assert!(digest_over_ranges(&pdf, &range, DigestAlg::Sha256).is_err());
  }

  #[test]
  fn test_message_digest_matches() {
    let computed = [0xaau8; 4];
    let attr = [0x04, 0x04, 0xaa, 0xaa, 0xaa, 0xaa];
    assert!(message_digest_matches(&computed, &attr).unwrap());
    let attr_wrong = [0x04, 0x04, 0xaa, 0xaa, 0xaa, 0xab];
    assert!(!message_digest_matches(&computed, &attr_wrong).unwrap());
  }
}
