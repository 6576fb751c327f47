use lopdf::{Dictionary, Document, Object};

use crate::error::{PdfVerifyError, Result};

/// Um campo de assinatura (`/FT /Sig` com `/V` preenchido) extraído do
/// AcroForm, com o dicionário de assinatura já achatado.
#[derive(Debug, Clone)]
pub struct SignatureField {
  /// Nome totalmente qualificado (`pai.filho`), único dentro do documento.
  pub name: String,
  /// `[off1, len1, off2, len2]` — ausente quando o dicionário não traz
  /// `/ByteRange` utilizável.
  pub byte_range: Option<[u64; 4]>,
  /// Bytes crus do CMS em `/Contents` (hex ou literal, já decodificado).
  pub contents: Vec<u8>,
  pub entry_m: Option<String>,
  pub entry_name: Option<String>,
  pub entry_reason: Option<String>,
}

/// Leitor de objetos PDF. Não modifica o documento; apenas resolve a
/// estrutura de xref (tabela clássica ou xref stream, via lopdf) até os
/// campos de assinatura.
pub struct PdfReader<'a> {
  doc: Document,
  bytes: &'a [u8],
}

impl<'a> PdfReader<'a> {
  pub fn open(bytes: &'a [u8]) -> Result<Self> {
    if !bytes.starts_with(b"%PDF-") {
      return Err(PdfVerifyError::MalformedPdf(
        "cabeçalho %PDF- ausente".to_string(),
      ));
    }

    let doc = Document::load_mem(bytes)
      .map_err(|e| PdfVerifyError::MalformedPdf(format!("xref não parseável: {}", e)))?;

    Ok(Self { doc, bytes })
  }

  pub fn raw_bytes(&self) -> &[u8] {
    self.bytes
  }

  /// Percorre `/Root → /AcroForm → /Fields` (descendo `/Kids`) e devolve os
  /// campos de assinatura preenchidos, na ordem do documento.
  pub fn fields(&self) -> Vec<SignatureField> {
    let mut out = Vec::new();

    let catalog = match self.doc.catalog() {
      Ok(c) => c,
      Err(e) => {
        log::debug!("catálogo ausente: {}", e);
        return out;
      }
    };

    let acroform = match catalog
      .get(b"AcroForm")
      .ok()
      .and_then(|obj| self.resolve(obj).ok())
      .and_then(|obj| obj.as_dict().ok())
    {
      Some(d) => d,
      None => return out,
    };

    let fields = match acroform
      .get(b"Fields")
      .ok()
      .and_then(|obj| self.resolve(obj).ok())
      .and_then(|obj| obj.as_array().ok())
    {
      Some(a) => a,
      None => return out,
    };

    for field_ref in fields {
      self.collect_field(field_ref, "", &mut out);
    }

    dedup_names(&mut out);
    out
  }

  /// Desce recursivamente um nó da árvore de campos, acumulando o nome
  /// qualificado pelo caminho de `/T`.
  fn collect_field(&self, node: &Object, prefix: &str, out: &mut Vec<SignatureField>) {
    let dict = match self.resolve(node).ok().and_then(|o| o.as_dict().ok()) {
      Some(d) => d,
      None => return,
    };

    let partial = dict
      .get(b"T")
      .ok()
      .and_then(|obj| self.resolve(obj).ok())
      .and_then(object_to_text);

    let qualified = match (&partial, prefix.is_empty()) {
      (Some(t), true) => t.clone(),
      (Some(t), false) => format!("{}.{}", prefix, t),
      (None, _) => prefix.to_string(),
    };

    let kids = dict
      .get(b"Kids")
      .ok()
      .and_then(|o| self.resolve(o).ok())
      .and_then(|o| o.as_array().ok());

    // Um widget pode ser ao mesmo tempo terminal e ter Kids de anotação;
    // um campo /Sig com /V presente é tratado como terminal.
    if let Some(kids) = kids {
      if !self.is_filled_signature(dict) {
        for kid in kids {
          self.collect_field(kid, &qualified, out);
        }
        return;
      }
    }

    if self.is_filled_signature(dict) {
      if let Some(field) = self.extract_signature(dict, &qualified) {
        out.push(field);
      }
    }
  }

  fn is_filled_signature(&self, dict: &Dictionary) -> bool {
    let is_sig = dict
      .get(b"FT")
      .ok()
      .and_then(|o| self.resolve(o).ok())
      .and_then(|o| o.as_name().ok())
      .map(|n| n == b"Sig")
      .unwrap_or(false);
    is_sig && dict.get(b"V").is_ok()
  }

  /// Achata o dicionário `/V` em um `SignatureField`. Campos sem
  /// `/Contents` não são verificáveis e são descartados aqui.
  fn extract_signature(&self, dict: &Dictionary, name: &str) -> Option<SignatureField> {
    let v_dict = dict
      .get(b"V")
      .ok()
      .and_then(|o| self.resolve(o).ok())
      .and_then(|o| o.as_dict().ok())?;

    let contents = match v_dict
      .get(b"Contents")
      .ok()
      .and_then(|o| self.resolve(o).ok())
    {
      Some(Object::String(bytes, _)) => bytes.clone(),
      _ => {
        log::debug!("campo {} sem /Contents, ignorado", name);
        return None;
      }
    };

    let byte_range = v_dict
      .get(b"ByteRange")
      .ok()
      .and_then(|o| self.resolve(o).ok())
      .and_then(|o| o.as_array().ok())
      .and_then(|arr| self.parse_byte_range(arr));

    Some(SignatureField {
      name: name.to_string(),
      byte_range,
      contents,
      entry_m: self.string_entry(v_dict, b"M"),
      entry_name: self.string_entry(v_dict, b"Name"),
      entry_reason: self.string_entry(v_dict, b"Reason"),
    })
  }

  fn parse_byte_range(&self, arr: &[Object]) -> Option<[u64; 4]> {
    if arr.len() != 4 {
      return None;
    }
    let mut range = [0u64; 4];
    for (i, obj) in arr.iter().enumerate() {
      let value = self.resolve(obj).ok()?.as_i64().ok()?;
      if value < 0 {
        return None;
      }
      range[i] = value as u64;
    }
    Some(range)
  }

  fn string_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict
      .get(key)
      .ok()
      .and_then(|o| self.resolve(o).ok())
      .and_then(object_to_text)
  }

  /// Resolve uma referência indireta (um nível por vez, com limite para
  /// ciclos de referência).
  fn resolve<'b>(&'b self, obj: &'b Object) -> Result<&'b Object> {
    let mut current = obj;
    for _ in 0..32 {
      match current {
        Object::Reference(id) => {
          current = self
            .doc
            .get_object(*id)
            .map_err(|e| PdfVerifyError::MalformedPdf(format!("referência inválida: {}", e)))?;
        }
        other => return Ok(other),
      }
    }
    Err(PdfVerifyError::MalformedPdf(
      "cadeia de referências muito profunda".to_string(),
    ))
  }
}

/// Decodifica uma string PDF para texto: UTF-16BE quando há BOM, senão
/// PDFDocEncoding tratado como Latin-1.
fn object_to_text(obj: &Object) -> Option<String> {
  match obj {
    Object::String(bytes, _) => Some(decode_pdf_text(bytes)),
    Object::Name(name) => String::from_utf8(name.clone()).ok(),
    _ => None,
  }
}

fn decode_pdf_text(bytes: &[u8]) -> String {
  if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
    let units: Vec<u16> = bytes[2..]
      .chunks_exact(2)
      .map(|c| u16::from_be_bytes([c[0], c[1]]))
      .collect();
    String::from_utf16_lossy(&units)
  } else {
    bytes.iter().map(|&b| b as char).collect()
  }
}

/// Nomes qualificados ainda repetidos (árvores malformadas) recebem um
/// sufixo `#n` para manter a chave única no relatório.
fn dedup_names(fields: &mut [SignatureField]) {
  let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
  for field in fields.iter_mut() {
    let count = seen.entry(field.name.clone()).or_insert(0);
    *count += 1;
    if *count > 1 {
      field.name = format!("{}#{}", field.name, count);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_rejects_non_pdf() {
    let result = PdfReader::open(b"not a pdf at all");
    assert!(matches!(result, Err(PdfVerifyError::MalformedPdf(_))));
  }

  #[test]
  fn test_open_rejects_truncated_pdf() {
    let result = PdfReader::open(b"%PDF-1.7\ngarbage without xref");
    assert!(result.is_err());
  }

  #[test]
  fn test_decode_pdf_text_latin1() {
    assert_eq!(decode_pdf_text(b"Jo\xe3o"), "Jo\u{e3}o");
  }

  #[test]
  fn test_decode_pdf_text_utf16be() {
    // BOM + "Ab"
    let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00, 0x62];
    assert_eq!(decode_pdf_text(&bytes), "Ab");
  }

  #[test]
  fn test_dedup_names() {
    let mut fields = vec![
      SignatureField {
        name: "Sig".to_string(),
        byte_range: None,
        contents: Vec::new(),
        entry_m: None,
        entry_name: None,
        entry_reason: None,
      },
      SignatureField {
        name: "Sig".to_string(),
        byte_range: None,
        contents: Vec::new(),
        entry_m: None,
        entry_name: None,
        entry_reason: None,
      },
    ];
    dedup_names(&mut fields);
    assert_eq!(fields[0].name, "Sig");
    assert_eq!(fields[1].name, "Sig#2");
  }
}
