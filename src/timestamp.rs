use chrono::{DateTime, Utc};
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::{Decode, Encode};
use der_parser::asn1_rs::{Any, FromDer, Integer, Sequence, Tag};

use crate::cms::{CmsSignature, OID_TIMESTAMP_TOKEN};
use crate::signing_time::parse_asn1_time;

/// Carimbo de tempo RFC 3161 detectado nos atributos não assinados.
#[derive(Debug, Clone)]
pub struct TsaToken {
  pub gen_time: DateTime<Utc>,
}

/// Procura o atributo 1.2.840.113549.1.9.16.2.14 (signatureTimeStampToken)
/// e extrai o `TSTInfo.genTime` do CMS aninhado.
///
/// Só detecção: a assinatura da TSA não é verificada aqui. Qualquer falha de
/// parse é tratada como ausência de carimbo (melhor esforço, sem erro no
/// relatório).
pub fn detect_timestamp(cms: &CmsSignature) -> Option<TsaToken> {
  let token_der = cms.unsigned_attr(&OID_TIMESTAMP_TOKEN)?;
  match parse_token_gen_time(token_der) {
    Some(gen_time) => Some(TsaToken { gen_time }),
    None => {
      log::debug!("atributo de timestamp presente mas TSTInfo não parseável");
      None
    }
  }
}

/// O valor do atributo é um TimeStampToken: um `ContentInfo` cujo
/// `SignedData` encapsula o TSTInfo como eContent.
fn parse_token_gen_time(token_der: &[u8]) -> Option<DateTime<Utc>> {
  let content_info = ContentInfo::from_der(token_der).ok()?;
  let inner = content_info.content.to_der().ok()?;
  let signed_data = SignedData::from_der(&inner).ok()?;

  let econtent = signed_data.encap_content_info.econtent.as_ref()?;
  parse_tst_info_gen_time(econtent.value())
}

/// Caminha posicionalmente pelo TSTInfo:
///
/// ```text
/// TSTInfo ::= SEQUENCE {
///   version        INTEGER,
///   policy         OBJECT IDENTIFIER,
///   messageImprint SEQUENCE,
///   serialNumber   INTEGER,
///   genTime        GeneralizedTime, ... }
/// ```
fn parse_tst_info_gen_time(tst_der: &[u8]) -> Option<DateTime<Utc>> {
  let (_, sequence) = Sequence::from_der(tst_der).ok()?;
  let content = sequence.content.as_ref();

  let (rest, _version) = Integer::from_der(content).ok()?;
  let (rest, _policy) = Any::from_der(rest).ok()?;
  let (rest, _imprint) = Sequence::from_der(rest).ok()?;
  let (rest, _serial) = Integer::from_der(rest).ok()?;
  let (_, gen_time) = Any::from_der(rest).ok()?;

  if gen_time.tag() != Tag::GeneralizedTime || gen_time.data.len() > 127 {
    return None;
  }

  // Reaproveita o parser de tempo ASN.1 sobre um TLV reconstruído
  let mut tlv = Vec::with_capacity(2 + gen_time.data.len());
  tlv.push(0x18);
  tlv.push(gen_time.data.len() as u8);
  tlv.extend_from_slice(gen_time.data);
  parse_asn1_time(&tlv)
}
