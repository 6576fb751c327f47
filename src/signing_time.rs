use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use der_parser::asn1_rs::{Any, FromDer, Tag};

/// Instante de assinatura reconciliado.
///
/// `local` preserva o relógio de parede original (é o que vai para
/// `signing_time` no relatório); `utc` é o instante efetivo usado nas
/// comparações com a janela de validade do certificado.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningTime {
  pub local: NaiveDateTime,
  pub timezone: String,
  pub utc: DateTime<Utc>,
}

/// Reconcilia as fontes de data de assinatura, na ordem de prioridade:
/// `/M` do dicionário (preserva fuso) → `signingTime` do CMS (UTC) →
/// `genTime` do carimbo TSA (UTC).
pub fn resolve_signing_time(
  entry_m: Option<&str>,
  cms_signing_time_der: Option<&[u8]>,
  tsa_gen_time: Option<DateTime<Utc>>,
) -> Option<SigningTime> {
  if let Some(raw) = entry_m {
    if let Some(time) = parse_pdf_date(raw) {
      return Some(time);
    }
    log::debug!("data /M malformada: {}", raw);
  }

  if let Some(der) = cms_signing_time_der {
    if let Some(utc) = parse_asn1_time(der) {
      return Some(utc_signing_time(utc));
    }
  }

  tsa_gen_time.map(utc_signing_time)
}

fn utc_signing_time(utc: DateTime<Utc>) -> SigningTime {
  SigningTime {
    local: utc.naive_utc(),
    timezone: "+00:00".to_string(),
    utc,
  }
}

/// Parseia uma data PDF `D:YYYYMMDDHHmmSS` com sufixo opcional `Z` ou
/// `±HH'mm'`. Exige pelo menos os 14 dígitos; sem fuso, assume UTC.
pub fn parse_pdf_date(raw: &str) -> Option<SigningTime> {
  let trimmed = raw.strip_prefix("D:").unwrap_or(raw);
  if trimmed.len() < 14 || !trimmed.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
    return None;
  }

  let local = NaiveDateTime::parse_from_str(&trimmed[..14], "%Y%m%d%H%M%S").ok()?;
  let (offset_seconds, timezone) = parse_pdf_timezone(&trimmed[14..])?;

  let offset = FixedOffset::east_opt(offset_seconds)?;
  let utc = offset
    .from_local_datetime(&local)
    .single()?
    .with_timezone(&Utc);

  Some(SigningTime {
    local,
    timezone,
    utc,
  })
}

/// Devolve `(deslocamento em segundos, "±HH:MM")`. Sufixo vazio ou `Z`
/// significam UTC; qualquer outra coisa precisa ser `±HH'mm'` (o `mm` e as
/// aspas são opcionais na prática).
fn parse_pdf_timezone(suffix: &str) -> Option<(i32, String)> {
  let suffix = suffix.trim();
  if suffix.is_empty() || suffix == "Z" {
    return Some((0, "+00:00".to_string()));
  }

  let mut chars = suffix.chars();
  let sign = match chars.next() {
    Some('+') => 1,
    Some('-') => -1,
    _ => return None,
  };

  let digits: String = chars.filter(|c| c.is_ascii_digit()).collect();
  if digits.len() < 2 {
    return None;
  }
  let hours: i32 = digits[..2].parse().ok()?;
  let minutes: i32 = if digits.len() >= 4 {
    digits[2..4].parse().ok()?
  } else {
    0
  };
  if hours > 23 || minutes > 59 {
    return None;
  }

  let seconds = sign * (hours * 3600 + minutes * 60);
  let tz = format!(
    "{}{:02}:{:02}",
    if sign >= 0 { '+' } else { '-' },
    hours,
    minutes
  );
  Some((seconds, tz))
}

/// Decodifica um UTCTime ou GeneralizedTime DER (o valor do atributo
/// `signingTime`, OID 1.2.840.113549.1.9.5) para um instante UTC.
pub fn parse_asn1_time(der: &[u8]) -> Option<DateTime<Utc>> {
  let (_, any) = Any::from_der(der).ok()?;
  let text = std::str::from_utf8(any.data).ok()?;

  match any.tag() {
    Tag::UtcTime => parse_time_text(text, true),
    Tag::GeneralizedTime => parse_time_text(text, false),
    _ => None,
  }
}

/// Corpo textual dos dois tipos ASN.1 de tempo: `YYMMDDHHMMSS` ou
/// `YYYYMMDDHHMMSS`, fração opcional, e `Z` ou `±HHMM` no final.
fn parse_time_text(text: &str, two_digit_year: bool) -> Option<DateTime<Utc>> {
  let digit_count = if two_digit_year { 12 } else { 14 };
  if text.len() < digit_count || !text.as_bytes()[..digit_count].iter().all(u8::is_ascii_digit) {
    return None;
  }

  let (year, rest) = if two_digit_year {
    let yy: i32 = text[..2].parse().ok()?;
    // Regra do RFC 5280 para UTCTime
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    (year, &text[2..digit_count])
  } else {
    (text[..4].parse().ok()?, &text[4..digit_count])
  };

  let month: u32 = rest[..2].parse().ok()?;
  let day: u32 = rest[2..4].parse().ok()?;
  let hour: u32 = rest[4..6].parse().ok()?;
  let minute: u32 = rest[6..8].parse().ok()?;
  let second: u32 = rest[8..10].parse().ok()?;

  let mut suffix = &text[digit_count..];
  if let Some(dot) = suffix.find(|c: char| c == '.' || c == ',') {
    // Fração de segundo: ignorada
    let after = &suffix[dot + 1..];
    let end = after
      .find(|c: char| !c.is_ascii_digit())
      .unwrap_or(after.len());
    suffix = &after[end..];
  }

  let offset_seconds: i32 = match suffix.bytes().next() {
    None => 0,
    Some(b'Z') if suffix.len() == 1 => 0,
    Some(sign @ (b'+' | b'-')) => {
      let digits = &suffix[1..];
      if digits.len() < 4 || !digits.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        return None;
      }
      let hours: i32 = digits[..2].parse().ok()?;
      let minutes: i32 = digits[2..4].parse().ok()?;
      let magnitude = hours * 3600 + minutes * 60;
      if sign == b'-' {
        -magnitude
      } else {
        magnitude
      }
    }
    _ => return None,
  };

  let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
  let offset = FixedOffset::east_opt(offset_seconds)?;
  Some(
    offset
      .from_local_datetime(&naive)
      .single()?
      .with_timezone(&Utc),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  #[test]
  fn test_parse_pdf_date_with_offset() {
    let time = parse_pdf_date("D:20240115103000+07'00'").unwrap();
    assert_eq!(
      time.local,
      NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
    );
    assert_eq!(time.timezone, "+07:00");
    // 10:30 +07:00 == 03:30 UTC
    assert_eq!(time.utc.format("%H:%M").to_string(), "03:30");
  }

  #[test]
  fn test_parse_pdf_date_zulu() {
    let time = parse_pdf_date("D:20251120100807Z").unwrap();
    assert_eq!(time.timezone, "+00:00");
    assert_eq!(time.local, time.utc.naive_utc());
  }

  #[test]
  fn test_parse_pdf_date_no_timezone_defaults_utc() {
    let time = parse_pdf_date("D:20240115103000").unwrap();
    assert_eq!(time.timezone, "+00:00");
  }

  #[test]
  fn test_parse_pdf_date_negative_offset() {
    let time = parse_pdf_date("D:20240115103000-05'00'").unwrap();
    assert_eq!(time.timezone, "-05:00");
    assert_eq!(time.utc.format("%H:%M").to_string(), "15:30");
  }

  #[test]
  fn test_parse_pdf_date_malformed() {
    assert!(parse_pdf_date("D:2024").is_none());
    assert!(parse_pdf_date("hoje").is_none());
    assert!(parse_pdf_date("D:20241315103000").is_none());
  }

  #[test]
  fn test_parse_asn1_utc_time() {
    // UTCTime "240115103000Z"
    let mut der = vec![0x17, 0x0d];
    der.extend_from_slice(b"240115103000Z");
    let time = parse_asn1_time(&der).unwrap();
    assert_eq!(time.format("%Y-%m-%dT%H:%M:%S").to_string(), "2024-01-15T10:30:00");
  }

  #[test]
  fn test_parse_asn1_utc_time_last_century() {
    let mut der = vec![0x17, 0x0d];
    der.extend_from_slice(b"991231235959Z");
    let time = parse_asn1_time(&der).unwrap();
    assert_eq!(time.format("%Y").to_string(), "1999");
  }

  #[test]
  fn test_parse_asn1_generalized_time() {
    let mut der = vec![0x18, 0x0f];
    der.extend_from_slice(b"20240115103000Z");
    let time = parse_asn1_time(&der).unwrap();
    assert_eq!(time.format("%Y-%m-%dT%H:%M:%S").to_string(), "2024-01-15T10:30:00");
  }

  #[test]
  fn test_resolve_prefers_pdf_m() {
    let mut cms_der = vec![0x17, 0x0d];
    cms_der.extend_from_slice(b"230101000000Z");
    let time =
      resolve_signing_time(Some("D:20240115103000+07'00'"), Some(cms_der.as_slice()), None)
        .unwrap();
    assert_eq!(time.timezone, "+07:00");
    assert_eq!(time.local.format("%Y").to_string(), "2024");
  }

  #[test]
  fn test_resolve_falls_back_to_cms() {
    let mut cms_der = vec![0x17, 0x0d];
    cms_der.extend_from_slice(b"230101000000Z");
    let time = resolve_signing_time(Some("lixo"), Some(cms_der.as_slice()), None).unwrap();
    assert_eq!(time.timezone, "+00:00");
    assert_eq!(time.local.format("%Y").to_string(), "2023");
  }

  #[test]
  fn test_resolve_none_when_all_absent() {
    assert!(resolve_signing_time(None, None, None).is_none());
  }
}
