use thiserror::Error;

/// Erros internos do motor de verificação.
///
/// Nenhuma destas variantes escapa de `verify_pdf` depois que a produção de
/// relatórios começa: o orquestrador captura cada falha e registra a mensagem
/// (truncada) em `structure_validation.formatting_errors`.
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum PdfVerifyError {
    #[error("PDF inválido: {0}")]
    MalformedPdf(String),

    #[error("CMS não é signedData (contentType {0})")]
    NotSignedData(String),

    #[error("Nenhum SignerInfo no CMS")]
    NoSignerInfo,

    #[error("Erro ao decodificar: {0}")]
    DecodingError(String),

    #[error("Erro ao parsear certificado: {0}")]
    CertParseError(String),

    #[error("unsupported digest algorithm")]
    UnsupportedDigest,

    #[error("unsupported key type")]
    UnsupportedKey,

    #[error("Falha de integridade: {0}")]
    IntegrityFailed(String),

    #[error("Erro ao parsear timestamp: {0}")]
    TimestampParseError(String),
}

pub type Result<T> = std::result::Result<T, PdfVerifyError>;

/// Trunca mensagens antes de registrá-las no relatório, respeitando
/// fronteiras UTF-8.
pub fn truncate_message(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() <= max_chars {
        msg.to_string()
    } else {
        msg.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message_short() {
        assert_eq!(truncate_message("ok", 200), "ok");
    }

    #[test]
    fn test_truncate_message_long() {
        let long = "x".repeat(300);
        assert_eq!(truncate_message(&long, 200).len(), 200);
    }

    #[test]
    fn test_truncate_message_utf8_boundary() {
        let msg = "çãé".repeat(100);
        let truncated = truncate_message(&msg, 200);
        assert_eq!(truncated.chars().count(), 200);
    }
}
