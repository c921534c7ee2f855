//! Tipos de erro para o cliente da API de batches.
//!
//! Define [`ApiError`] com as três classes de falha que o cliente distingue:
//! falhas transitórias de rede (retentáveis), rejeições da API e corpos de
//! resposta ilegíveis. Usa `thiserror` para derivar `Display` e `Error`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API remota de batches.
///
/// Somente [`TransientNetwork`](ApiError::TransientNetwork) é retentado pela
/// [`RetryPolicy`](super::RetryPolicy); as demais variantes sobem imediatamente.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Falha na camada de rede (conexão recusada, DNS, timeout, envio interrompido).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// A API respondeu com status HTTP de erro (ex.: 401 chave inválida, 400 payload malformado).
    /// Contém o código de status e o corpo da resposta.
    #[error("API rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// A resposta chegou, mas o corpo não pôde ser interpretado.
    #[error("failed to decode API response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Indica se vale a pena repetir a chamada que produziu este erro.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::TransientNetwork(_))
    }

    /// Código HTTP da rejeição, se houver.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rejeição da classe 4xx (erro do chamador: auth, payload, recurso inexistente).
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Rejeição da classe 5xx (erro do servidor).
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }
}

impl From<reqwest::Error> for ApiError {
    /// Classifica um erro do `reqwest`. Falhas ao ler o corpo (conexão caída no
    /// meio da resposta, corpo truncado) também são transitórias: o transporte
    /// falhou, não o conteúdo. Erros de JSON são tratados por quem lê o corpo.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout()
            || err.is_connect()
            || err.is_request()
            || err.is_body()
            || err.is_decode()
        {
            ApiError::TransientNetwork(err.to_string())
        } else {
            ApiError::Rejected {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = ApiError::Rejected {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(
            err.to_string(),
            "API rejected request (status 401): Invalid API key"
        );
    }

    #[test]
    fn only_network_errors_are_transient() {
        assert!(ApiError::TransientNetwork("connection reset".into()).is_transient());
        assert!(
            !ApiError::Rejected {
                status: 500,
                message: "boom".into()
            }
            .is_transient()
        );
        assert!(!ApiError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn status_class_helpers() {
        let client = ApiError::Rejected {
            status: 404,
            message: "not found".into(),
        };
        let server = ApiError::Rejected {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(client.is_client_error());
        assert!(!client.is_server_error());
        assert!(server.is_server_error());
        assert_eq!(ApiError::Decode("x".into()).status(), None);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
