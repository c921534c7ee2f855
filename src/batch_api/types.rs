//! Tipos de dados para requisições e respostas da API de batches.
//!
//! Todas as structs derivam `Serialize`/`Deserialize` conforme o formato JSON
//! esperado pelos endpoints `/v1/files` e `/v1/batches`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Objeto retornado por `POST /v1/files` após o upload de um chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObject {
    /// Identificador do arquivo, consumido pela criação do batch.
    pub id: String,
}

/// Parâmetros de submissão fornecidos pelo chamador.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitConfig {
    /// Janela de conclusão (ex.: "24h").
    pub completion_window: String,
    /// Endpoint alvo de cada linha do arquivo (ex.: "/v1/completions").
    pub endpoint: String,
    /// Metadados opcionais anexados ao batch.
    pub metadata: BTreeMap<String, String>,
}

/// Corpo da requisição para `POST /v1/batches`.
///
/// `metadata` não é serializado quando vazio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub completion_window: String,
    pub endpoint: String,
    pub input_file_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CreateBatchRequest {
    pub fn new(input_file_id: &str, config: &SubmitConfig) -> Self {
        Self {
            completion_window: config.completion_window.clone(),
            endpoint: config.endpoint.clone(),
            input_file_id: input_file_id.to_string(),
            metadata: config.metadata.clone(),
        }
    }
}

/// Status de um batch remoto, no vocabulário da API.
///
/// Strings desconhecidas viram [`JobStatus::Unknown`] e são tratadas como
/// não terminais, para que o polling continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Validating,
    InProgress,
    Finalizing,
    #[serde(alias = "succeeded")]
    Completed,
    Failed,
    Expired,
    Cancelling,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Nenhuma transição acontece a partir deste status.
    pub fn is_terminal(self) -> bool {
        self.is_success() || self.is_failure()
    }

    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// Terminal sem artefato: falha, expiração ou cancelamento.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Expired | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Validating => "validating",
            JobStatus::InProgress => "in_progress",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Contagem de requisições reportada pela API (opcional).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Resposta de `GET /v1/batches/{id}` (e de `POST /v1/batches`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchObject {
    pub id: String,
    pub status: JobStatus,
    /// URL direta para o resultado, quando a API a fornece.
    #[serde(default)]
    pub output_file_url: Option<String>,
    /// Identificador do arquivo de saída, baixável por `/v1/files/{id}/content`.
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
}

impl BatchObject {
    /// Referência para download do resultado, priorizando a URL direta.
    pub fn result_ref(&self) -> Option<ResultRef> {
        if let Some(url) = self.output_file_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(ResultRef::Url(url.to_string()));
        }
        self.output_file_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| ResultRef::FileId(id.to_string()))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            result: if self.status.is_success() {
                self.result_ref()
            } else {
                None
            },
            request_counts: self.request_counts,
        }
    }
}

/// Onde buscar o artefato de resultado de um batch concluído.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRef {
    /// URL absoluta ou relativa à base da API.
    Url(String),
    /// Arquivo gerenciado pela API.
    FileId(String),
}

/// Visão do status de um batch em um instante do polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    /// Presente apenas quando o status é de sucesso.
    pub result: Option<ResultRef>,
    pub request_counts: Option<RequestCounts>,
}

/// Indica se um identificador remoto pode ser usado como segmento de URL e
/// em nomes de arquivo: não vazio, só `[A-Za-z0-9_.:-]`, sem `.` inicial.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}
