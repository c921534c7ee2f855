//! Configuração do batchpilot carregada a partir de `batchpilot.toml`.
//!
//! A struct [`BatchConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente (`API_KEY`, `COMPLETION_WINDOW`, `ENDPOINT`,
//! `BATCH_API_BASE_URL`) têm precedência sobre o arquivo; flags da CLI
//! têm precedência sobre ambos.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::batch_api::client::DEFAULT_BASE_URL;
use crate::batch_api::ClientSettings;
use crate::error::BatchError;

pub const CONFIG_FILE: &str = "batchpilot.toml";

/// Configuração de nível superior carregada de `batchpilot.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Chave da API. Obrigatória apenas para o comando `process`.
    #[serde(default)]
    pub api_key: String,

    /// URL base da API de batches.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Janela de conclusão enviada na criação de cada batch.
    #[serde(default = "default_completion_window")]
    pub completion_window: String,

    /// Endpoint alvo das requisições contidas no arquivo.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Número de linhas por chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Intervalo fixo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Limite de consultas de status por batch. Ausente = sem limite.
    #[serde(default)]
    pub max_polls: Option<u32>,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// Valor padrão da janela de conclusão: "24h".
fn default_completion_window() -> String {
    "24h".to_string()
}

// Valor padrão do endpoint: "/v1/completions".
fn default_endpoint() -> String {
    "/v1/completions".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            completion_window: default_completion_window(),
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BatchConfig {
    /// Carrega a configuração de `batchpilot.toml` no diretório atual e aplica
    /// as variáveis de ambiente do processo.
    pub fn load() -> Result<Self, BatchError> {
        let mut config = Self::from_file(Path::new(CONFIG_FILE))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Lê o arquivo indicado. Usa valores padrão se o arquivo não existir.
    pub fn from_file(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| BatchError::io(path, e))?;
        Ok(toml::from_str::<BatchConfig>(&contents)?)
    }

    /// Sobrescreve campos com variáveis de ambiente não vazias.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(key) = var("API_KEY") {
            self.api_key = key;
        }
        if let Some(window) = var("COMPLETION_WINDOW") {
            self.completion_window = window;
        }
        if let Some(endpoint) = var("ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(url) = var("BATCH_API_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Falha cedo quando a chave da API não está configurada.
    pub fn require_api_key(&self) -> Result<&str, BatchError> {
        if self.api_key.trim().is_empty() {
            return Err(BatchError::Config(
                "API_KEY is not set in the environment or batchpilot.toml".to_string(),
            ));
        }
        Ok(&self.api_key)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Parâmetros de conexão para o [`BatchClient`](crate::batch_api::BatchClient).
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = BatchConfig::default();
        assert_eq!(config.completion_window, "24h");
        assert_eq!(config.endpoint, "/v1/completions");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.max_polls, None);
        assert_eq!(config.base_url, "https://api.openai.com");
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "sk-test-123"
            chunk_size = 500
            max_polls = 120
        "#;
        let config: BatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "sk-test-123");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.max_polls, Some(120));
        assert_eq!(config.completion_window, "24h");
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: BatchConfig = toml::from_str(r#"endpoint = "/v1/embeddings""#).unwrap();
        let env: HashMap<&str, &str> = [
            ("API_KEY", "sk-env"),
            ("ENDPOINT", "/v1/chat/completions"),
            ("COMPLETION_WINDOW", ""),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_key, "sk-env");
        assert_eq!(config.endpoint, "/v1/chat/completions");
        // Empty values are ignored.
        assert_eq!(config.completion_window, "24h");
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let config = BatchConfig::default();
        assert!(matches!(
            config.require_api_key(),
            Err(BatchError::Config(_))
        ));

        let config = BatchConfig {
            api_key: "sk-1".into(),
            ..BatchConfig::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "sk-1");
    }

    #[test]
    fn from_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = BatchConfig::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn client_settings_carry_base_url_and_timeout() {
        let config = BatchConfig {
            base_url: "http://localhost:8080".into(),
            request_timeout_secs: 5,
            ..BatchConfig::default()
        };
        let settings = config.client_settings();
        assert_eq!(settings.base_url, "http://localhost:8080");
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
    }
}
