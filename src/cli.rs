//! Interface de linha de comando do batchpilot baseada em clap.
//!
//! Define a struct [`Cli`] com os subcomandos [`Command`] (process, jsonl)
//! e flags globais (--verbose, --log-file).

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// batchpilot — divide arquivos JSONL grandes e processa cada parte na API de batches.
#[derive(Debug, Parser)]
#[command(name = "batchpilot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Também grava o log neste arquivo.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Divide o arquivo em chunks, envia cada um como batch, aguarda a conclusão,
    /// baixa os resultados e remove os chunks processados.
    Process(ProcessArgs),

    /// Operações sobre arquivos JSONL.
    #[command(subcommand)]
    Jsonl(JsonlCommand),
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Caminho do arquivo JSONL de entrada.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Diretório onde os resultados serão salvos.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Número de linhas por chunk [padrão: 1000].
    #[arg(long, short)]
    pub chunk_size: Option<usize>,

    /// Janela de conclusão do batch [padrão: 24h].
    #[arg(long)]
    pub completion_window: Option<String>,

    /// Endpoint da API usado pelas requisições do batch [padrão: /v1/completions].
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Metadados do batch no formato chave=valor. Pode ser repetido.
    #[arg(long = "metadata", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Intervalo entre consultas de status, em segundos.
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Número máximo de consultas de status por batch.
    #[arg(long)]
    pub max_polls: Option<u32>,
}

impl ProcessArgs {
    pub fn metadata_map(&self) -> BTreeMap<String, String> {
        self.metadata.iter().cloned().collect()
    }
}

#[derive(Debug, Subcommand)]
pub enum JsonlCommand {
    /// Converte um arquivo CSV em JSONL.
    CsvToJsonl {
        /// Caminho do arquivo CSV de entrada.
        #[arg(long, short)]
        csv_file: PathBuf,

        /// Caminho do arquivo JSONL de saída.
        #[arg(long, short)]
        jsonl_file: PathBuf,
    },

    /// Valida o formato de um arquivo JSONL.
    Validate {
        /// Caminho do arquivo JSONL a validar.
        #[arg(long, short)]
        jsonl_file: PathBuf,
    },

    /// Cria um arquivo JSONL a partir de pares chave/valor informados manualmente.
    ///
    /// Exemplo: --record key1 value1 --record key2 value2
    CreateManual {
        /// Caminho do arquivo JSONL de saída.
        #[arg(long, short)]
        jsonl_file: PathBuf,

        /// Par chave/valor. Pode ser repetido; todos formam um único registro.
        #[arg(long, short, num_args = 2, value_names = ["KEY", "VALUE"])]
        record: Vec<String>,
    },
}

/// Converte `chave=valor` em tupla.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Agrupa a lista achatada de `--record` em pares.
pub fn record_pairs(flat: &[String]) -> Vec<(String, String)> {
    flat.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_process_subcommand() {
        let cli = Cli::parse_from([
            "batchpilot",
            "process",
            "-i",
            "data.jsonl",
            "-o",
            "results",
            "-c",
            "250",
            "--metadata",
            "project=eval",
            "--metadata",
            "owner=ml",
        ]);
        match cli.command {
            Command::Process(args) => {
                assert_eq!(args.input, PathBuf::from("data.jsonl"));
                assert_eq!(args.output, PathBuf::from("results"));
                assert_eq!(args.chunk_size, Some(250));
                assert!(args.completion_window.is_none());
                let metadata = args.metadata_map();
                assert_eq!(metadata["project"], "eval");
                assert_eq!(metadata["owner"], "ml");
            }
            _ => panic!("expected Process command"),
        }
    }

    #[test]
    fn cli_rejects_malformed_metadata() {
        let result = Cli::try_parse_from([
            "batchpilot",
            "process",
            "-i",
            "a.jsonl",
            "-o",
            "out",
            "--metadata",
            "novalue",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "batchpilot",
            "--verbose",
            "--log-file",
            "batch.log",
            "jsonl",
            "validate",
            "-j",
            "a.jsonl",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.log_file, Some(PathBuf::from("batch.log")));
        assert!(matches!(
            cli.command,
            Command::Jsonl(JsonlCommand::Validate { .. })
        ));
    }

    #[test]
    fn cli_parses_create_manual_records() {
        let cli = Cli::parse_from([
            "batchpilot",
            "jsonl",
            "create-manual",
            "-j",
            "out.jsonl",
            "--record",
            "key1",
            "value1",
            "-r",
            "key2",
            "value2",
        ]);
        match cli.command {
            Command::Jsonl(JsonlCommand::CreateManual { jsonl_file, record }) => {
                assert_eq!(jsonl_file, PathBuf::from("out.jsonl"));
                assert_eq!(
                    record_pairs(&record),
                    vec![
                        ("key1".to_string(), "value1".to_string()),
                        ("key2".to_string(), "value2".to_string())
                    ]
                );
            }
            _ => panic!("expected CreateManual command"),
        }
    }

    #[test]
    fn cli_parses_csv_to_jsonl() {
        let cli = Cli::parse_from([
            "batchpilot",
            "jsonl",
            "csv-to-jsonl",
            "-c",
            "in.csv",
            "-j",
            "out.jsonl",
        ]);
        assert!(matches!(
            cli.command,
            Command::Jsonl(JsonlCommand::CsvToJsonl { .. })
        ));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
