//! Interface de terminal do batchpilot — barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso dos chunks e `console`
//! para estilização com cores. O [`RunProgress`] implementa
//! [`LifecycleObserver`] e é injetado no orquestrador pela CLI.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch_api::StatusSnapshot;
use crate::jsonl::ValidationReport;
use crate::orchestrator::LifecycleObserver;
use crate::state_machine::{RunReport, UnitState, WorkUnit};

/// Indicador visual de progresso para uma execução de batches no terminal.
///
/// Exibe uma barra com um passo por chunk e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e polling (amarelo).
pub struct RunProgress {
    // Barra de progresso do indicatif; criada em `run_started`.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RunProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} batches {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }
}

impl LifecycleObserver for RunProgress {
    fn run_started(&self, units: usize) {
        self.pb.set_length(units as u64);
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    fn unit_started(&self, unit: &WorkUnit) {
        self.pb
            .set_message(format!("chunk {} ({} records)", unit.index, unit.records));
    }

    fn transition(&self, unit: &WorkUnit, _from: UnitState, to: UnitState) {
        self.pb.set_message(format!("chunk {}: {to}", unit.index));
    }

    /// Mostra o status remoto atual, o avanço das requisições e o número da consulta.
    fn polled(&self, unit: &WorkUnit, snapshot: &StatusSnapshot, poll: u32) {
        let job = unit.job_id.as_deref().unwrap_or("?");
        self.pb.set_message(format!(
            "chunk {}: {job} {} (poll {poll})",
            unit.index,
            self.yellow.apply_to(progress_label(snapshot))
        ));
    }

    /// Avança a barra e imprime o resultado do chunk.
    fn unit_finished(&self, unit: &WorkUnit) {
        self.pb.inc(1);
        match unit.state {
            UnitState::Succeeded => self.pb.println(format!(
                "  {} {} → {}",
                self.green.apply_to("✓"),
                unit.path.display(),
                unit.result_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            )),
            _ => self.pb.println(format!(
                "  {} {}: {}",
                self.red.apply_to("✗"),
                unit.path.display(),
                unit.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }

    fn run_finished(&self, _report: &RunReport) {
        self.pb.finish_and_clear();
    }
}

/// Texto curto do status de um batch, com `concluídas/total` quando a API
/// informa a contagem de requisições.
pub fn progress_label(snapshot: &StatusSnapshot) -> String {
    match &snapshot.request_counts {
        Some(counts) if counts.total > 0 => {
            let mut label = format!("{} {}/{}", snapshot.status, counts.completed, counts.total);
            if counts.failed > 0 {
                label.push_str(&format!(", {} failed", counts.failed));
            }
            label
        }
        _ => snapshot.status.to_string(),
    }
}

/// Imprime o resumo final da execução, listando os chunks que falharam.
pub fn print_summary(report: &RunReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    println!();
    if report.is_success() {
        println!(
            "{}",
            green.apply_to(format!(
                "All {} batches processed successfully.",
                report.units.len()
            ))
        );
    } else {
        println!(
            "{}",
            red.apply_to(format!(
                "{} of {} batches failed to process ({} succeeded):",
                report.failed.len(),
                report.units.len(),
                report.succeeded()
            ))
        );
        for path in &report.failed {
            println!("  - {}", path.display());
        }
    }
    for path in &report.cleanup_failures {
        println!(
            "  {} could not delete {}",
            yellow.apply_to("!"),
            path.display()
        );
    }
}

/// Imprime o relatório completo em JSON (modo verbose).
pub fn print_report_json(report: &RunReport) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

/// Imprime o resultado da validação de um arquivo JSONL.
pub fn print_validation(path: &std::path::Path, report: &ValidationReport) {
    match &report.first_error {
        None => println!(
            "{} JSONL file '{}' is valid ({} records).",
            Style::new().green().bold().apply_to("✓"),
            path.display(),
            report.records
        ),
        Some(err) => eprintln!(
            "{} JSONL file '{}' is invalid: line {}: {}",
            Style::new().red().bold().apply_to("✗"),
            path.display(),
            err.line,
            err.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_api::JobStatus;
    use crate::batch_api::types::RequestCounts;

    fn snapshot(status: JobStatus, counts: Option<RequestCounts>) -> StatusSnapshot {
        StatusSnapshot {
            status,
            result: None,
            request_counts: counts,
        }
    }

    #[test]
    fn progress_label_shows_completed_over_total() {
        let snap = snapshot(
            JobStatus::InProgress,
            Some(RequestCounts {
                total: 10,
                completed: 4,
                failed: 0,
            }),
        );
        assert_eq!(progress_label(&snap), "in_progress 4/10");

        let snap = snapshot(
            JobStatus::Finalizing,
            Some(RequestCounts {
                total: 10,
                completed: 8,
                failed: 2,
            }),
        );
        assert_eq!(progress_label(&snap), "finalizing 8/10, 2 failed");
    }

    #[test]
    fn progress_label_without_counts_is_the_status() {
        assert_eq!(
            progress_label(&snapshot(JobStatus::Validating, None)),
            "validating"
        );
        assert_eq!(
            progress_label(&snapshot(
                JobStatus::Validating,
                Some(RequestCounts::default())
            )),
            "validating"
        );
    }
}
