use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::batch_api::{BatchApi, StatusSnapshot, SubmitConfig, is_safe_id};
use crate::cleanup::{clean_up_files, ensure_directory};
use crate::error::BatchError;
use crate::state_machine::{RunReport, StateMachine, UnitEvent, UnitState, WorkUnit};

/// Receives lifecycle notifications while a run is in progress.
///
/// All methods default to no-ops so implementations only override what they display.
pub trait LifecycleObserver {
    fn run_started(&self, _units: usize) {}
    fn unit_started(&self, _unit: &WorkUnit) {}
    fn transition(&self, _unit: &WorkUnit, _from: UnitState, _to: UnitState) {}
    fn polled(&self, _unit: &WorkUnit, _snapshot: &StatusSnapshot, _poll: u32) {}
    fn unit_finished(&self, _unit: &WorkUnit) {}
    fn run_finished(&self, _report: &RunReport) {}
}

/// Per-run settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub submit: SubmitConfig,
    /// Fixed wait between status polls.
    pub poll_interval: Duration,
    /// Upper bound on polls per job; `None` polls until the job is terminal.
    pub max_polls: Option<u32>,
}

impl RunSettings {
    /// Where the result artifact of `job_id` is written. Ids that could leave
    /// the output directory are refused.
    pub fn result_path(&self, job_id: &str) -> Result<PathBuf, BatchError> {
        if !is_safe_id(job_id) {
            return Err(BatchError::InvalidRemoteId(job_id.to_string()));
        }
        Ok(self.output_dir.join(format!("results_{job_id}.jsonl")))
    }
}

/// Drives work units through upload, submit, poll and download, one at a time.
///
/// Owns the API client for its whole lifetime; dropping the orchestrator (or
/// calling [`close`](Self::close)) releases the client's connections.
pub struct BatchOrchestrator<C, O> {
    client: C,
    observer: O,
    settings: RunSettings,
}

impl<C: BatchApi, O: LifecycleObserver> BatchOrchestrator<C, O> {
    pub fn new(client: C, settings: RunSettings, observer: O) -> Self {
        Self {
            client,
            observer,
            settings,
        }
    }

    /// Processes every unit in order, then removes the chunk files of the units
    /// that succeeded.
    ///
    /// Unit failures never abort the run; they are listed in the returned report.
    /// Only a failure to create the output directory is returned as an error.
    pub async fn run(&self, units: Vec<WorkUnit>) -> Result<RunReport, BatchError> {
        ensure_directory(&self.settings.output_dir).await?;

        let mut report = RunReport::new(Utc::now());
        tracing::info!(run_id = %report.run_id, units = units.len(), "starting batch run");
        self.observer.run_started(units.len());

        let mut processed = Vec::new();
        for mut unit in units {
            self.process_unit(&mut unit).await;
            if unit.state == UnitState::Succeeded {
                processed.push(unit.path.clone());
            }
            report.push(&unit);
        }

        let cleanup = clean_up_files(&processed).await;
        report.removed = cleanup.removed;
        report.cleanup_failures = cleanup.failed;
        report.finish();

        if report.failed.is_empty() {
            tracing::info!(run_id = %report.run_id, "all batches processed successfully");
        } else {
            let failed: Vec<String> = report
                .failed
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            tracing::warn!(run_id = %report.run_id, ?failed, "some batches failed to process");
        }
        self.observer.run_finished(&report);
        Ok(report)
    }

    /// Runs one unit to a terminal state. Errors are recorded on the unit.
    pub async fn process_unit(&self, unit: &mut WorkUnit) {
        self.observer.unit_started(unit);

        match self.drive(unit).await {
            Ok(()) => {
                tracing::info!(unit = unit.index, job_id = ?unit.job_id, "batch succeeded");
            }
            Err(err) => {
                tracing::error!(
                    unit = unit.index,
                    path = %unit.path.display(),
                    error = %err,
                    "failed to process batch"
                );
                match &err {
                    BatchError::Api(api) if api.is_client_error() => tracing::warn!(
                        unit = unit.index,
                        "request rejected by the API; check the API key and the chunk contents"
                    ),
                    BatchError::Api(api) if api.is_server_error() => tracing::warn!(
                        unit = unit.index,
                        "the API reported a server error; the chunk is kept for resubmission"
                    ),
                    _ => {}
                }
                if !unit.state.is_terminal()
                    && let Err(e) = self.advance(unit, UnitEvent::Failed(err.to_string()))
                {
                    tracing::warn!(unit = unit.index, error = %e, "could not mark unit failed");
                }
            }
        }

        self.observer.unit_finished(unit);
    }

    async fn drive(&self, unit: &mut WorkUnit) -> Result<(), BatchError> {
        let content = tokio::fs::read(&unit.path)
            .await
            .map_err(|e| BatchError::io(&unit.path, e))?;

        let file_id = self.client.upload(&unit.file_name(), content).await?;
        self.advance(unit, UnitEvent::Uploaded(file_id.clone()))?;

        let job_id = self.client.submit(&file_id, &self.settings.submit).await?;
        self.advance(unit, UnitEvent::Submitted(job_id.clone()))?;

        self.advance(unit, UnitEvent::PollingStarted)?;
        let snapshot = self.wait_for_terminal(unit, &job_id).await?;

        if !snapshot.status.is_success() {
            return Err(BatchError::JobTerminal {
                job_id,
                status: snapshot.status,
            });
        }
        let result = snapshot
            .result
            .ok_or_else(|| BatchError::MissingOutput {
                job_id: job_id.clone(),
            })?;

        let output = self.settings.result_path(&job_id)?;
        let bytes = self.client.fetch(&result).await?;
        tokio::fs::write(&output, bytes)
            .await
            .map_err(|e| BatchError::io(&output, e))?;
        tracing::info!(job_id = %job_id, path = %output.display(), "downloaded results");

        unit.result_path = Some(output);
        self.advance(unit, UnitEvent::Succeeded)?;
        Ok(())
    }

    /// Polls until the job reaches a terminal status, sleeping the fixed interval
    /// between polls.
    async fn wait_for_terminal(
        &self,
        unit: &WorkUnit,
        job_id: &str,
    ) -> Result<StatusSnapshot, BatchError> {
        let mut polls = 0u32;
        loop {
            let snapshot = self.client.poll(job_id).await?;
            polls += 1;
            self.observer.polled(unit, &snapshot, polls);

            if snapshot.status.is_terminal() {
                tracing::info!(job_id, status = %snapshot.status, polls, "batch reached terminal status");
                return Ok(snapshot);
            }
            if self.settings.max_polls.is_some_and(|max| polls >= max) {
                return Err(BatchError::PollLimit {
                    job_id: job_id.to_string(),
                    polls,
                });
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    fn advance(&self, unit: &mut WorkUnit, event: UnitEvent) -> Result<(), BatchError> {
        let from = unit.state;
        let to = StateMachine::advance(unit, event)?;
        tracing::debug!(unit = unit.index, %from, %to, "unit transition");
        self.observer.transition(unit, from, to);
        Ok(())
    }

    /// Releases the API client and its connection pool.
    pub fn close(self) {
        tracing::debug!("closing batch API client");
        drop(self.client);
    }
}
