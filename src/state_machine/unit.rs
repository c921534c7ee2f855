use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::UnitState;

/// One chunk of input records processed as a single remote job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    /// 1-based position in the chunk sequence.
    pub index: usize,
    pub path: PathBuf,
    pub records: usize,
    pub state: UnitState,
    pub state_history: Vec<UnitState>,
    pub file_id: Option<String>,
    pub job_id: Option<String>,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl WorkUnit {
    pub fn new(index: usize, path: PathBuf, records: usize) -> Self {
        Self {
            index,
            path,
            records,
            state: UnitState::Pending,
            state_history: Vec::new(),
            file_id: None,
            job_id: None,
            result_path: None,
            error: None,
        }
    }

    /// File name used for the upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk_{}.jsonl", self.index))
    }
}

/// Per-unit entry of a [`RunReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub index: usize,
    pub source: PathBuf,
    pub records: usize,
    pub state: UnitState,
    pub state_transitions: Vec<UnitState>,
    pub job_id: Option<String>,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl UnitRecord {
    pub fn from_unit(unit: &WorkUnit) -> Self {
        let mut transitions = unit.state_history.clone();
        transitions.push(unit.state);
        Self {
            index: unit.index,
            source: unit.path.clone(),
            records: unit.records,
            state: unit.state,
            state_transitions: transitions,
            job_id: unit.job_id.clone(),
            result_path: unit.result_path.clone(),
            error: unit.error.clone(),
        }
    }
}

/// Structured summary produced at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub units: Vec<UnitRecord>,
    /// Source paths of units that did not succeed, in processing order.
    pub failed: Vec<PathBuf>,
    /// Chunk files removed after success.
    pub removed: Vec<PathBuf>,
    /// Chunk files that should have been removed but could not be.
    pub cleanup_failures: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            completed_at: started_at,
            duration_ms: 0,
            units: Vec::new(),
            failed: Vec::new(),
            removed: Vec::new(),
            cleanup_failures: Vec::new(),
        }
    }

    pub fn push(&mut self, unit: &WorkUnit) {
        if unit.state != UnitState::Succeeded {
            self.failed.push(unit.path.clone());
        }
        self.units.push(UnitRecord::from_unit(unit));
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = now;
        self.duration_ms = (now - self.started_at).num_milliseconds();
    }

    pub fn succeeded(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Succeeded)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_creation_defaults() {
        let unit = WorkUnit::new(2, PathBuf::from("/tmp/in.jsonl_chunk_2.jsonl"), 5);
        assert_eq!(unit.state, UnitState::Pending);
        assert!(unit.state_history.is_empty());
        assert!(unit.job_id.is_none());
        assert_eq!(unit.file_name(), "in.jsonl_chunk_2.jsonl");
    }

    #[test]
    fn record_from_unit_includes_current_state() {
        let mut unit = WorkUnit::new(1, PathBuf::from("a.jsonl"), 3);
        unit.state_history.push(UnitState::Pending);
        unit.state = UnitState::Failed;
        unit.error = Some("upload rejected".into());

        let record = UnitRecord::from_unit(&unit);
        assert_eq!(
            record.state_transitions,
            vec![UnitState::Pending, UnitState::Failed]
        );
        assert_eq!(record.error.as_deref(), Some("upload rejected"));
    }

    #[test]
    fn report_tracks_failed_sources() {
        let mut report = RunReport::new(Utc::now());
        let mut ok = WorkUnit::new(1, PathBuf::from("c1.jsonl"), 10);
        ok.state = UnitState::Succeeded;
        let mut bad = WorkUnit::new(2, PathBuf::from("c2.jsonl"), 10);
        bad.state = UnitState::Failed;

        report.push(&ok);
        report.push(&bad);
        report.finish();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed, vec![PathBuf::from("c2.jsonl")]);
        assert!(!report.is_success());
        assert!(report.duration_ms >= 0);
    }

    #[test]
    fn report_serialization_roundtrip() {
        let report = RunReport::new(Utc::now());
        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
    }
}
