//! KL-017: Run journal — lock entries and provenance events for one run.
//!
//! Journal writes never fail a run; an unwritable state directory is logged
//! and the run carries on.

use super::state;
use super::types::*;
use crate::tripwire::{eventlog, hasher};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct Journal {
    state_dir: PathBuf,
    tripwire: bool,
    lock_file: bool,
    lock: RunLock,
}

impl Journal {
    pub fn new(state_dir: &Path, name: &str, root: &Path, policy: &Policy) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            tripwire: policy.tripwire,
            lock_file: policy.lock_file,
            lock: state::new_lock(name, root),
        }
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    fn log(&self, event: ProvenanceEvent) {
        if !self.tripwire {
            return;
        }
        if let Err(e) = eventlog::append_event(&self.state_dir, event) {
            warn!("event log write failed: {}", e);
        }
    }

    pub fn run_started(&self, run_id: &str, steps: usize) {
        self.log(ProvenanceEvent::RunStarted {
            name: self.lock.name.clone(),
            run_id: run_id.to_string(),
            steps,
            kiln_version: env!("CARGO_PKG_VERSION").to_string(),
        });
    }

    pub fn step_started(&self, label: &str, step: &ProvisioningStep) {
        self.log(ProvenanceEvent::StepStarted {
            step: label.to_string(),
            kind: step.kind,
            provider: step.source_ref.clone(),
        });
    }

    pub fn step_completed(&mut self, label: &str, step: &ProvisioningStep, duration: f64) {
        let hash = hasher::hash_step(step);
        self.record(label, step, StepStatus::Completed, hash.clone(), duration, None);
        self.log(ProvenanceEvent::StepCompleted {
            step: label.to_string(),
            duration_seconds: duration,
            hash,
        });
    }

    pub fn step_failed(&mut self, label: &str, step: &ProvisioningStep, duration: f64, error: &str) {
        let hash = hasher::hash_step(step);
        self.record(
            label,
            step,
            StepStatus::Failed,
            hash,
            duration,
            Some(error.to_string()),
        );
        self.log(ProvenanceEvent::StepFailed {
            step: label.to_string(),
            error: error.to_string(),
        });
    }

    pub fn cleanup_completed(&mut self, providers: &[ProviderKind]) {
        self.lock.index_cache_purged = true;
        self.log(ProvenanceEvent::CleanupCompleted {
            providers: providers.iter().map(|p| p.to_string()).collect(),
        });
    }

    pub fn cleanup_failed(&self, provider: ProviderKind, error: &str) {
        self.log(ProvenanceEvent::CleanupFailed {
            provider: provider.to_string(),
            error: error.to_string(),
        });
    }

    pub fn run_completed(&self, run_id: &str, steps_completed: usize, total_seconds: f64) {
        self.log(ProvenanceEvent::RunCompleted {
            run_id: run_id.to_string(),
            steps_completed,
            total_seconds,
        });
    }

    /// Persist the lock, if enabled.
    pub fn finish(&mut self) {
        if !self.lock_file {
            return;
        }
        self.lock.generated_at = eventlog::now_iso8601();
        if let Err(e) = state::save_lock(&self.state_dir, &self.lock) {
            warn!("lock file write failed: {}", e);
        }
    }

    fn record(
        &mut self,
        label: &str,
        step: &ProvisioningStep,
        status: StepStatus,
        hash: String,
        duration: f64,
        error: Option<String>,
    ) {
        self.lock.steps.insert(
            label.to_string(),
            StepLock {
                kind: step.kind,
                provider: step.source_ref.clone(),
                targets: step.targets.clone(),
                status,
                hash,
                applied_at: Some(eventlog::now_iso8601()),
                duration_seconds: Some(duration),
                error,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> ProvisioningStep {
        ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg"])
    }

    #[test]
    fn test_kl017_completed_step_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = Journal::new(dir.path(), "img", Path::new("/"), &Policy::default());
        j.step_started("native", &step());
        j.step_completed("native", &step(), 0.25);
        j.finish();

        let lock = state::load_lock(dir.path()).unwrap().unwrap();
        let entry = &lock.steps["native"];
        assert_eq!(entry.status, StepStatus::Completed);
        assert!(entry.hash.starts_with("blake3:"));
        assert!(entry.error.is_none());

        let events = std::fs::read_to_string(eventlog::event_log_path(dir.path())).unwrap();
        assert!(events.contains("step_started"));
        assert!(events.contains("step_completed"));
    }

    #[test]
    fn test_kl017_failed_step_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = Journal::new(dir.path(), "img", Path::new("/"), &Policy::default());
        j.step_failed("native", &step(), 1.0, "exit code 100");
        assert_eq!(j.lock().steps["native"].status, StepStatus::Failed);
        assert_eq!(j.lock().steps["native"].error.as_deref(), Some("exit code 100"));
        let events = std::fs::read_to_string(eventlog::event_log_path(dir.path())).unwrap();
        assert!(events.contains("step_failed"));
    }

    #[test]
    fn test_kl017_disabled_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Policy {
            tripwire: false,
            lock_file: false,
            ..Policy::default()
        };
        let mut j = Journal::new(dir.path(), "img", Path::new("/"), &policy);
        j.run_started("r-1", 1);
        j.step_completed("native", &step(), 0.1);
        j.finish();
        assert!(!eventlog::event_log_path(dir.path()).exists());
        assert!(!state::lock_file_path(dir.path()).exists());
    }

    #[test]
    fn test_kl017_cleanup_marks_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = Journal::new(dir.path(), "img", Path::new("/"), &Policy::default());
        j.cleanup_completed(&[ProviderKind::Apt]);
        assert!(j.lock().index_cache_purged);
    }

    #[test]
    fn test_kl017_cleanup_failed_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = Journal::new(dir.path(), "img", Path::new("/"), &Policy::default());
        j.cleanup_failed(ProviderKind::Apk, "exit code 1: read-only");
        j.finish();
        assert!(!j.lock().index_cache_purged);
        let events = std::fs::read_to_string(eventlog::event_log_path(dir.path())).unwrap();
        let line = events.lines().last().unwrap();
        let parsed: TimestampedEvent = serde_json::from_str(line).unwrap();
        match parsed.event {
            ProvenanceEvent::CleanupFailed { provider, error } => {
                assert_eq!(provider, "apk");
                assert!(error.contains("read-only"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
