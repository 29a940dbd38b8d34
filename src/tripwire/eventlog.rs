//! KL-015: Append-only JSONL provenance event log.

use crate::core::error::KilnError;
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// RFC 3339 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Derive the event log path within the state directory.
pub fn event_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join("events.jsonl")
}

/// Append an event to the log.
pub fn append_event(state_dir: &Path, event: ProvenanceEvent) -> Result<(), KilnError> {
    let path = event_log_path(state_dir);
    std::fs::create_dir_all(state_dir).map_err(|e| KilnError::io(state_dir, e))?;

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te)
        .map_err(|e| KilnError::State(format!("JSON serialize error: {}", e)))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| KilnError::io(&path, e))?;

    writeln!(file, "{}", json).map_err(|e| KilnError::io(&path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kl015_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
        assert_eq!(ts.len(), "2026-10-19T10:00:00Z".len());
    }

    #[test]
    fn test_kl015_generate_run_id() {
        let id = generate_run_id();
        assert!(id.starts_with("r-"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn test_kl015_event_log_path() {
        let p = event_log_path(Path::new("/state"));
        assert_eq!(p, PathBuf::from("/state/events.jsonl"));
    }

    #[test]
    fn test_kl015_append_event() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested");
        append_event(
            &state,
            ProvenanceEvent::RunStarted {
                name: "img".to_string(),
                run_id: "r-abc".to_string(),
                steps: 3,
                kiln_version: "0.4.0".to_string(),
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(state.join("events.jsonl")).unwrap();
        assert!(content.contains("\"event\":\"run_started\""));
        assert!(content.contains("r-abc"));
        assert!(content.contains("\"ts\":"));
    }

    #[test]
    fn test_kl015_append_multiple() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            append_event(
                dir.path(),
                ProvenanceEvent::StepCompleted {
                    step: format!("s{}", i),
                    duration_seconds: 1.0,
                    hash: "blake3:xxx".to_string(),
                },
            )
            .unwrap();
        }
        let content = std::fs::read_to_string(event_log_path(dir.path())).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
