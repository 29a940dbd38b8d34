//! KL-001: Manifest, lock and provenance types.
//!
//! Defines the YAML schema for the provisioning manifest, the lock file
//! written after a run, and the JSONL provenance events. All types derive
//! Serialize/Deserialize for YAML roundtripping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Top-level kiln.yaml
// ============================================================================

/// Root configuration — the ordered steps that provision an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KilnConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable image/environment name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Target environment
    #[serde(default)]
    pub environment: EnvironmentSpec,

    /// Provisioning steps (order-significant)
    #[serde(default)]
    pub steps: Vec<ProvisioningStep>,

    /// Execution policy
    #[serde(default)]
    pub policy: Policy,
}

/// Where the steps are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Filesystem root. `/` runs locally, anything else through chroot.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for EnvironmentSpec {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

// ============================================================================
// Steps
// ============================================================================

/// A single declarative provisioning action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStep {
    /// Optional label used in logs, errors and the lock file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// What kind of action this is
    pub kind: StepKind,

    /// Provider that performs the install (apt, apk, rustup, npm, bun, cargo)
    #[serde(rename = "provider")]
    pub source_ref: String,

    /// Packages / components, in authored order
    #[serde(default)]
    pub targets: Vec<String>,
}

impl ProvisioningStep {
    pub fn new(kind: StepKind, source_ref: &str, targets: &[&str]) -> Self {
        Self {
            name: None,
            kind,
            source_ref: source_ref.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Label for the step at `index` — its name, or `<index>-<kind>`.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{}-{}", index, self.kind),
        }
    }
}

/// Step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    BulkInstall,
    ComponentAdd,
    RuntimeInstall,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BulkInstall => write!(f, "bulk_install"),
            Self::ComponentAdd => write!(f, "component_add"),
            Self::RuntimeInstall => write!(f, "runtime_install"),
        }
    }
}

/// Known providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Apt,
    Apk,
    Rustup,
    Npm,
    Bun,
    Cargo,
}

impl ProviderKind {
    /// The step kind this provider serves.
    pub fn step_kind(self) -> StepKind {
        match self {
            Self::Apt | Self::Apk => StepKind::BulkInstall,
            Self::Rustup => StepKind::ComponentAdd,
            Self::Npm | Self::Bun | Self::Cargo => StepKind::RuntimeInstall,
        }
    }

    pub fn all() -> [ProviderKind; 6] {
        [
            Self::Apt,
            Self::Apk,
            Self::Rustup,
            Self::Npm,
            Self::Bun,
            Self::Cargo,
        ]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Apk => write!(f, "apk"),
            Self::Rustup => write!(f, "rustup"),
            Self::Npm => write!(f, "npm"),
            Self::Bun => write!(f, "bun"),
            Self::Cargo => write!(f, "cargo"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Purge bulk-install index caches once after a successful run
    #[serde(default = "default_true")]
    pub cleanup_index_cache: bool,

    /// Check every target is present after each step
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Write the JSONL provenance log
    #[serde(default = "default_true")]
    pub tripwire: bool,

    /// Write the lock file after the run
    #[serde(default = "default_true")]
    pub lock_file: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            cleanup_index_cache: true,
            verify: true,
            tripwire: true,
            lock_file: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Lock file
// ============================================================================

/// Record of the last run against an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLock {
    /// Schema version
    pub schema: String,

    /// Manifest name
    pub name: String,

    /// Environment root the run was applied to
    pub root: PathBuf,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// Whether the index-cache purge ran
    #[serde(default)]
    pub index_cache_purged: bool,

    /// Per-step records, keyed by step label in execution order
    pub steps: IndexMap<String, StepLock>,
}

/// Per-step lock entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLock {
    pub kind: StepKind,
    pub provider: String,
    pub targets: Vec<String>,
    pub status: StepStatus,

    /// BLAKE3 of the step definition
    pub hash: String,

    #[serde(default)]
    pub applied_at: Option<String>,

    #[serde(default)]
    pub duration_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Step outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    RunStarted {
        name: String,
        run_id: String,
        steps: usize,
        kiln_version: String,
    },
    StepStarted {
        step: String,
        kind: StepKind,
        provider: String,
    },
    StepCompleted {
        step: String,
        duration_seconds: f64,
        hash: String,
    },
    StepFailed {
        step: String,
        error: String,
    },
    CleanupCompleted {
        providers: Vec<String>,
    },
    CleanupFailed {
        provider: String,
        error: String,
    },
    RunCompleted {
        run_id: String,
        steps_completed: usize,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Run report
// ============================================================================

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps_completed: usize,
    pub purged: Vec<ProviderKind>,
    pub total_duration: std::time::Duration,
}
