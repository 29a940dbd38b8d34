//! KL-004: Error taxonomy.
//!
//! Every provisioning failure is fatal: the run stops and the error names the
//! step and provider that failed. Nothing is retried or rolled back here.

use super::parser::ValidationError;
use super::types::{ProviderKind, StepKind};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Identifies the step a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub index: usize,
    pub label: String,
    pub kind: StepKind,
    pub provider: String,
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} '{}' ({} via {})",
            self.index, self.label, self.kind, self.provider
        )
    }
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("package index refresh failed: {detail}")]
    IndexRefreshFailure { detail: String },

    #[error("package install failed for [{}]: {detail}", .targets.join(", "))]
    PackageInstallFailure { targets: Vec<String>, detail: String },

    #[error("component add failed for [{}]: {detail}", .targets.join(", "))]
    ComponentAddFailure { targets: Vec<String>, detail: String },

    #[error("runtime install failed for [{}]: {detail}", .targets.join(", "))]
    RuntimeInstallFailure { targets: Vec<String>, detail: String },

    #[error("provider '{provider}' cannot perform {kind}")]
    UnsupportedProvider { provider: String, kind: StepKind },
}

impl StepFailure {
    /// Targets the failure is attributed to (empty for refresh/provider errors).
    pub fn targets(&self) -> &[String] {
        match self {
            Self::PackageInstallFailure { targets, .. }
            | Self::ComponentAddFailure { targets, .. }
            | Self::RuntimeInstallFailure { targets, .. } => targets,
            Self::IndexRefreshFailure { .. } | Self::UnsupportedProvider { .. } => &[],
        }
    }

    /// The install failure variant matching a step kind.
    pub fn install(kind: StepKind, targets: Vec<String>, detail: String) -> Self {
        match kind {
            StepKind::BulkInstall => Self::PackageInstallFailure { targets, detail },
            StepKind::ComponentAdd => Self::ComponentAddFailure { targets, detail },
            StepKind::RuntimeInstall => Self::RuntimeInstallFailure { targets, detail },
        }
    }
}

/// Failure of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    #[error("no provisioning steps to run")]
    EmptyPlan,

    #[error("step {step} failed: {cause}")]
    Step {
        step: StepRef,
        #[source]
        cause: StepFailure,
    },

    #[error("index cache cleanup failed for {provider}: {detail}")]
    CleanupFailure {
        provider: ProviderKind,
        detail: String,
    },
}

impl ProvisioningError {
    /// The failing step, if the error belongs to one.
    pub fn step(&self) -> Option<&StepRef> {
        match self {
            Self::Step { step, .. } => Some(step),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&StepFailure> {
        match self {
            Self::Step { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum KilnError {
    #[error("{0}")]
    Config(String),

    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state error: {0}")]
    State(String),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("{0} target(s) missing")]
    Drift(usize),
}

impl KilnError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
