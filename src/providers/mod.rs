//! Providers — the capability interface the provisioner drives.
//!
//! Each provider call is a blocking operation against the target
//! environment. Two implementations:
//! 1. [`shell::ShellProviders`] generates bash and executes it
//!    through the transport layer
//! 2. [`memory::MemoryEnvironment`] keeps the environment in memory

pub mod memory;
pub mod runtime;
pub mod shell;
pub mod system;
pub mod toolchain;

use crate::core::types::{ProviderKind, StepKind};
use thiserror::Error;

/// A provider invocation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exit code {exit_code}: {stderr}")]
pub struct ProviderFailure {
    pub exit_code: i32,
    pub stderr: String,
    /// Targets the provider could not satisfy, when known
    pub targets: Vec<String>,
}

impl ProviderFailure {
    pub fn new(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            targets: Vec::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// Operations a provisioning run needs from its environment.
pub trait Providers {
    /// Refresh the package index of a bulk-install provider.
    fn refresh_index(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure>;

    /// Install every target in one transaction.
    fn install_bulk(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure>;

    /// Add components to the existing toolchain.
    fn add_components(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure>;

    /// Install one package into the runtime's global space.
    fn install_runtime(&mut self, provider: ProviderKind, target: &str)
        -> Result<(), ProviderFailure>;

    /// Targets that are not present, in the order given.
    fn missing_targets(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<Vec<String>, ProviderFailure>;

    /// Delete the provider's local package-index cache.
    fn purge_index_cache(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure>;
}

/// Single-quote for bash.
pub(crate) fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub(crate) fn quoted_list(items: &[String]) -> String {
    items.iter().map(|i| quote(i)).collect::<Vec<_>>().join(" ")
}

/// Strip a version suffix (`pkg=1.2`, `@scope/pkg@1.2`). A leading separator
/// is part of the name.
pub(crate) fn bare_name(target: &str, version_sep: char) -> &str {
    match target.rfind(version_sep) {
        Some(i) if i > 0 => &target[..i],
        _ => target,
    }
}

/// Separator between a target's name and its pinned version.
pub(crate) fn version_sep(provider: ProviderKind) -> char {
    match provider.step_kind() {
        StepKind::BulkInstall => '=',
        StepKind::ComponentAdd | StepKind::RuntimeInstall => '@',
    }
}

/// Targets the provider's error output names as unknown, in step order.
/// Empty when the output names none of them.
pub fn rejected_targets(provider: ProviderKind, targets: &[String], stderr: &str) -> Vec<String> {
    let names = match provider.step_kind() {
        StepKind::BulkInstall => system::rejected_names(provider, stderr),
        StepKind::ComponentAdd => toolchain::rejected_names(provider, stderr),
        StepKind::RuntimeInstall => return Vec::new(),
    };
    let sep = version_sep(provider);
    targets
        .iter()
        .filter(|t| names.iter().any(|n| n == *t || n == bare_name(t, sep)))
        .cloned()
        .collect()
}

/// Collect `missing:<t>` lines from check-script output.
pub fn parse_missing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.trim().strip_prefix("missing:"))
        .map(|t| t.to_string())
        .collect()
}
