//! KL-012: In-memory environment.
//!
//! Models a base image as sets of installed names per provider plus the
//! package-index cache. Only names in the provider's catalogue can be
//! installed; anything else fails the way an unknown package does.

use super::{bare_name, version_sep, ProviderFailure, Providers};
use crate::core::types::{ProviderKind, StepKind};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One recorded provider invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RefreshIndex(ProviderKind),
    InstallBulk(ProviderKind, Vec<String>),
    AddComponents(ProviderKind, Vec<String>),
    InstallRuntime(ProviderKind, String),
    MissingTargets(ProviderKind, Vec<String>),
    PurgeIndexCache(ProviderKind),
}

/// Observable state, for comparing runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub installed: BTreeMap<ProviderKind, BTreeSet<String>>,
    pub index_cache: BTreeSet<ProviderKind>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEnvironment {
    catalogue: BTreeMap<ProviderKind, BTreeSet<String>>,
    installed: BTreeMap<ProviderKind, BTreeSet<String>>,
    index_cache: BTreeSet<ProviderKind>,
    refresh_failures: HashSet<ProviderKind>,
    purge_failures: HashSet<ProviderKind>,
    calls: Vec<Call>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `names` installable through `provider`.
    pub fn with_catalogue(mut self, provider: ProviderKind, names: &[&str]) -> Self {
        self.catalogue
            .entry(provider)
            .or_default()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Make every index refresh of `provider` fail (e.g. no network).
    pub fn with_refresh_failure(mut self, provider: ProviderKind) -> Self {
        self.refresh_failures.insert(provider);
        self
    }

    /// Make every cache purge of `provider` fail; the cache stays in place.
    pub fn with_purge_failure(mut self, provider: ProviderKind) -> Self {
        self.purge_failures.insert(provider);
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_installed(&self, provider: ProviderKind, name: &str) -> bool {
        let bare = bare_name(name, version_sep(provider));
        self.installed
            .get(&provider)
            .is_some_and(|set| set.contains(bare))
    }

    pub fn has_index_cache(&self, provider: ProviderKind) -> bool {
        self.index_cache.contains(&provider)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            installed: self.installed.clone(),
            index_cache: self.index_cache.clone(),
        }
    }

    fn unknown(&self, provider: ProviderKind, targets: &[String]) -> Vec<String> {
        let sep = version_sep(provider);
        targets
            .iter()
            .filter(|t| {
                !self
                    .catalogue
                    .get(&provider)
                    .is_some_and(|c| c.contains(bare_name(t, sep)))
            })
            .cloned()
            .collect()
    }

    /// All-or-nothing install of catalogue names.
    fn install_all(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
        unknown_msg: &str,
    ) -> Result<(), ProviderFailure> {
        let unknown = self.unknown(provider, targets);
        if !unknown.is_empty() {
            return Err(ProviderFailure::new(
                100,
                format!("{}: {}", unknown_msg, unknown.join(", ")),
            )
            .with_targets(unknown));
        }
        let sep = version_sep(provider);
        let set = self.installed.entry(provider).or_default();
        set.extend(targets.iter().map(|t| bare_name(t, sep).to_string()));
        Ok(())
    }
}

impl Providers for MemoryEnvironment {
    fn refresh_index(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure> {
        self.calls.push(Call::RefreshIndex(provider));
        if provider.step_kind() != StepKind::BulkInstall {
            return Err(ProviderFailure::new(-1, format!("{} has no package index", provider)));
        }
        if self.refresh_failures.contains(&provider) {
            return Err(ProviderFailure::new(100, "temporary failure resolving mirror"));
        }
        self.index_cache.insert(provider);
        Ok(())
    }

    fn install_bulk(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure> {
        self.calls.push(Call::InstallBulk(provider, targets.to_vec()));
        if !self.index_cache.contains(&provider) {
            return Err(ProviderFailure::new(100, "package index is empty")
                .with_targets(targets.to_vec()));
        }
        self.install_all(provider, targets, "Unable to locate package")
    }

    fn add_components(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure> {
        self.calls.push(Call::AddComponents(provider, targets.to_vec()));
        self.install_all(provider, targets, "toolchain does not contain component")
    }

    fn install_runtime(
        &mut self,
        provider: ProviderKind,
        target: &str,
    ) -> Result<(), ProviderFailure> {
        self.calls
            .push(Call::InstallRuntime(provider, target.to_string()));
        self.install_all(provider, &[target.to_string()], "404 Not Found")
    }

    fn missing_targets(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<Vec<String>, ProviderFailure> {
        self.calls
            .push(Call::MissingTargets(provider, targets.to_vec()));
        Ok(targets
            .iter()
            .filter(|t| !self.is_installed(provider, t))
            .cloned()
            .collect())
    }

    fn purge_index_cache(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure> {
        self.calls.push(Call::PurgeIndexCache(provider));
        if self.purge_failures.contains(&provider) {
            return Err(ProviderFailure::new(1, "rm: cannot remove '/var/lib/apt/lists': Read-only file system"));
        }
        self.index_cache.remove(&provider);
        Ok(())
    }
}
