//! KL-003: Provisioner — the ordered, fail-fast run loop.
//!
//! for each step: dispatch to provider → verify targets → journal.
//! The first failure stops the run; nothing after it executes and nothing
//! before it is undone. After every step succeeds, the index cache of each
//! bulk-install provider used is purged once.

use super::error::{ProvisioningError, StepFailure, StepRef};
use super::journal::Journal;
use super::types::*;
use crate::providers::{ProviderFailure, Providers};
use crate::tripwire::eventlog;
use std::time::Instant;
use tracing::{info, info_span, warn};

/// Applies provisioning steps through a set of providers.
pub struct Provisioner<P> {
    providers: P,
    policy: Policy,
    journal: Option<Journal>,
}

impl<P: Providers> Provisioner<P> {
    pub fn new(providers: P) -> Self {
        Self {
            providers,
            policy: Policy::default(),
            journal: None,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn providers(&self) -> &P {
        &self.providers
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    pub fn into_providers(self) -> P {
        self.providers
    }

    /// Execute `steps` in order.
    pub fn run(&mut self, steps: &[ProvisioningStep]) -> Result<RunReport, ProvisioningError> {
        if steps.is_empty() {
            return Err(ProvisioningError::EmptyPlan);
        }

        let start = Instant::now();
        let run_id = eventlog::generate_run_id();
        let _span = info_span!("run", %run_id).entered();
        info!(steps = steps.len(), "provisioning started");
        if let Some(j) = &self.journal {
            j.run_started(&run_id, steps.len());
        }

        let mut bulk_providers: Vec<ProviderKind> = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            let label = step.label(index);
            info!(
                step = %label,
                kind = %step.kind,
                provider = %step.source_ref,
                targets = ?step.targets,
                "step started"
            );
            if let Some(j) = &self.journal {
                j.step_started(&label, step);
            }

            let step_start = Instant::now();
            let outcome = self.apply_step(step);
            let duration = step_start.elapsed().as_secs_f64();

            match outcome {
                Ok(provider) => {
                    info!(step = %label, duration_seconds = duration, "step completed");
                    if let Some(j) = &mut self.journal {
                        j.step_completed(&label, step, duration);
                    }
                    if step.kind == StepKind::BulkInstall && !bulk_providers.contains(&provider) {
                        bulk_providers.push(provider);
                    }
                }
                Err(cause) => {
                    warn!(step = %label, error = %cause, "step failed, halting");
                    if let Some(j) = &mut self.journal {
                        j.step_failed(&label, step, duration, &cause.to_string());
                        j.finish();
                    }
                    return Err(ProvisioningError::Step {
                        step: StepRef {
                            index,
                            label,
                            kind: step.kind,
                            provider: step.source_ref.clone(),
                        },
                        cause,
                    });
                }
            }
        }

        let purged = self.cleanup(&bulk_providers)?;

        let total = start.elapsed();
        info!(steps = steps.len(), total_seconds = total.as_secs_f64(), "provisioning complete");
        if let Some(j) = &mut self.journal {
            j.run_completed(&run_id, steps.len(), total.as_secs_f64());
            j.finish();
        }

        Ok(RunReport {
            steps_completed: steps.len(),
            purged,
            total_duration: total,
        })
    }

    /// Run one step; returns the provider that served it.
    fn apply_step(&mut self, step: &ProvisioningStep) -> Result<ProviderKind, StepFailure> {
        let unsupported = || StepFailure::UnsupportedProvider {
            provider: step.source_ref.clone(),
            kind: step.kind,
        };
        let provider: ProviderKind = step.source_ref.parse().map_err(|_| unsupported())?;
        if provider.step_kind() != step.kind {
            return Err(unsupported());
        }

        let install_failure = |f: ProviderFailure| {
            StepFailure::install(step.kind, blame(&f, &step.targets), f.to_string())
        };

        match step.kind {
            StepKind::BulkInstall => {
                self.providers
                    .refresh_index(provider)
                    .map_err(|f| StepFailure::IndexRefreshFailure {
                        detail: f.to_string(),
                    })?;
                self.providers
                    .install_bulk(provider, &step.targets)
                    .map_err(install_failure)?;
            }
            StepKind::ComponentAdd => {
                self.providers
                    .add_components(provider, &step.targets)
                    .map_err(install_failure)?;
            }
            StepKind::RuntimeInstall => {
                for target in &step.targets {
                    self.providers
                        .install_runtime(provider, target)
                        .map_err(|f| {
                            StepFailure::install(step.kind, vec![target.clone()], f.to_string())
                        })?;
                }
            }
        }

        if self.policy.verify {
            let missing = self
                .providers
                .missing_targets(provider, &step.targets)
                .map_err(|f| {
                    StepFailure::install(
                        step.kind,
                        step.targets.clone(),
                        format!("presence check failed: {}", f),
                    )
                })?;
            if !missing.is_empty() {
                return Err(StepFailure::install(
                    step.kind,
                    missing,
                    "not present after install".to_string(),
                ));
            }
        }

        Ok(provider)
    }

    /// Purge each bulk provider's index cache once.
    fn cleanup(
        &mut self,
        bulk_providers: &[ProviderKind],
    ) -> Result<Vec<ProviderKind>, ProvisioningError> {
        if !self.policy.cleanup_index_cache || bulk_providers.is_empty() {
            return Ok(Vec::new());
        }

        for &provider in bulk_providers {
            info!(%provider, "purging package index cache");
            if let Err(f) = self.providers.purge_index_cache(provider) {
                warn!(%provider, error = %f, "index cache purge failed");
                if let Some(j) = &mut self.journal {
                    j.cleanup_failed(provider, &f.to_string());
                    j.finish();
                }
                return Err(ProvisioningError::CleanupFailure {
                    provider,
                    detail: f.to_string(),
                });
            }
        }

        if let Some(j) = &mut self.journal {
            j.cleanup_completed(bulk_providers);
        }
        Ok(bulk_providers.to_vec())
    }
}

/// Targets a failure is attributed to; the whole step when the provider
/// could not say.
fn blame(failure: &ProviderFailure, step_targets: &[String]) -> Vec<String> {
    if failure.targets.is_empty() {
        step_targets.to_vec()
    } else {
        failure.targets.clone()
    }
}
