//! KL-016: Verification — every target of every step still present.

use crate::core::error::{ProvisioningError, StepFailure, StepRef};
use crate::core::types::{ProviderKind, ProvisioningStep};
use crate::providers::Providers;

/// A target that is not present in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTarget {
    pub step: String,
    pub provider: ProviderKind,
    pub target: String,
}

/// Query the presence of every step's targets. Does not install anything.
pub fn verify_steps<P: Providers>(
    providers: &mut P,
    steps: &[ProvisioningStep],
) -> Result<Vec<MissingTarget>, ProvisioningError> {
    let mut findings = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let label = step.label(index);
        let step_ref = || StepRef {
            index,
            label: label.clone(),
            kind: step.kind,
            provider: step.source_ref.clone(),
        };

        let provider: ProviderKind = step.source_ref.parse().map_err(|_| ProvisioningError::Step {
            step: step_ref(),
            cause: StepFailure::UnsupportedProvider {
                provider: step.source_ref.clone(),
                kind: step.kind,
            },
        })?;

        let missing = providers
            .missing_targets(provider, &step.targets)
            .map_err(|f| ProvisioningError::Step {
                step: step_ref(),
                cause: StepFailure::install(
                    step.kind,
                    step.targets.clone(),
                    format!("presence check failed: {}", f),
                ),
            })?;

        findings.extend(missing.into_iter().map(|target| MissingTarget {
            step: label.clone(),
            provider,
            target,
        }));
    }

    Ok(findings)
}
