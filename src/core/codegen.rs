//! KL-005: Script generation — dispatch to provider script generators.
//!
//! Every provider produces:
//! - install: converge the targets
//! - check: print `installed:<t>` / `missing:<t>` per target
//!
//! Bulk-install providers add refresh (index update) and purge (cache removal).

use super::types::{ProviderKind, ProvisioningStep, StepKind};
use crate::providers::{runtime, system, toolchain};

/// Generate the index refresh script.
pub fn refresh_script(provider: ProviderKind) -> Result<String, String> {
    system::refresh_script(provider)
        .ok_or_else(|| format!("{} has no package index to refresh", provider))
}

/// Generate the single-transaction bulk install script.
pub fn bulk_install_script(provider: ProviderKind, targets: &[String]) -> Result<String, String> {
    system::install_script(provider, targets)
        .ok_or_else(|| format!("{} cannot bulk install", provider))
}

/// Generate the component add script.
pub fn component_add_script(provider: ProviderKind, targets: &[String]) -> Result<String, String> {
    toolchain::install_script(provider, targets)
        .ok_or_else(|| format!("{} cannot add toolchain components", provider))
}

/// Generate the global install script for one runtime package.
pub fn runtime_install_script(provider: ProviderKind, target: &str) -> Result<String, String> {
    runtime::install_script(provider, target)
        .ok_or_else(|| format!("{} cannot install runtime packages", provider))
}

/// Generate the presence check script.
pub fn check_script(provider: ProviderKind, targets: &[String]) -> Result<String, String> {
    let script = match provider.step_kind() {
        StepKind::BulkInstall => system::check_script(provider, targets),
        StepKind::ComponentAdd => toolchain::check_script(provider, targets),
        StepKind::RuntimeInstall => runtime::check_script(provider, targets),
    };
    script.ok_or_else(|| format!("no presence check for {}", provider))
}

/// Generate the index-cache purge script.
pub fn purge_script(provider: ProviderKind) -> Result<String, String> {
    system::purge_script(provider).ok_or_else(|| format!("{} has no index cache", provider))
}

/// Every script a step runs, in order, labelled by phase.
pub fn step_scripts(step: &ProvisioningStep) -> Result<Vec<(String, String)>, String> {
    let provider: ProviderKind = step.source_ref.parse()?;
    if provider.step_kind() != step.kind {
        return Err(format!("provider '{}' cannot perform {}", provider, step.kind));
    }

    let mut scripts = Vec::new();
    match step.kind {
        StepKind::BulkInstall => {
            scripts.push(("refresh".to_string(), refresh_script(provider)?));
            scripts.push((
                "install".to_string(),
                bulk_install_script(provider, &step.targets)?,
            ));
        }
        StepKind::ComponentAdd => {
            scripts.push((
                "install".to_string(),
                component_add_script(provider, &step.targets)?,
            ));
        }
        StepKind::RuntimeInstall => {
            for target in &step.targets {
                scripts.push((
                    format!("install {}", target),
                    runtime_install_script(provider, target)?,
                ));
            }
        }
    }
    Ok(scripts)
}
