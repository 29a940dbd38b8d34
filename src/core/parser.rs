//! KL-002: YAML parsing and validation.
//!
//! Parses kiln.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - At least one step
//! - Every step names a known provider that serves its kind
//! - Targets are non-empty, unique within a step and shell-safe identifiers

use super::error::KilnError;
use super::types::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// Package, component and runtime identifiers. Covers `pkg=1.2`,
/// `pkg=1.0~rc1`, `@scope/pkg@1` and `rust-src`; nothing a shell would
/// interpret.
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9@][A-Za-z0-9+._@/:=~-]*$").expect("static regex")
});

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a kiln.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<KilnConfig, KilnError> {
    let content = std::fs::read_to_string(path).map_err(|e| KilnError::io(path, e))?;
    parse_config(&content)
}

/// Parse a kiln.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<KilnConfig, KilnError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| KilnError::Config(format!("YAML parse error: {}", e)))
}

/// Parse and validate in one go.
pub fn load_config(path: &Path) -> Result<KilnConfig, KilnError> {
    let config = parse_config_file(path)?;
    let errors = validate_config(&config);
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(KilnError::Validation(errors))
    }
}

/// Whether a target identifier is acceptable.
pub fn is_valid_target(target: &str) -> bool {
    TARGET_RE.is_match(target)
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &KilnConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    if config.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    if config.steps.is_empty() {
        errors.push(ValidationError {
            message: "at least one step is required".to_string(),
        });
    }

    let mut labels = HashSet::new();
    for (index, step) in config.steps.iter().enumerate() {
        let label = step.label(index);
        if !labels.insert(label.clone()) {
            errors.push(ValidationError {
                message: format!("duplicate step name '{}'", label),
            });
        }
        errors.extend(validate_step(&label, step));
    }

    errors
}

fn validate_step(label: &str, step: &ProvisioningStep) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match step.source_ref.parse::<ProviderKind>() {
        Ok(provider) if provider.step_kind() != step.kind => errors.push(ValidationError {
            message: format!(
                "step '{}' ({}) cannot use provider '{}' (serves {})",
                label,
                step.kind,
                provider,
                provider.step_kind()
            ),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError {
            message: format!("step '{}': {}", label, e),
        }),
    }

    if step.targets.is_empty() {
        errors.push(ValidationError {
            message: format!("step '{}' has no targets", label),
        });
    }

    let mut seen = HashSet::new();
    for target in &step.targets {
        if !is_valid_target(target) {
            errors.push(ValidationError {
                message: format!("step '{}' has invalid target '{}'", label, target),
            });
        }
        if !seen.insert(target.as_str()) {
            errors.push(ValidationError {
                message: format!("step '{}' lists '{}' twice", label, target),
            });
        }
    }

    errors
}
