//! KL-014: BLAKE3 hashing of step definitions.

use crate::core::types::ProvisioningStep;

/// Hash what a step does: kind, provider and targets in order. The name is
/// a label only and is excluded. Returns `"blake3:{hex}"`.
pub fn hash_step(step: &ProvisioningStep) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(step.kind.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(step.source_ref.as_bytes());
    for target in &step.targets {
        hasher.update(b"\0");
        hasher.update(target.as_bytes());
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StepKind;

    #[test]
    fn test_kl014_hash_step_format() {
        let step = ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg"]);
        let h = hash_step(&step);
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), "blake3:".len() + 64);
        assert_eq!(h, hash_step(&step.clone()));
    }

    #[test]
    fn test_kl014_hash_step_ignores_name() {
        let a = ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg", "cmake"]);
        let mut b = a.clone();
        b.name = Some("native".to_string());
        assert_eq!(hash_step(&a), hash_step(&b));
    }

    #[test]
    fn test_kl014_hash_step_order_sensitive() {
        let a = ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg", "cmake"]);
        let b = ProvisioningStep::new(StepKind::BulkInstall, "apt", &["cmake", "ffmpeg"]);
        assert_ne!(hash_step(&a), hash_step(&b));
    }

    #[test]
    fn test_kl014_hash_step_no_concat_collision() {
        let a = ProvisioningStep::new(StepKind::RuntimeInstall, "npm", &["ab", "c"]);
        let b = ProvisioningStep::new(StepKind::RuntimeInstall, "npm", &["a", "bc"]);
        assert_ne!(hash_step(&a), hash_step(&b));
    }
}
