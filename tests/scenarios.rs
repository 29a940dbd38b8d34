//! End-to-end provisioning runs against the in-memory environment.

use kiln::core::error::{ProvisioningError, StepFailure};
use kiln::core::journal::Journal;
use kiln::core::parser;
use kiln::core::provisioner::Provisioner;
use kiln::core::state;
use kiln::core::types::{Policy, ProviderKind, ProvisioningStep, StepKind, StepStatus};
use kiln::providers::memory::{Call, MemoryEnvironment};
use proptest::prelude::*;
use std::path::Path;

fn base_image() -> MemoryEnvironment {
    MemoryEnvironment::new()
        .with_catalogue(ProviderKind::Apt, &["ffmpeg", "cmake", "pkg-config"])
        .with_catalogue(ProviderKind::Rustup, &["clippy", "rustfmt"])
        .with_catalogue(ProviderKind::Npm, &["bun"])
}

fn capture_steps() -> Vec<ProvisioningStep> {
    vec![
        ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg", "cmake"]),
        ProvisioningStep::new(StepKind::ComponentAdd, "rustup", &["clippy", "rustfmt"]),
        ProvisioningStep::new(StepKind::RuntimeInstall, "npm", &["bun"]),
    ]
}

fn names(n: &[&str]) -> Vec<String> {
    n.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_kl100_full_sequence_in_order() {
    let mut p = Provisioner::new(base_image());
    let report = p.run(&capture_steps()).unwrap();
    assert_eq!(report.steps_completed, 3);
    assert_eq!(report.purged, vec![ProviderKind::Apt]);

    let env = p.into_providers();
    let mutating: Vec<&Call> = env
        .calls()
        .iter()
        .filter(|c| !matches!(c, Call::MissingTargets(..)))
        .collect();
    assert_eq!(
        mutating,
        vec![
            &Call::RefreshIndex(ProviderKind::Apt),
            &Call::InstallBulk(ProviderKind::Apt, names(&["ffmpeg", "cmake"])),
            &Call::AddComponents(ProviderKind::Rustup, names(&["clippy", "rustfmt"])),
            &Call::InstallRuntime(ProviderKind::Npm, "bun".to_string()),
            &Call::PurgeIndexCache(ProviderKind::Apt),
        ]
    );

    for (provider, name) in [
        (ProviderKind::Apt, "ffmpeg"),
        (ProviderKind::Apt, "cmake"),
        (ProviderKind::Rustup, "clippy"),
        (ProviderKind::Rustup, "rustfmt"),
        (ProviderKind::Npm, "bun"),
    ] {
        assert!(env.is_installed(provider, name), "{} missing", name);
    }
    assert!(!env.has_index_cache(ProviderKind::Apt));
}

#[test]
fn test_kl100_unknown_package_halts_run() {
    let steps = vec![
        ProvisioningStep::new(StepKind::BulkInstall, "apt", &["ffmpeg", "libdoesnotexist"]),
        ProvisioningStep::new(StepKind::ComponentAdd, "rustup", &["clippy"]),
        ProvisioningStep::new(StepKind::RuntimeInstall, "npm", &["bun"]),
    ];
    let mut p = Provisioner::new(base_image());
    let err = p.run(&steps).unwrap_err();

    let step = err.step().unwrap();
    assert_eq!(step.index, 0);
    assert_eq!(step.kind, StepKind::BulkInstall);
    match err.cause().unwrap() {
        StepFailure::PackageInstallFailure { targets, .. } => {
            assert_eq!(targets, &names(&["libdoesnotexist"]));
        }
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(err.to_string().contains("libdoesnotexist"));

    let env = p.into_providers();
    assert!(env.calls().iter().all(|c| !matches!(
        c,
        Call::AddComponents(..) | Call::InstallRuntime(..) | Call::PurgeIndexCache(..)
    )));
    assert!(!env.is_installed(ProviderKind::Apt, "ffmpeg"));
    assert!(!env.is_installed(ProviderKind::Rustup, "clippy"));
    assert!(!env.is_installed(ProviderKind::Npm, "bun"));
}

#[test]
fn test_kl100_second_run_changes_nothing() {
    let mut p = Provisioner::new(base_image());
    p.run(&capture_steps()).unwrap();
    let once = p.providers().snapshot();
    p.run(&capture_steps()).unwrap();
    assert_eq!(p.providers().snapshot(), once);

    let mut fresh = Provisioner::new(base_image());
    fresh.run(&capture_steps()).unwrap();
    assert_eq!(fresh.providers().snapshot(), once);
}

#[test]
fn test_kl100_failed_run_keeps_earlier_steps() {
    let steps = vec![
        ProvisioningStep::new(StepKind::BulkInstall, "apt", &["cmake"]),
        ProvisioningStep::new(StepKind::ComponentAdd, "rustup", &["miri"]),
        ProvisioningStep::new(StepKind::RuntimeInstall, "npm", &["bun"]),
    ];
    let mut p = Provisioner::new(base_image());
    let err = p.run(&steps).unwrap_err();
    assert!(matches!(
        err.cause(),
        Some(StepFailure::ComponentAddFailure { .. })
    ));

    let env = p.into_providers();
    assert!(env.is_installed(ProviderKind::Apt, "cmake"));
    // No cleanup after a failed run.
    assert!(env.has_index_cache(ProviderKind::Apt));
    assert!(!env.is_installed(ProviderKind::Npm, "bun"));
}

#[test]
fn test_kl100_index_refresh_failure() {
    let env = base_image().with_refresh_failure(ProviderKind::Apt);
    let mut p = Provisioner::new(env);
    let err = p.run(&capture_steps()).unwrap_err();
    assert!(matches!(
        err.cause(),
        Some(StepFailure::IndexRefreshFailure { .. })
    ));
    let env = p.into_providers();
    assert_eq!(env.calls(), &[Call::RefreshIndex(ProviderKind::Apt)]);
}

#[test]
fn test_kl100_empty_plan() {
    let mut p = Provisioner::new(base_image());
    assert!(matches!(p.run(&[]), Err(ProvisioningError::EmptyPlan)));
    assert!(p.providers().calls().is_empty());
}

#[test]
fn test_kl100_manifest_to_lock() {
    let config = parser::parse_config(
        r#"
version: "1.0"
name: capture-base
steps:
  - name: native
    kind: bulk_install
    provider: apt
    targets: [ffmpeg, cmake]
  - name: lint
    kind: component_add
    provider: rustup
    targets: [clippy, rustfmt]
  - name: js
    kind: runtime_install
    provider: npm
    targets: [bun]
"#,
    )
    .unwrap();
    assert!(parser::validate_config(&config).is_empty());

    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path(), &config.name, Path::new("/"), &config.policy);
    let mut p = Provisioner::new(base_image())
        .with_policy(config.policy.clone())
        .with_journal(journal);
    p.run(&config.steps).unwrap();

    let lock = state::load_lock(dir.path()).unwrap().unwrap();
    assert_eq!(lock.name, "capture-base");
    assert!(lock.index_cache_purged);
    let labels: Vec<&str> = lock.steps.keys().map(|k| k.as_str()).collect();
    assert_eq!(labels, vec!["native", "lint", "js"]);
    assert!(lock
        .steps
        .values()
        .all(|s| s.status == StepStatus::Completed));
}

#[test]
fn test_kl100_no_cleanup_policy_keeps_cache() {
    let policy = Policy {
        cleanup_index_cache: false,
        ..Policy::default()
    };
    let mut p = Provisioner::new(base_image()).with_policy(policy);
    let report = p.run(&capture_steps()).unwrap();
    assert!(report.purged.is_empty());
    assert!(p.providers().has_index_cache(ProviderKind::Apt));
}

proptest! {
    /// A failing step at any position leaves every later step unexecuted.
    #[test]
    fn prop_kl100_fail_fast(fail_at in 0usize..5) {
        let mut steps: Vec<ProvisioningStep> = (0..5)
            .map(|i| {
                let name = if i % 2 == 0 { "cmake" } else { "ffmpeg" };
                ProvisioningStep::new(StepKind::BulkInstall, "apt", &[name])
            })
            .collect();
        steps[fail_at] = ProvisioningStep::new(StepKind::BulkInstall, "apt", &["libnope"]);

        let mut p = Provisioner::new(base_image());
        let err = p.run(&steps).unwrap_err();
        prop_assert_eq!(err.step().unwrap().index, fail_at);

        let installs = p
            .providers()
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::InstallBulk(..)))
            .count();
        prop_assert_eq!(installs, fail_at + 1);
    }

    /// Re-running any successful plan is a no-op on observable state.
    #[test]
    fn prop_kl100_rerun_is_stable(
        apt in proptest::sample::subsequence(vec!["ffmpeg", "cmake", "pkg-config"], 1..=3),
        components in proptest::sample::subsequence(vec!["clippy", "rustfmt"], 1..=2),
    ) {
        let steps = vec![
            ProvisioningStep::new(StepKind::BulkInstall, "apt", &apt),
            ProvisioningStep::new(StepKind::ComponentAdd, "rustup", &components),
        ];
        let mut p = Provisioner::new(base_image());
        p.run(&steps).unwrap();
        let once = p.providers().snapshot();
        p.run(&steps).unwrap();
        prop_assert_eq!(p.providers().snapshot(), once);
    }
}
