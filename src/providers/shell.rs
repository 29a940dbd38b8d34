//! KL-009: Shell providers — generated bash executed in the environment.

use super::{parse_missing, rejected_targets, ProviderFailure, Providers};
use crate::core::codegen;
use crate::core::types::ProviderKind;
use crate::transport::Environment;
use tracing::debug;

/// Production adapter: every call spawns one bash process in the environment.
#[derive(Debug, Clone)]
pub struct ShellProviders {
    env: Environment,
}

impl ShellProviders {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Run a generated script, turning codegen errors, transport errors and
    /// non-zero exits into failures.
    fn run(&self, phase: &str, script: Result<String, String>) -> Result<String, ProviderFailure> {
        let script = script.map_err(|e| ProviderFailure::new(-1, e))?;
        debug!(phase, root = %self.env.root().display(), "executing:\n{}", script);

        let out = self
            .env
            .exec(&script)
            .map_err(|e| ProviderFailure::new(-1, format!("transport error: {}", e)))?;

        if out.success() {
            Ok(out.stdout)
        } else {
            Err(ProviderFailure::new(out.exit_code, out.stderr.trim()))
        }
    }

    /// Attach the offending targets to an install failure: names rejected in
    /// stderr first, then absent targets, then all of them.
    fn attribute(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
        failure: ProviderFailure,
    ) -> ProviderFailure {
        let rejected = rejected_targets(provider, targets, &failure.stderr);
        if !rejected.is_empty() {
            return failure.with_targets(rejected);
        }
        match self.missing_targets(provider, targets) {
            Ok(missing) if !missing.is_empty() => failure.with_targets(missing),
            _ => failure.with_targets(targets.to_vec()),
        }
    }
}

impl Providers for ShellProviders {
    fn refresh_index(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure> {
        self.run("refresh", codegen::refresh_script(provider))
            .map(|_| ())
    }

    fn install_bulk(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure> {
        match self.run("install", codegen::bulk_install_script(provider, targets)) {
            Ok(_) => Ok(()),
            Err(f) => Err(self.attribute(provider, targets, f)),
        }
    }

    fn add_components(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<(), ProviderFailure> {
        match self.run("install", codegen::component_add_script(provider, targets)) {
            Ok(_) => Ok(()),
            Err(f) => Err(self.attribute(provider, targets, f)),
        }
    }

    fn install_runtime(
        &mut self,
        provider: ProviderKind,
        target: &str,
    ) -> Result<(), ProviderFailure> {
        self.run("install", codegen::runtime_install_script(provider, target))
            .map(|_| ())
            .map_err(|f| f.with_targets(vec![target.to_string()]))
    }

    fn missing_targets(
        &mut self,
        provider: ProviderKind,
        targets: &[String],
    ) -> Result<Vec<String>, ProviderFailure> {
        let stdout = self.run("check", codegen::check_script(provider, targets))?;
        Ok(parse_missing(&stdout))
    }

    fn purge_index_cache(&mut self, provider: ProviderKind) -> Result<(), ProviderFailure> {
        self.run("purge", codegen::purge_script(provider)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run real bash but only through scripts that do not depend on
    // any package manager being installed.

    #[test]
    fn test_kl009_codegen_error_is_failure() {
        let mut p = ShellProviders::new(Environment::local());
        let err = p.refresh_index(ProviderKind::Npm).unwrap_err();
        assert_eq!(err.exit_code, -1);
        assert!(err.stderr.contains("no package index"));
    }

    #[test]
    fn test_kl009_run_success_returns_stdout() {
        let p = ShellProviders::new(Environment::local());
        let out = p.run("check", Ok("echo missing:x".to_string())).unwrap();
        assert_eq!(parse_missing(&out), vec!["x"]);
    }

    #[test]
    fn test_kl009_run_nonzero_exit() {
        let p = ShellProviders::new(Environment::local());
        let err = p
            .run("check", Ok("echo boom >&2; exit 3".to_string()))
            .unwrap_err();
        assert_eq!(err.exit_code, 3);
        assert_eq!(err.stderr, "boom");
    }

    #[test]
    fn test_kl009_environment_accessor() {
        let p = ShellProviders::new(Environment::new("/mnt/rootfs"));
        assert_eq!(p.environment().root(), std::path::Path::new("/mnt/rootfs"));
    }
}
