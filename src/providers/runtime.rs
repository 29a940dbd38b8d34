//! KL-008: Global runtime installers (npm, bun, cargo).
//!
//! Each target is installed separately and only when absent.

use super::{bare_name, quote};
use crate::core::types::ProviderKind;

fn presence_test(provider: ProviderKind, target: &str) -> Option<String> {
    let name = bare_name(target, '@');
    match provider {
        ProviderKind::Npm => Some(format!(
            "npm ls -g --depth=0 {} >/dev/null 2>&1",
            quote(name)
        )),
        ProviderKind::Bun => Some(format!(
            "bun pm ls -g 2>/dev/null | grep -Fq {}",
            quote(&format!(" {}@", name))
        )),
        ProviderKind::Cargo => Some(format!(
            "cargo install --list 2>/dev/null | grep -q {}",
            quote(&format!("^{} v", name))
        )),
        _ => None,
    }
}

fn install_command(provider: ProviderKind, target: &str) -> Option<String> {
    let t = quote(target);
    match provider {
        ProviderKind::Npm => Some(format!("npm install -g {t}")),
        ProviderKind::Bun => Some(format!("bun add -g {t}")),
        ProviderKind::Cargo => Some(format!("cargo install --locked {t}")),
        _ => None,
    }
}

/// Install one target into the runtime's global package space.
pub fn install_script(provider: ProviderKind, target: &str) -> Option<String> {
    let test = presence_test(provider, target)?;
    let install = install_command(provider, target)?;
    Some(format!(
        "set -euo pipefail\nif ! {test}; then\n  {install}\nfi"
    ))
}

/// Print `installed:<t>` or `missing:<t>` per target.
pub fn check_script(provider: ProviderKind, targets: &[String]) -> Option<String> {
    let lines: Option<Vec<String>> = targets
        .iter()
        .map(|t| {
            let test = presence_test(provider, t)?;
            let label = quote(t);
            Some(format!(
                "if {test}; then echo installed:{label}; else echo missing:{label}; fi"
            ))
        })
        .collect();
    lines.map(|l| l.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kl008_npm_install_guarded() {
        let script = install_script(ProviderKind::Npm, "bun").unwrap();
        assert!(script.contains("if ! npm ls -g --depth=0 'bun'"));
        assert!(script.contains("npm install -g 'bun'"));
    }

    #[test]
    fn test_kl008_npm_scoped_version() {
        let script = install_script(ProviderKind::Npm, "@biomejs/biome@1.9.0").unwrap();
        assert!(script.contains("npm ls -g --depth=0 '@biomejs/biome'"));
        assert!(script.contains("npm install -g '@biomejs/biome@1.9.0'"));
    }

    #[test]
    fn test_kl008_bun_install() {
        let script = install_script(ProviderKind::Bun, "prettier").unwrap();
        assert!(script.contains("bun add -g 'prettier'"));
        assert!(script.contains("grep -Fq ' prettier@'"));
    }

    #[test]
    fn test_kl008_cargo_install() {
        let script = install_script(ProviderKind::Cargo, "just@1.36.0").unwrap();
        assert!(script.contains("cargo install --locked 'just@1.36.0'"));
        assert!(script.contains("grep -q '^just v'"));
    }

    #[test]
    fn test_kl008_check_lists_every_target() {
        let targets = vec!["bun".to_string(), "pnpm".to_string()];
        let script = check_script(ProviderKind::Npm, &targets).unwrap();
        assert_eq!(script.lines().count(), 2);
        assert!(script.contains("missing:'pnpm'"));
    }

    #[test]
    fn test_kl008_wrong_provider() {
        assert!(install_script(ProviderKind::Apt, "bun").is_none());
        assert!(check_script(ProviderKind::Rustup, &["x".to_string()]).is_none());
    }
}
