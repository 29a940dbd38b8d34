//! KL-007: Toolchain component manager (rustup).

use super::{quote, quoted_list};
use crate::core::types::ProviderKind;
use regex::Regex;
use std::sync::LazyLock;

static UNKNOWN_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"does not contain component '([^']+)'").expect("static regex")
});

/// Add components to the installed toolchain. rustup rejects unknown names.
pub fn install_script(provider: ProviderKind, targets: &[String]) -> Option<String> {
    match provider {
        ProviderKind::Rustup => Some(format!(
            "set -euo pipefail\nrustup component add {}",
            quoted_list(targets)
        )),
        _ => None,
    }
}

/// Installed components are listed with the host-triple suffix
/// (`clippy-x86_64-unknown-linux-gnu`) except for target-independent ones
/// (`rust-src`). Only those two spellings count, so `rustc` is not satisfied
/// by `rustc-dev-<triple>`.
pub fn check_script(provider: ProviderKind, targets: &[String]) -> Option<String> {
    if provider != ProviderKind::Rustup {
        return None;
    }
    let mut lines = vec![
        "INSTALLED=$(rustup component list --installed 2>/dev/null || true)".to_string(),
        "HOST=$(rustc -vV 2>/dev/null | sed -n 's/^host: //p' || true)".to_string(),
    ];
    for t in targets {
        let pattern = format!("{}\"$HOST\"{}", quote(&format!("^{}(-", escape_ere(t))), quote(")?$"));
        let label = quote(t);
        lines.push(format!(
            "if printf '%s\\n' \"$INSTALLED\" | grep -Eq {pattern}; then echo installed:{label}; else echo missing:{label}; fi"
        ));
    }
    Some(lines.join("\n"))
}

/// Components rustup refused, in the order reported.
pub fn rejected_names(provider: ProviderKind, stderr: &str) -> Vec<String> {
    if provider != ProviderKind::Rustup {
        return Vec::new();
    }
    UNKNOWN_COMPONENT
        .captures_iter(stderr)
        .map(|c| c[1].to_string())
        .collect()
}

/// Escape POSIX ERE metacharacters.
fn escape_ere(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ".+*?()[]{}|^$\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
