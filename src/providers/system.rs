//! KL-006: System package managers (apt, apk).
//!
//! Bulk installs run as one transaction after an explicit index refresh.
//! The index cache is purged separately, once per run.

use super::{bare_name, quote, quoted_list};
use crate::core::types::ProviderKind;
use regex::Regex;
use std::sync::LazyLock;

static APT_REJECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Unable to locate package (\S+)|Package '([^']+)' has no installation candidate|Version '[^']+' for '([^']+)' was not found",
    )
    .expect("static regex")
});

static APK_REJECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s:]+) \(no such package\)").expect("static regex"));

/// Refresh the package index.
pub fn refresh_script(provider: ProviderKind) -> Option<String> {
    match provider {
        ProviderKind::Apt => Some("set -euo pipefail\napt-get update -qq".to_string()),
        ProviderKind::Apk => Some("set -euo pipefail\napk update -q".to_string()),
        _ => None,
    }
}

/// Install every target in a single transaction.
pub fn install_script(provider: ProviderKind, targets: &[String]) -> Option<String> {
    let joined = quoted_list(targets);
    match provider {
        ProviderKind::Apt => Some(format!(
            "set -euo pipefail\n\
             export DEBIAN_FRONTEND=noninteractive\n\
             apt-get install -y -qq --no-install-recommends {joined}"
        )),
        ProviderKind::Apk => Some(format!("set -euo pipefail\napk add -q {joined}")),
        _ => None,
    }
}

/// Print `installed:<t>` or `missing:<t>` per target.
pub fn check_script(provider: ProviderKind, targets: &[String]) -> Option<String> {
    let presence = |t: &String| -> Option<String> {
        let name = quote(bare_name(t, '='));
        let test = match provider {
            ProviderKind::Apt => format!(
                "dpkg-query -W -f='${{Status}}' {name} 2>/dev/null | grep -q 'install ok installed'"
            ),
            ProviderKind::Apk => format!("apk info -e {name} >/dev/null 2>&1"),
            _ => return None,
        };
        let label = quote(t);
        Some(format!(
            "if {test}; then echo installed:{label}; else echo missing:{label}; fi"
        ))
    };
    let lines: Option<Vec<String>> = targets.iter().map(presence).collect();
    lines.map(|l| l.join("\n"))
}

/// Package names the package manager refused, in the order reported.
pub fn rejected_names(provider: ProviderKind, stderr: &str) -> Vec<String> {
    let re = match provider {
        ProviderKind::Apt => &APT_REJECTED,
        ProviderKind::Apk => &APK_REJECTED,
        _ => return Vec::new(),
    };
    re.captures_iter(stderr)
        .filter_map(|c| c.iter().skip(1).flatten().next())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Remove the local package-index cache.
pub fn purge_script(provider: ProviderKind) -> Option<String> {
    match provider {
        ProviderKind::Apt => {
            Some("set -euo pipefail\napt-get clean\nrm -rf /var/lib/apt/lists/*".to_string())
        }
        ProviderKind::Apk => Some("set -euo pipefail\nrm -rf /var/cache/apk/*".to_string()),
        _ => None,
    }
}
