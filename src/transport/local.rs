//! KL-010: Local execution transport.

use super::{run_piped, ExecOutput, TransportError};
use std::process::Command;

/// Execute a shell script locally via `bash`.
/// Uses bash (not sh/dash) because generated scripts use `set -o pipefail`.
pub fn exec_local(script: &str) -> Result<ExecOutput, TransportError> {
    run_piped(Command::new("bash"), script)
}
