//! KL-011: chroot execution transport.
//!
//! Runs `chroot <root> bash` with the script piped to stdin, so the
//! environment's own package managers act on its filesystem.

use super::{run_piped, ExecOutput, TransportError};
use std::path::Path;
use std::process::Command;

fn chroot_command(root: &Path) -> Command {
    let mut cmd = Command::new("chroot");
    cmd.arg(root).arg("bash");
    cmd
}

/// Execute a shell script inside `root`.
pub fn exec_chroot(root: &Path, script: &str) -> Result<ExecOutput, TransportError> {
    run_piped(chroot_command(root), script)
}
