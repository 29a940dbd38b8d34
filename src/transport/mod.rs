//! KL-010: Transport — run scripts inside the target environment.

pub mod chroot;
pub mod local;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Output from executing a script in an environment.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The script could not be run at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stdin write error: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("wait error: {0}")]
    Wait(#[source] std::io::Error),
}

/// Handle on the filesystem being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    root: PathBuf,
}

impl Environment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The running system.
    pub fn local() -> Self {
        Self::new("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_local(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Execute a shell script in this environment.
    /// Dispatches to local bash or chroot based on the root.
    pub fn exec(&self, script: &str) -> Result<ExecOutput, TransportError> {
        if self.is_local() {
            local::exec_local(script)
        } else {
            chroot::exec_chroot(&self.root, script)
        }
    }
}

/// Spawn `cmd`, pipe `script` to its stdin and collect the output.
pub(crate) fn run_piped(mut cmd: Command, script: &str) -> Result<ExecOutput, TransportError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TransportError::Spawn { program, source })?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(script.as_bytes())
            .map_err(TransportError::Stdin)?;
    }

    let output = child.wait_with_output().map_err(TransportError::Wait)?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
