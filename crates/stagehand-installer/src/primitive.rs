use std::process::Command;

use anyhow::{Context, Result};

use crate::EnvLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Success,
    Failed,
}

/// Typed result of one primitive invocation. A command that runs and reports
/// failure yields a `Failed` outcome with its captured output; only failing
/// to start the command at all is an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub status: InstallStatus,
    pub stdout: String,
    pub stderr: String,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == InstallStatus::Success
    }

    pub fn diagnostics(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::from("(no output captured)"),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// The ambient package-installation capability, injected so the install
/// engine never touches a real environment in tests.
pub trait PackageInstaller {
    /// Attempt one declaration, exactly as written, with verbose output.
    fn install(&mut self, declaration: &str) -> Result<InstallOutcome>;

    /// The freeze listing of everything currently installed.
    fn list_installed(&mut self) -> Result<InstallOutcome>;

    /// Presence check for a single distribution name.
    fn query(&mut self, name: &str) -> Result<InstallOutcome>;
}

/// Real implementation over the environment's own pip.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    layout: EnvLayout,
}

impl PipInstaller {
    pub fn new(layout: EnvLayout) -> Self {
        Self { layout }
    }

    fn pip_command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(self.layout.pip_path());
        command.args(args);
        command
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&mut self, declaration: &str) -> Result<InstallOutcome> {
        run_captured(
            self.pip_command(&["install", "--verbose"]).arg(declaration),
            &format!("failed to start pip install for '{declaration}'"),
        )
    }

    fn list_installed(&mut self) -> Result<InstallOutcome> {
        run_captured(
            &mut self.pip_command(&["freeze"]),
            "failed to start pip freeze",
        )
    }

    fn query(&mut self, name: &str) -> Result<InstallOutcome> {
        run_captured(
            self.pip_command(&["show", "--quiet"]).arg(name),
            &format!("failed to start pip show for '{name}'"),
        )
    }
}

pub(crate) fn run_captured(command: &mut Command, context_message: &str) -> Result<InstallOutcome> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;

    let status = if output.status.success() {
        InstallStatus::Success
    } else {
        InstallStatus::Failed
    };

    Ok(InstallOutcome {
        status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
