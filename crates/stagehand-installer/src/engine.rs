use std::process::Command;

use anyhow::{anyhow, Result};
use stagehand_core::RequirementList;

use crate::primitive::run_captured;
use crate::{EnvLayout, PackageInstaller};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    pub declaration: String,
    pub line_number: usize,
    pub diagnostics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub attempted: usize,
    pub installed: Vec<String>,
    pub failure: Option<InstallFailure>,
}

impl InstallReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallEvent<'a> {
    Started { declarations: usize },
    Attempting { declaration: &'a str, index: usize, total: usize },
    Installed { declaration: &'a str },
    Failed { declaration: &'a str, diagnostics: &'a str },
    Completed { installed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    CreateEnvironment,
    UpgradePackagingTools,
}

/// Install every declaration in file order, one at a time. The run aborts on
/// the first failed declaration: nothing after it is attempted, and whatever
/// installed before it stays installed. No retry, no rollback.
///
/// A `Failed` outcome from the primitive is a terminal report, not an `Err`;
/// `Err` is reserved for the primitive being unable to run at all.
pub fn run_install(
    list: &RequirementList,
    primitive: &mut dyn PackageInstaller,
    mut observe: impl FnMut(InstallEvent<'_>),
) -> Result<InstallReport> {
    let declarations: Vec<_> = list.declarations().collect();
    let total = declarations.len();
    observe(InstallEvent::Started { declarations: total });

    let mut report = InstallReport::default();
    for (index, line) in declarations.into_iter().enumerate() {
        let declaration = line.trimmed();
        observe(InstallEvent::Attempting {
            declaration,
            index,
            total,
        });

        report.attempted += 1;
        let outcome = primitive.install(declaration)?;
        if outcome.succeeded() {
            observe(InstallEvent::Installed { declaration });
            report.installed.push(declaration.to_string());
            continue;
        }

        let diagnostics = outcome.diagnostics();
        observe(InstallEvent::Failed {
            declaration,
            diagnostics: &diagnostics,
        });
        report.failure = Some(InstallFailure {
            declaration: declaration.to_string(),
            line_number: line.line_number(),
            diagnostics,
        });
        return Ok(report);
    }

    observe(InstallEvent::Completed {
        installed: report.installed.len(),
    });
    Ok(report)
}

/// Create the virtual environment and upgrade the packaging tooling inside
/// it. Both steps are fail-fast with the captured output in the error.
pub fn bootstrap_environment(
    layout: &EnvLayout,
    python: &str,
    mut observe: impl FnMut(BootstrapStep),
) -> Result<()> {
    observe(BootstrapStep::CreateEnvironment);
    let outcome = run_captured(
        Command::new(python).arg("-m").arg("venv").arg(layout.env_dir()),
        &format!("failed to start '{python}'"),
    )?;
    if !outcome.succeeded() {
        return Err(anyhow!(
            "environment creation failed at {}:\n{}",
            layout.env_dir().display(),
            outcome.diagnostics()
        ));
    }

    observe(BootstrapStep::UpgradePackagingTools);
    let outcome = run_captured(
        Command::new(layout.python_path()).args([
            "-m",
            "pip",
            "install",
            "--upgrade",
            "pip",
            "setuptools",
            "wheel",
        ]),
        "failed to start pip self-upgrade",
    )?;
    if !outcome.succeeded() {
        return Err(anyhow!(
            "packaging tool upgrade failed:\n{}",
            outcome.diagnostics()
        ));
    }

    layout.ensure_state_dirs()
}
