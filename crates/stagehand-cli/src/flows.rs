use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::CommandFactory;
use stagehand_core::{DeployManifest, RequirementList};
use stagehand_installer::{
    bootstrap_environment, current_unix_timestamp, read_install_receipt, requirements_fingerprint,
    run_install, verify_requirements, write_install_receipt, BootstrapStep, EnvLayout,
    InstallEvent, InstallReceipt, InstallReport, PackageInstaller, PipInstaller, VerifyReport,
};

use crate::render::TerminalRenderer;
use crate::{Cli, Commands};

const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::new(cli.plain, cli.timestamps);
    let manifest = DeployManifest::load_optional(&cli.manifest)?;

    match cli.command {
        Commands::Init {
            python,
            env_dir,
            force,
        } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            let python = python
                .or_else(|| manifest.as_ref().map(|m| m.python.clone()))
                .unwrap_or_else(|| "python3".to_string());
            run_init_flow(&renderer, &layout, &python, force)
        }
        Commands::Install {
            requirements,
            env_dir,
            freeze,
            json,
        } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            let requirements = resolved_requirements(requirements, manifest.as_ref());
            run_install_flow(&renderer, layout, &requirements, freeze, json)
        }
        Commands::Freeze { env_dir } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            run_freeze_flow(&layout)
        }
        Commands::Verify {
            requirements,
            env_dir,
            json,
        } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            let requirements = resolved_requirements(requirements, manifest.as_ref());
            run_verify_flow(&renderer, layout, &requirements, json)
        }
        Commands::Run {
            app,
            env_dir,
            host,
            port,
            workers,
            wait_ready,
        } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            run_server_flow(
                &renderer,
                &layout,
                manifest.as_ref(),
                LaunchOverrides {
                    app,
                    host,
                    port,
                    workers,
                    wait_ready,
                },
            )
        }
        Commands::Doctor { env_dir } => {
            let layout = EnvLayout::new(resolved_env_dir(env_dir, manifest.as_ref()));
            let requirements = resolved_requirements(None, manifest.as_ref());
            run_doctor_flow(&renderer, &layout, &requirements)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "stagehand", &mut io::stdout());
            Ok(())
        }
    }
}

fn resolved_env_dir(flag: Option<PathBuf>, manifest: Option<&DeployManifest>) -> PathBuf {
    flag.or_else(|| manifest.map(|m| m.env_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(".venv"))
}

fn resolved_requirements(flag: Option<PathBuf>, manifest: Option<&DeployManifest>) -> PathBuf {
    flag.or_else(|| manifest.map(|m| m.requirements.clone()))
        .unwrap_or_else(|| PathBuf::from("requirements.txt"))
}

fn ensure_provisioned(layout: &EnvLayout) -> Result<()> {
    if layout.is_provisioned() {
        return Ok(());
    }
    Err(anyhow!(
        "no provisioned environment at {} (run 'stagehand init' first)",
        layout.env_dir().display()
    ))
}

fn run_init_flow(
    renderer: &TerminalRenderer,
    layout: &EnvLayout,
    python: &str,
    force: bool,
) -> Result<()> {
    if layout.is_provisioned() && !force {
        return Err(anyhow!(
            "environment already provisioned at {} (use --force to recreate)",
            layout.env_dir().display()
        ));
    }

    bootstrap_environment(layout, python, |step| match step {
        BootstrapStep::CreateEnvironment => renderer.status(
            "step",
            &format!("creating environment at {}", layout.env_dir().display()),
        ),
        BootstrapStep::UpgradePackagingTools => {
            renderer.status("step", "upgrading pip, setuptools, wheel")
        }
    })?;

    renderer.status(
        "ok",
        &format!("environment ready at {}", layout.env_dir().display()),
    );
    Ok(())
}

fn run_install_flow(
    renderer: &TerminalRenderer,
    layout: EnvLayout,
    requirements_path: &Path,
    freeze: bool,
    json: bool,
) -> Result<()> {
    ensure_provisioned(&layout)?;

    let content = fs::read_to_string(requirements_path).with_context(|| {
        format!(
            "failed to read requirements file: {}",
            requirements_path.display()
        )
    })?;
    let list = RequirementList::parse(&content);
    let mut primitive = PipInstaller::new(layout.clone());

    if !json {
        renderer.status(
            "step",
            &format!(
                "installing {} declaration(s) from {}",
                list.declaration_count(),
                requirements_path.display()
            ),
        );
    }

    let progress =
        (!json).then(|| renderer.start_progress("install", list.declaration_count() as u64));
    let mut completed = 0_u64;
    let report = run_install(&list, &mut primitive, |event| {
        let Some(progress) = &progress else {
            return;
        };
        match event {
            InstallEvent::Started { .. } | InstallEvent::Completed { .. } => {}
            InstallEvent::Attempting { declaration, .. } => {
                progress.println(&renderer.line("step", &format!("installing {declaration}")));
            }
            InstallEvent::Installed { declaration } => {
                completed += 1;
                progress.set(completed);
                progress.println(&renderer.line("ok", &format!("installed {declaration}")));
            }
            InstallEvent::Failed {
                declaration,
                diagnostics,
            } => {
                progress
                    .println(&renderer.line("fail", &format!("installation failed: {declaration}")));
                for line in diagnostics.lines() {
                    progress.println(&format!("      {line}"));
                }
            }
        }
    })?;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&install_report_json(&report))
                .context("failed to serialize install report")?
        );
    }

    if let Some(failure) = &report.failure {
        return Err(anyhow!(
            "installation failed at line {}: {}",
            failure.line_number,
            failure.declaration
        ));
    }

    let receipt = InstallReceipt {
        requirements_sha256: requirements_fingerprint(&content),
        installed: report.installed.clone(),
        completed_at_unix: current_unix_timestamp()?,
    };
    write_install_receipt(&layout, &receipt)?;

    if !json {
        renderer.status(
            "ok",
            &format!("installed {} package(s)", report.installed.len()),
        );
    }

    if freeze {
        run_freeze_post_step(renderer, &mut primitive, json);
    }
    Ok(())
}

/// The post-hoc listing is informational: the install has already completed,
/// so a listing failure is a warning, never a changed exit status.
fn run_freeze_post_step(renderer: &TerminalRenderer, primitive: &mut PipInstaller, json: bool) {
    match primitive.list_installed() {
        Ok(outcome) if outcome.succeeded() => {
            if !json {
                renderer.status("step", "installed packages:");
                for line in outcome.stdout.lines() {
                    println!("{line}");
                }
            }
        }
        Ok(outcome) => {
            if !json {
                renderer.status(
                    "warn",
                    &format!("package listing failed: {}", outcome.diagnostics()),
                );
            }
        }
        Err(err) => {
            if !json {
                renderer.status("warn", &format!("package listing failed: {err:#}"));
            }
        }
    }
}

fn run_freeze_flow(layout: &EnvLayout) -> Result<()> {
    ensure_provisioned(layout)?;
    let mut primitive = PipInstaller::new(layout.clone());
    let outcome = primitive.list_installed()?;
    if !outcome.succeeded() {
        return Err(anyhow!(
            "package listing failed:\n{}",
            outcome.diagnostics()
        ));
    }
    print!("{}", outcome.stdout);
    Ok(())
}

fn run_verify_flow(
    renderer: &TerminalRenderer,
    layout: EnvLayout,
    requirements_path: &Path,
    json: bool,
) -> Result<()> {
    ensure_provisioned(&layout)?;

    let list = RequirementList::load(requirements_path)?;
    let mut primitive = PipInstaller::new(layout);
    let report = verify_requirements(&list, &mut primitive, |check| {
        if json {
            return;
        }
        if check.present {
            renderer.status("ok", &format!("{} ({})", check.name, check.declaration));
        } else {
            renderer.status(
                "fail",
                &format!("{} missing ({})", check.name, check.declaration),
            );
        }
    })?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&verify_report_json(&report))
                .context("failed to serialize verify report")?
        );
    }

    let missing = report.missing();
    if missing.is_empty() {
        if !json {
            renderer.status(
                "ok",
                &format!("all {} package(s) present", report.checks.len()),
            );
        }
        return Ok(());
    }
    Err(anyhow!(
        "verification failed: {} of {} package(s) missing: {}",
        missing.len(),
        report.checks.len(),
        missing.join(", ")
    ))
}

struct LaunchOverrides {
    app: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    workers: Option<u32>,
    wait_ready: bool,
}

fn run_server_flow(
    renderer: &TerminalRenderer,
    layout: &EnvLayout,
    manifest: Option<&DeployManifest>,
    overrides: LaunchOverrides,
) -> Result<()> {
    ensure_provisioned(layout)?;

    let app = overrides
        .app
        .or_else(|| manifest.map(|m| m.app.clone()))
        .ok_or_else(|| anyhow!("no app entry point: pass --app or set app in the deploy manifest"))?;
    let defaults = manifest.map(|m| m.server.clone()).unwrap_or_default();
    let host = overrides.host.unwrap_or(defaults.host);
    let port = resolve_port(
        overrides.port,
        std::env::var("PORT").ok().as_deref(),
        defaults.port,
    )?;
    let workers = resolve_workers(
        overrides.workers,
        std::env::var("WORKERS").ok().as_deref(),
        defaults.workers,
    )?;

    renderer.status(
        "step",
        &format!("launching {app} on {host}:{port} with {workers} worker(s)"),
    );

    let mut command = Command::new(layout.python_path());
    command
        .arg("-m")
        .arg("uvicorn")
        .arg(&app)
        .arg("--host")
        .arg(&host)
        .arg("--port")
        .arg(port.to_string())
        .arg("--workers")
        .arg(workers.to_string());
    let mut child = command.spawn().with_context(|| {
        format!(
            "failed to start server via {}",
            layout.python_path().display()
        )
    })?;

    if overrides.wait_ready {
        if let Err(err) = wait_for_ready(renderer, &mut child, &host, port) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    }

    let status = child.wait().context("failed waiting for server process")?;
    if status.success() {
        renderer.status("ok", "server exited cleanly");
        return Ok(());
    }
    renderer.status("fail", &format!("server exited with {status}"));
    // the launcher's exit status is the server's
    std::process::exit(status.code().unwrap_or(1));
}

fn wait_for_ready(
    renderer: &TerminalRenderer,
    child: &mut Child,
    host: &str,
    port: u16,
) -> Result<()> {
    let url = probe_url(host, port);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .context("failed to build readiness probe client")?;

    let deadline = Instant::now() + READY_PROBE_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait().context("failed polling server process")? {
            return Err(anyhow!("server exited before answering on {url} ({status})"));
        }
        if client.get(&url).send().is_ok() {
            renderer.status("ok", &format!("server answering on {url}"));
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "server did not answer on {url} within {}s",
                READY_PROBE_TIMEOUT.as_secs()
            ));
        }
        thread::sleep(Duration::from_millis(500));
    }
}

/// Flag beats environment beats manifest default.
pub(crate) fn resolve_port(flag: Option<u16>, env_value: Option<&str>, fallback: u16) -> Result<u16> {
    if let Some(port) = flag {
        if port == 0 {
            return Err(anyhow!("port must not be 0"));
        }
        return Ok(port);
    }
    let Some(raw) = env_value else {
        return Ok(fallback);
    };
    let port: u16 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid PORT value: {raw}"))?;
    if port == 0 {
        return Err(anyhow!("PORT must not be 0"));
    }
    Ok(port)
}

pub(crate) fn resolve_workers(
    flag: Option<u32>,
    env_value: Option<&str>,
    fallback: u32,
) -> Result<u32> {
    if let Some(workers) = flag {
        if workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        return Ok(workers);
    }
    let Some(raw) = env_value else {
        return Ok(fallback);
    };
    let workers: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid WORKERS value: {raw}"))?;
    if workers == 0 {
        return Err(anyhow!("WORKERS must be at least 1"));
    }
    Ok(workers)
}

/// An all-interfaces bind is probed through loopback.
pub(crate) fn probe_url(host: &str, port: u16) -> String {
    let probe_host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
    format!("http://{probe_host}:{port}/")
}

fn run_doctor_flow(
    renderer: &TerminalRenderer,
    layout: &EnvLayout,
    requirements_path: &Path,
) -> Result<()> {
    let receipt = read_install_receipt(layout)?;
    let requirements = match fs::read_to_string(requirements_path) {
        Ok(content) => Some(content),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| {
                format!(
                    "failed to read requirements file: {}",
                    requirements_path.display()
                )
            });
        }
    };

    for line in format_doctor_lines(
        layout,
        receipt.as_ref(),
        requirements.as_deref(),
        requirements_path,
    ) {
        renderer.status("step", &line);
    }
    Ok(())
}

pub(crate) fn format_doctor_lines(
    layout: &EnvLayout,
    receipt: Option<&InstallReceipt>,
    requirements: Option<&str>,
    requirements_path: &Path,
) -> Vec<String> {
    let mut lines = vec![
        format!("prefix: {}", layout.env_dir().display()),
        format!("bin: {}", layout.bin_dir().display()),
        format!(
            "interpreter: {} ({})",
            layout.python_path().display(),
            if layout.is_provisioned() {
                "present"
            } else {
                "missing"
            }
        ),
    ];

    let Some(receipt) = receipt else {
        lines.push("no successful install recorded".to_string());
        return lines;
    };

    lines.push(format!(
        "last install: {} package(s) at unix {}",
        receipt.installed.len(),
        receipt.completed_at_unix
    ));
    match requirements {
        None => lines.push(format!(
            "requirements file not found: {}",
            requirements_path.display()
        )),
        Some(content) => {
            if requirements_fingerprint(content) == receipt.requirements_sha256 {
                lines.push("requirements unchanged since last install".to_string());
            } else {
                lines.push("requirements drift: file changed since last install".to_string());
            }
        }
    }
    lines
}

pub(crate) fn install_report_json(report: &InstallReport) -> serde_json::Value {
    serde_json::json!({
        "attempted": report.attempted,
        "installed": report.installed,
        "failure": report.failure.as_ref().map(|failure| serde_json::json!({
            "declaration": failure.declaration,
            "line": failure.line_number,
            "diagnostics": failure.diagnostics,
        })),
    })
}

pub(crate) fn verify_report_json(report: &VerifyReport) -> serde_json::Value {
    serde_json::json!({
        "checks": report.checks.iter().map(|check| serde_json::json!({
            "name": check.name,
            "declaration": check.declaration,
            "present": check.present,
        })).collect::<Vec<_>>(),
        "all_present": report.all_present(),
    })
}
