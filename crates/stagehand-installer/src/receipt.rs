use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

use crate::EnvLayout;

/// Record of the last fully successful install run. Written only after every
/// declaration installed; a partial run never produces a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReceipt {
    pub requirements_sha256: String,
    pub installed: Vec<String>,
    pub completed_at_unix: u64,
}

pub fn requirements_fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}

pub fn write_install_receipt(layout: &EnvLayout, receipt: &InstallReceipt) -> Result<PathBuf> {
    layout.ensure_state_dirs()?;

    let mut payload = String::new();
    payload.push_str(&format!(
        "requirements_sha256={}\n",
        receipt.requirements_sha256
    ));
    for declaration in &receipt.installed {
        payload.push_str(&format!("installed={declaration}\n"));
    }
    payload.push_str(&format!(
        "completed_at_unix={}\n",
        receipt.completed_at_unix
    ));

    let path = layout.receipt_path();
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write install receipt: {}", path.display()))?;
    Ok(path)
}

pub fn read_install_receipt(layout: &EnvLayout) -> Result<Option<InstallReceipt>> {
    let path = layout.receipt_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read install receipt: {}", path.display()));
        }
    };

    let receipt = parse_receipt(&raw)
        .with_context(|| format!("failed to parse install receipt: {}", path.display()))?;
    Ok(Some(receipt))
}

fn parse_receipt(raw: &str) -> Result<InstallReceipt> {
    let mut requirements_sha256 = None;
    let mut installed = Vec::new();
    let mut completed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            return Err(anyhow!("invalid receipt line: {line}"));
        };
        match k {
            "requirements_sha256" => requirements_sha256 = Some(v.to_string()),
            "installed" => installed.push(v.to_string()),
            "completed_at_unix" => {
                completed_at_unix = Some(v.parse().context("completed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(InstallReceipt {
        requirements_sha256: requirements_sha256.context("missing requirements_sha256")?,
        installed,
        completed_at_unix: completed_at_unix.context("missing completed_at_unix")?,
    })
}
