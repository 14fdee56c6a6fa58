use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Deploy manifest (`stagehand.toml`). Everything except the app entry point
/// has a built-in default so a bare `app = "api.main:app"` file is complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployManifest {
    pub app: String,
    #[serde(default = "default_requirements")]
    pub requirements: PathBuf,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_env_dir")]
    pub env_dir: PathBuf,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

impl DeployManifest {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse deploy manifest")?;

        let (module, attribute) = manifest
            .app
            .split_once(':')
            .ok_or_else(|| anyhow!("app entry '{}' must use module:attribute form", manifest.app))?;
        if module.trim().is_empty() || attribute.trim().is_empty() {
            return Err(anyhow!(
                "app entry '{}' must name both a module and an attribute",
                manifest.app
            ));
        }
        if manifest.python.trim().is_empty() {
            return Err(anyhow!("python executable must not be empty"));
        }
        if manifest.server.port == 0 {
            return Err(anyhow!("server port must not be 0"));
        }
        if manifest.server.workers == 0 {
            return Err(anyhow!("server workers must be at least 1"));
        }

        Ok(manifest)
    }

    /// A missing manifest file is not an error: commands that can operate
    /// from flags alone treat it as absent.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read deploy manifest: {}", path.display()));
            }
        };

        let manifest = Self::from_toml_str(&content)
            .with_context(|| format!("failed parsing deploy manifest: {}", path.display()))?;
        Ok(Some(manifest))
    }
}

fn default_requirements() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_env_dir() -> PathBuf {
    PathBuf::from(".venv")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_workers() -> u32 {
    1
}
