use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Path book-keeping for one isolated environment prefix. The state directory
/// lives inside the environment so a recreated environment starts with a
/// clean install history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLayout {
    env_dir: PathBuf,
}

impl EnvLayout {
    pub fn new(env_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.env_dir.join("Scripts")
        } else {
            self.env_dir.join("bin")
        }
    }

    pub fn python_path(&self) -> PathBuf {
        self.bin_dir().join(executable_name("python"))
    }

    pub fn pip_path(&self) -> PathBuf {
        self.bin_dir().join(executable_name("pip"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.env_dir.join("stagehand")
    }

    pub fn receipt_path(&self) -> PathBuf {
        self.state_dir().join("install.receipt")
    }

    pub fn ensure_state_dirs(&self) -> Result<()> {
        let dir = self.state_dir();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(())
    }

    /// The environment counts as provisioned once its own interpreter exists.
    pub fn is_provisioned(&self) -> bool {
        self.python_path().exists()
    }
}

fn executable_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}
