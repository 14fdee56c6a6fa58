mod flows;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Deployment bootstrap for Python web services", long_about = None)]
struct Cli {
    /// Deploy manifest path
    #[arg(long, default_value = "stagehand.toml")]
    manifest: PathBuf,
    /// Force plain, uncolored output
    #[arg(long)]
    plain: bool,
    /// Prefix every status line with a wall-clock timestamp
    #[arg(long)]
    timestamps: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the virtual environment and upgrade its packaging tools
    Init {
        #[arg(long)]
        python: Option<String>,
        #[arg(long)]
        env_dir: Option<PathBuf>,
        /// Recreate even if the environment is already provisioned
        #[arg(long)]
        force: bool,
    },
    /// Install the requirements list, one declaration at a time
    Install {
        #[arg(short = 'r', long)]
        requirements: Option<PathBuf>,
        #[arg(long)]
        env_dir: Option<PathBuf>,
        /// List installed packages after a fully successful run
        #[arg(long)]
        freeze: bool,
        /// Emit the install report as JSON instead of status lines
        #[arg(long)]
        json: bool,
    },
    /// Print the environment's installed-package listing
    Freeze {
        #[arg(long)]
        env_dir: Option<PathBuf>,
    },
    /// Check that every declared package is present in the environment
    Verify {
        #[arg(short = 'r', long)]
        requirements: Option<PathBuf>,
        #[arg(long)]
        env_dir: Option<PathBuf>,
        /// Emit the verify report as JSON instead of status lines
        #[arg(long)]
        json: bool,
    },
    /// Launch the application server from the environment
    Run {
        /// module:attribute entry point (defaults to the manifest's app)
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        env_dir: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides PORT and the manifest)
        #[arg(long)]
        port: Option<u16>,
        /// Worker count (overrides WORKERS and the manifest)
        #[arg(long)]
        workers: Option<u32>,
        /// Block until the served port answers before reporting ready
        #[arg(long)]
        wait_ready: bool,
    },
    /// Report environment layout and install state
    Doctor {
        #[arg(long)]
        env_dir: Option<PathBuf>,
    },
    /// Generate a shell completion script on stdout
    Completions { shell: clap_complete::Shell },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    flows::run_cli(cli)
}

#[cfg(test)]
mod tests;
