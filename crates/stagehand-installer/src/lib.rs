mod engine;
mod layout;
mod primitive;
mod receipt;
mod verify;

pub use engine::{
    bootstrap_environment, run_install, BootstrapStep, InstallEvent, InstallFailure, InstallReport,
};
pub use layout::EnvLayout;
pub use primitive::{InstallOutcome, InstallStatus, PackageInstaller, PipInstaller};
pub use receipt::{
    current_unix_timestamp, read_install_receipt, requirements_fingerprint, write_install_receipt,
    InstallReceipt,
};
pub use verify::{distribution_name, verify_requirements, VerifyCheck, VerifyReport};
