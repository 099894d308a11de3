//! Core library for npmget: registry lookup, tarball download, extraction, zip bundling.
//! Used by the CLI binary; can be reused by other tools.

pub mod bundle;
pub mod config;
pub mod error_handling;
pub mod extract;
pub mod http_client;
pub mod install;
pub mod registry;
pub mod utils;

// Re-export main API for CLI
pub use bundle::zip_package_dir;
pub use config::{load_config, Config};
pub use error_handling::FetchError;
pub use extract::{extract_package, Extraction};
pub use install::{
    install_one, run_batch, run_batch_with, BatchEvent, BatchSummary, InstallOptions,
    InstallOutcome, PackageReport,
};
pub use registry::{resolve_tarball_url, PackageSpec, ResolvedTarball};
pub use utils::{is_quiet, log, log_error, log_warn, set_quiet};
