//! Per-package pipeline (resolve -> download -> extract) and the sequential batch driver.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bundle;
use crate::config::Config;
use crate::error_handling::FetchError;
use crate::extract::{self, Extraction};
use crate::http_client::HttpClient;
use crate::registry::{self, PackageSpec};
use crate::utils;

pub const NODE_MODULES: &str = "node_modules";

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub config: Config,
    /// Also write `<output>/<leaf>.zip` for each fetched package.
    pub zip: bool,
}

/// How far one package got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    Unresolved,
    ResolvedOnly,
    /// Tarball on disk, extraction failed
    DownloadedOnly,
    Extracted,
    /// Tarball had no `package/` folder; nothing was placed
    ExtractedWithLayoutWarning,
}

impl InstallOutcome {
    /// Resolution and download both succeeded. This is what gates zip packaging.
    pub fn is_fetched(self) -> bool {
        matches!(
            self,
            InstallOutcome::DownloadedOnly
                | InstallOutcome::Extracted
                | InstallOutcome::ExtractedWithLayoutWarning
        )
    }

    pub fn is_usable(self) -> bool {
        self == InstallOutcome::Extracted
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub package: String,
    pub leaf_name: String,
    pub version: Option<String>,
    pub outcome: InstallOutcome,
    /// The error that stopped the pipeline, if any
    pub error: Option<FetchError>,
    /// Zip result; None when not requested or the package was never fetched
    pub bundle: Option<Result<PathBuf, FetchError>>,
}

impl PackageReport {
    fn new(package: &str, leaf_name: &str) -> Self {
        Self {
            package: package.to_string(),
            leaf_name: leaf_name.to_string(),
            version: None,
            outcome: InstallOutcome::Unresolved,
            error: None,
            bundle: None,
        }
    }

    fn fail(mut self, outcome: InstallOutcome, err: FetchError) -> Self {
        utils::log_error(&err.to_string());
        self.outcome = outcome;
        self.error = Some(err);
        self
    }

    pub fn is_fetched(&self) -> bool {
        self.outcome.is_fetched()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub output_dir: PathBuf,
    pub node_modules_dir: PathBuf,
    pub reports: Vec<PackageReport>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_fetched()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }
}

/// Progress notifications for the CLI.
pub enum BatchEvent<'a> {
    Started { index: usize, total: usize, package: &'a str },
    Finished(&'a PackageReport),
}

/// Install one package into `node_modules_dir/<leaf>`.
pub fn install_one(package: &str, node_modules_dir: &Path, options: &InstallOptions) -> PackageReport {
    let client = HttpClient::new(&options.config);
    install_with_client(&client, package, node_modules_dir, options)
}

fn install_with_client(
    client: &HttpClient,
    package: &str,
    node_modules_dir: &Path,
    options: &InstallOptions,
) -> PackageReport {
    let spec = match PackageSpec::parse(package) {
        Ok(s) => s,
        Err(e) => return PackageReport::new(package, "").fail(InstallOutcome::Unresolved, e),
    };
    let mut report = PackageReport::new(spec.name(), spec.leaf_name());

    utils::log(&format!("Fetching metadata for {}", spec.name()));
    let resolved = match registry::resolve_tarball_url(client, &options.config.registry, spec.name()) {
        Ok(r) => r,
        Err(e) => return report.fail(InstallOutcome::Unresolved, e),
    };
    report.version = Some(resolved.version.clone());

    let staging = node_modules_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tarball_path = staging.join(spec.tarball_file_name());
    let dest_dir = node_modules_dir.join(spec.leaf_name());

    utils::log(&format!("Downloading {}", resolved.tarball));
    match registry::download_tarball(client, &resolved.tarball, &tarball_path) {
        Ok(bytes) => utils::log(&format!("Downloaded {} ({} bytes)", tarball_path.display(), bytes)),
        Err(e) => return report.fail(InstallOutcome::ResolvedOnly, e),
    }

    match extract::extract_package(&tarball_path, &dest_dir) {
        Ok(Extraction::Relocated) => report.outcome = InstallOutcome::Extracted,
        Ok(Extraction::PackageDirMissing) => {
            report.outcome = InstallOutcome::ExtractedWithLayoutWarning
        }
        Err(e) => return report.fail(InstallOutcome::DownloadedOnly, e),
    }
    report
}

/// Install every package in order under `output_dir/node_modules`, zipping fetched ones when asked.
/// Only failing to create `node_modules` is a batch error; package failures end up in the reports.
pub fn run_batch(
    packages: &[&str],
    output_dir: &Path,
    options: &InstallOptions,
) -> Result<BatchSummary, FetchError> {
    run_batch_with(packages, output_dir, options, |_| {})
}

pub fn run_batch_with<F>(
    packages: &[&str],
    output_dir: &Path,
    options: &InstallOptions,
    mut on_event: F,
) -> Result<BatchSummary, FetchError>
where
    F: FnMut(BatchEvent<'_>),
{
    utils::set_quiet(options.config.quiet);
    let node_modules_dir = output_dir.join(NODE_MODULES);
    fs::create_dir_all(&node_modules_dir)
        .map_err(|e| FetchError::io("create node_modules", &node_modules_dir, e))?;

    let client = HttpClient::new(&options.config);
    let total = packages.len();
    let mut seen_leaves = HashSet::new();
    let mut reports = Vec::with_capacity(total);

    for (i, &package) in packages.iter().enumerate() {
        on_event(BatchEvent::Started { index: i + 1, total, package });

        let mut report = install_with_client(&client, package, &node_modules_dir, options);
        if report.outcome.is_usable() && !seen_leaves.insert(report.leaf_name.clone()) {
            utils::log_warn(&format!(
                "{} reuses directory name {}; earlier contents were replaced",
                report.package, report.leaf_name
            ));
        }
        if report.is_fetched() && options.zip {
            let zipped = bundle::zip_package_dir(&report.leaf_name, &node_modules_dir, output_dir);
            if let Err(e) = &zipped {
                utils::log_error(&e.to_string());
            }
            report.bundle = Some(zipped);
        }

        on_event(BatchEvent::Finished(&report));
        reports.push(report);
    }

    let output_dir = absolutize(output_dir);
    Ok(BatchSummary {
        node_modules_dir: output_dir.join(NODE_MODULES),
        output_dir,
        reports,
    })
}

fn absolutize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
