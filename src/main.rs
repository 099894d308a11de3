//! Thin CLI layer: parse args, styled output, and call into npmget-core.
//! Crash-proof: panic caught and reported; all errors return Result.

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use npmget_core::{BatchEvent, BatchSummary, Config, InstallOptions, InstallOutcome, PackageReport};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal()
        && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn warning(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.yellow());
    } else {
        eprintln!("{}", msg);
    }
}

fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
        .template("{spinner:.dim} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn cli() -> Command {
    Command::new("npmget")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Download the latest npm packages into node_modules, optionally as zip files")
        .after_help(
            "Examples:\n  npmget left-pad\n  npmget -p react react-dom -o vendor --zip\n  npmget @types/node --registry http://localhost:4873",
        )
        .arg(
            Arg::new("package")
                .num_args(0..)
                .help("Package(s) to fetch, e.g. left-pad or @scope/name"),
        )
        .arg(
            Arg::new("packages")
                .short('p')
                .long("packages")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Package(s) to fetch (same as positional arguments)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .default_value(".")
                .help("Output directory; packages go to <output>/node_modules"),
        )
        .arg(
            Arg::new("zip")
                .short('z')
                .long("zip")
                .action(ArgAction::SetTrue)
                .help("Also write <output>/<name>.zip for each package"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Minimal output; show spinner when busy (or set NPMGET_QUIET=1)"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .help("Registry base URL (default: https://registry.npmjs.org or NPMGET_REGISTRY)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print a machine-readable JSON summary instead of the final message"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Exit with status 1 if any package could not be fetched"),
        )
}

fn collect_packages(matches: &ArgMatches) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ["package", "packages"] {
        if let Some(values) = matches.get_many::<String>(id) {
            out.extend(values.cloned());
        }
    }
    out
}

fn report_line(report: &PackageReport) {
    let name = &report.package;
    let version = report.version.as_deref().unwrap_or("?");
    match report.outcome {
        InstallOutcome::Extracted => success(&format!("✔ {}@{}", name, version)),
        InstallOutcome::ExtractedWithLayoutWarning => {
            warning(&format!("! {}@{} downloaded, but the tarball had no package/ folder", name, version))
        }
        _ => {
            let reason = report.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
            error(&format!("✘ {}: {}", name, reason));
        }
    }
    match &report.bundle {
        Some(Ok(path)) => success(&format!("  zip: {}", path.display())),
        Some(Err(e)) => error(&format!("  zip failed: {}", e)),
        None => {}
    }
}

fn run() -> Result<(), String> {
    let matches = cli().get_matches();

    let packages = collect_packages(&matches);
    if packages.is_empty() {
        return Err("No packages given. Run `npmget --help` for usage.".to_string());
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = Config::resolve(&cwd);
    if let Some(registry) = matches.get_one::<String>("registry") {
        config = config.with_registry(registry);
    }
    let json_out = matches.get_flag("json");
    let quiet = config.quiet || matches.get_flag("quiet");
    // JSON mode keeps stdout for the summary alone; core logging honours config.quiet.
    config.quiet = quiet || json_out;

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let options = InstallOptions { config, zip: matches.get_flag("zip") };

    let refs: Vec<&str> = packages.iter().map(|s| s.as_str()).collect();
    let summary = run_with_progress(&refs, &output, &options, quiet || json_out, !json_out)?;

    if json_out {
        let s = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        println!("{}", s);
    } else {
        let failed = summary.failed();
        if failed > 0 {
            dim(&format!("{} of {} package(s) failed.", failed, summary.reports.len()));
        }
        info(&format!("\nDone: output → {}", summary.output_dir.display()));
    }

    if matches.get_flag("strict") && summary.failed() > 0 {
        return Err(format!("{} package(s) could not be fetched.", summary.failed()));
    }
    Ok(())
}

fn run_with_progress(
    packages: &[&str],
    output: &Path,
    options: &InstallOptions,
    quiet: bool,
    show_reports: bool,
) -> Result<BatchSummary, String> {
    let mut current: Option<ProgressBar> = None;
    let summary = npmget_core::run_batch_with(packages, output, options, |event| match event {
        BatchEvent::Started { index, total, package } => {
            let header = format!("==== [{}/{}] {} ====", index, total, package);
            if quiet {
                let sp = spinner();
                sp.set_message(header);
                current = Some(sp);
            } else {
                info(&format!("\n{}", header));
            }
        }
        BatchEvent::Finished(report) => {
            if let Some(sp) = current.take() {
                sp.finish_and_clear();
            }
            if show_reports {
                report_line(report);
            }
        }
    });
    if let Some(sp) = current.take() {
        sp.finish_and_clear();
    }
    summary.map_err(|e| e.to_string())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
