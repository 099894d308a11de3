use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;

pub const LOG_FILE_ENV: &str = "NPMGET_LOG_FILE";

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence stdout logging for the rest of the process (`-q` or `quiet` in config).
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    if QUIET.load(Ordering::Relaxed) {
        return true;
    }
    env::var("NPMGET_QUIET").map(|v| v == "1" || v == "true").unwrap_or(false)
}

fn stamp(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

fn append_to_log_file(line: &str) {
    let Ok(path) = env::var(LOG_FILE_ENV) else {
        return;
    };
    if path.is_empty() {
        return;
    }
    // Append-only; log failures never break the pipeline.
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(file, "{}", line);
    }
}

pub fn log(message: &str) {
    let line = stamp(message);
    if !is_quiet() {
        println!("{}", line);
    }
    append_to_log_file(&line);
}

/// Non-fatal conditions (missing `package/` folder, leaf-name collisions). Always on stderr.
pub fn log_warn(message: &str) {
    let line = stamp(&format!("warning: {}", message));
    eprintln!("{}", line);
    append_to_log_file(&line);
}

pub fn log_error(message: &str) {
    let line = stamp(&format!("error: {}", message));
    eprintln!("{}", line);
    append_to_log_file(&line);
}
