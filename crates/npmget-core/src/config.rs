//! Optional config from .npmgetrc or ~/.npmgetrc (JSON). Merged with env and CLI.

use std::path::{Path, PathBuf};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const CONFIG_FILE_NAME: &str = ".npmgetrc";

/// Settings read from a config file. Every field optional; env and CLI override.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct FileConfig {
    pub registry: Option<String>,
    pub retries: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub quiet: Option<bool>,
}

/// Effective settings after file < env merge. CLI flags are applied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub registry: String,
    pub retries: usize,
    pub timeout_secs: u64,
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            retries: DEFAULT_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            quiet: false,
        }
    }
}

impl Config {
    /// Load file config from `dir` (falling back to home) and apply environment overrides.
    pub fn resolve(dir: &Path) -> Self {
        let mut cfg = Config::default();
        cfg.apply_file(&load_config(dir));
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    }

    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(r) = file.registry.as_deref().filter(|r| !r.trim().is_empty()) {
            self.registry = normalize_registry(r);
        }
        if let Some(n) = file.retries {
            self.retries = n;
        }
        if let Some(t) = file.timeout_secs.filter(|t| *t > 0) {
            self.timeout_secs = t;
        }
        if let Some(q) = file.quiet {
            self.quiet = q;
        }
    }

    /// Env lookup is injected so tests don't touch process state.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(r) = get("NPMGET_REGISTRY").filter(|r| !r.trim().is_empty()) {
            self.registry = normalize_registry(&r);
        }
        if let Some(n) = get("NPMGET_HTTP_RETRIES").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.retries = n;
        }
        if let Some(t) = get("NPMGET_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|t| *t > 0)
        {
            self.timeout_secs = t;
        }
        if let Some(q) = get("NPMGET_QUIET") {
            self.quiet = q == "1" || q.eq_ignore_ascii_case("true");
        }
    }

    pub fn with_registry(mut self, registry: &str) -> Self {
        self.registry = normalize_registry(registry);
        self
    }
}

fn normalize_registry(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Load config from .npmgetrc in dir, then ~/.npmgetrc. Missing or invalid file = default.
pub fn load_config(dir: &Path) -> FileConfig {
    let candidates: Vec<PathBuf> = std::iter::once(dir.join(CONFIG_FILE_NAME))
        .chain(dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME)))
        .collect();
    for path in &candidates {
        if path.is_file() {
            return std::fs::read_to_string(path)
                .ok()
                .map(|s| parse_config(&s))
                .unwrap_or_default();
        }
    }
    FileConfig::default()
}

fn parse_config(s: &str) -> FileConfig {
    let mut cfg = FileConfig::default();
    let Ok(v) = serde_json::from_str::<serde_json::Value>(s) else {
        return cfg;
    };
    if let Some(r) = v.get("registry").and_then(|x| x.as_str()) {
        cfg.registry = Some(r.to_string());
    }
    if let Some(n) = v.get("retries").and_then(|x| x.as_u64()) {
        cfg.retries = Some(n as usize);
    }
    if let Some(t) = v.get("timeoutSecs").and_then(|x| x.as_u64()) {
        cfg.timeout_secs = Some(t);
    }
    if let Some(q) = v.get("quiet").and_then(|x| x.as_bool()) {
        cfg.quiet = Some(q);
    }
    cfg
}
