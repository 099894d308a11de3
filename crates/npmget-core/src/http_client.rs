//! Blocking HTTP client: one Agent (connection reuse), request timeout, bounded retry.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 5_000;
const MAX_IDLE_CONNECTIONS: usize = 8;
/// Upper bound on pre-allocation from a server-supplied Content-Length.
const MAX_PREALLOC_BYTES: usize = 8 * 1024 * 1024;

pub struct HttpClient {
    agent: ureq::Agent,
    retries: usize,
    backoff_ms: u64,
}

impl HttpClient {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_idle_connections(MAX_IDLE_CONNECTIONS)
            .user_agent(concat!("npmget/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, retries: config.retries, backoff_ms: INITIAL_BACKOFF_MS }
    }

    /// GET url and return body bytes. Non-2xx is an error.
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self.send_with_retry(|| self.agent.get(url).set("Accept", "application/json").call())?;
        let hint = resp
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut buf = Vec::with_capacity(if hint > 0 { hint.min(MAX_PREALLOC_BYTES) } else { 64 * 1024 });
        resp.into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| e.to_string())?;
        Ok(buf)
    }

    /// GET url and stream body to `dest` (created or truncated). Returns bytes written.
    /// A partially written file is left in place if the transfer breaks.
    pub fn get_to_file(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let resp = self.send_with_retry(|| self.agent.get(url).call())?;
        let file = File::create(dest).map_err(|e| format!("{}: {}", dest.display(), e))?;
        let mut out = BufWriter::new(file);
        let mut reader = resp.into_reader();
        let written = std::io::copy(&mut reader, &mut out).map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())?;
        Ok(written)
    }

    fn send_with_retry<F>(&self, mut send: F) -> Result<ureq::Response, String>
    where
        F: FnMut() -> Result<ureq::Response, ureq::Error>,
    {
        let mut attempt = 0usize;
        let mut backoff = self.backoff_ms;
        loop {
            attempt += 1;
            let retry_left = attempt <= self.retries;
            match send() {
                Ok(resp) if (200..300).contains(&resp.status()) => return Ok(resp),
                Ok(resp) => {
                    // 1xx/3xx that ureq did not follow
                    return Err(format!("HTTP {}", resp.status()));
                }
                Err(ureq::Error::Status(code, _)) => {
                    if retry_left && (code >= 500 || code == 429) {
                        std::thread::sleep(Duration::from_millis(backoff));
                        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_MS);
                        continue;
                    }
                    return Err(format!("HTTP {}", code));
                }
                Err(e) => {
                    if retry_left {
                        std::thread::sleep(Duration::from_millis(backoff));
                        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_MS);
                        continue;
                    }
                    return Err(e.to_string());
                }
            }
        }
    }
}
