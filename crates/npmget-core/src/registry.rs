//! npm registry client: resolve `latest` to a tarball URL and download it.
//! All HTTP calls go through `crate::http_client`.

use std::path::Path;

use serde::Serialize;

use crate::error_handling::FetchError;
use crate::http_client::HttpClient;

/// A package name as typed by the user: `left-pad` or `@scope/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    name: String,
}

impl PackageSpec {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let name = raw.trim();
        let invalid = |reason: &str| FetchError::InvalidPackage {
            package: raw.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("empty package name"));
        }
        if let Some(rest) = name.strip_prefix('@') {
            let Some((scope, leaf)) = rest.split_once('/') else {
                return Err(invalid("scoped name must look like @scope/name"));
            };
            if scope.is_empty() || leaf.is_empty() || leaf.contains('/') {
                return Err(invalid("scoped name must look like @scope/name"));
            }
        } else if name.contains('/') {
            return Err(invalid("unscoped name cannot contain '/'"));
        }
        if name.split('/').any(|seg| seg == "." || seg == "..") {
            return Err(invalid("path segments '.' and '..' are not package names"));
        }
        Ok(Self { name: name.to_string() })
    }

    /// Full name, scope included. Used verbatim in the registry path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final path segment: `@scope/name` -> `name`.
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Filesystem-safe tarball name: `@scope/name` -> `@scope_name.tgz`.
    pub fn tarball_file_name(&self) -> String {
        format!("{}.tgz", self.name.replace('/', "_"))
    }
}

/// The `latest` version of a package and where its tarball lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarball {
    pub version: String,
    pub tarball: String,
}

/// Metadata URL. Scope and slash stay as-is: `<registry>/@scope/name`.
pub fn metadata_url(registry: &str, package: &str) -> String {
    format!("{}/{}", registry.trim_end_matches('/'), package.trim_start_matches('/'))
}

/// Walk `dist-tags.latest` -> `versions[latest].dist.tarball`.
pub fn latest_tarball(meta: &serde_json::Value) -> Result<ResolvedTarball, String> {
    let version = meta
        .get("dist-tags")
        .and_then(|t| t.as_object())
        .and_then(|t| t.get("latest"))
        .and_then(|v| v.as_str())
        .ok_or("no dist-tags.latest in metadata")?;
    let ver_obj = meta
        .get("versions")
        .and_then(|v| v.as_object())
        .and_then(|v| v.get(version))
        .ok_or_else(|| format!("latest version {} missing from versions", version))?;
    let tarball = ver_obj
        .get("dist")
        .and_then(|d| d.as_object())
        .and_then(|d| d.get("tarball"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| format!("no dist.tarball for version {}", version))?;
    if !(tarball.starts_with("https://") || tarball.starts_with("http://")) {
        return Err(format!("tarball URL is not http(s): {}", tarball));
    }
    Ok(ResolvedTarball { version: version.to_string(), tarball: tarball.to_string() })
}

/// Fetch package metadata and return the tarball for `latest`.
pub fn resolve_tarball_url(
    client: &HttpClient,
    registry: &str,
    package: &str,
) -> Result<ResolvedTarball, FetchError> {
    if package.trim().is_empty() {
        return Err(FetchError::resolution(package, "empty package name"));
    }
    let url = metadata_url(registry, package);
    let body = client
        .get_bytes(&url)
        .map_err(|e| FetchError::resolution(package, e))?;
    let meta: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| FetchError::resolution(package, format!("invalid metadata JSON: {}", e)))?;
    latest_tarball(&meta).map_err(|e| FetchError::resolution(package, e))
}

/// Download tarball from URL to a file, overwriting it.
pub fn download_tarball(client: &HttpClient, url: &str, dest: &Path) -> Result<u64, FetchError> {
    client.get_to_file(url, dest).map_err(|e| FetchError::download(url, e))
}
