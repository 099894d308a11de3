//! Tarball extraction: unpack into a private scratch dir, then move `package/` into place.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error_handling::FetchError;
use crate::utils;

/// npm wraps every published payload in this top-level directory.
pub const PACKAGE_DIR: &str = "package";

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Staging directory owned by one extraction. Removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `.npmget-extract-<pid>-<n>` under `parent`, clearing a stale one first.
    pub fn create_in(parent: &Path) -> std::io::Result<Self> {
        let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = parent.join(format!(".npmget-extract-{}-{}", std::process::id(), n));
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// What a completed extraction did with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// `package/` replaced the destination directory
    Relocated,
    /// Archive had no top-level `package/`; destination untouched
    PackageDirMissing,
}

/// Extract a `.tgz` so that `extract_to` holds exactly the archive's `package/` contents.
/// The tarball is deleted once extraction completes; on error it is left in place.
pub fn extract_package(tar_path: &Path, extract_to: &Path) -> Result<Extraction, FetchError> {
    utils::log(&format!("Extracting {}", tar_path.display()));
    let parent = extract_to
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| FetchError::extraction(parent, e))?;

    let outcome = {
        let scratch = ScratchDir::create_in(parent).map_err(|e| FetchError::extraction(parent, e))?;
        unpack_tgz(tar_path, scratch.path())?;

        let pkg_path = scratch.path().join(PACKAGE_DIR);
        // A symlinked `package` counts as missing; never follow it out of the scratch dir.
        let is_real_dir = fs::symlink_metadata(&pkg_path).map(|m| m.is_dir()).unwrap_or(false);
        if is_real_dir {
            replace_dir(&pkg_path, extract_to)?;
            utils::log(&format!("Extracted to {}", extract_to.display()));
            Extraction::Relocated
        } else {
            utils::log_warn(&format!(
                "no {}/ folder in {}; {} left unchanged",
                PACKAGE_DIR,
                tar_path.display(),
                extract_to.display()
            ));
            Extraction::PackageDirMissing
        }
    };

    if let Err(e) = fs::remove_file(tar_path) {
        utils::log_warn(&format!("could not remove {}: {}", tar_path.display(), e));
    }
    Ok(outcome)
}

/// Unpack a gzip tar into `dest`. `tar` refuses entries escaping `dest`.
fn unpack_tgz(tar_path: &Path, dest: &Path) -> Result<(), FetchError> {
    let f = File::open(tar_path).map_err(|e| FetchError::extraction(tar_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(f)));
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| FetchError::extraction(tar_path, format!("failed to unpack archive: {}", e)))
}

/// Remove whatever is at `dest`, then move `src` there. Never merges.
fn replace_dir(src: &Path, dest: &Path) -> Result<(), FetchError> {
    if dest.is_dir() {
        fs::remove_dir_all(dest).map_err(|e| FetchError::extraction(dest, e))?;
    } else if dest.exists() || dest.is_symlink() {
        fs::remove_file(dest).map_err(|e| FetchError::extraction(dest, e))?;
    }
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    // Cross-device: copy then delete.
    copy_dir_all(src, dest).map_err(|e| FetchError::extraction(dest, e))?;
    fs::remove_dir_all(src).map_err(|e| FetchError::extraction(src, e))
}

fn copy_dir_all(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else if ty.is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
