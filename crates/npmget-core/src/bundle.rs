//! Re-archive an extracted package as `<leaf>.zip`.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error_handling::FetchError;
use crate::utils;

/// Zip `node_modules_dir/<leaf_name>` into `output_dir/<leaf_name>.zip`.
/// Entry names are relative to the package root and always use `/`.
pub fn zip_package_dir(
    leaf_name: &str,
    node_modules_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf, FetchError> {
    let source = node_modules_dir.join(leaf_name);
    let zip_path = output_dir.join(format!("{}.zip", leaf_name));
    utils::log(&format!("Zipping {}", zip_path.display()));

    if !source.is_dir() {
        return Err(FetchError::MissingSource { path: source.display().to_string() });
    }
    fs::create_dir_all(output_dir).map_err(|e| FetchError::packaging(output_dir, e))?;

    match write_zip(&source, &zip_path) {
        Ok(count) => {
            utils::log(&format!("Created {} ({} files)", zip_path.display(), count));
            Ok(zip_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&zip_path);
            Err(FetchError::packaging(&zip_path, e))
        }
    }
}

fn write_zip(source: &Path, zip_path: &Path) -> io::Result<usize> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let mut count = 0;

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry_name(source, entry.path()) else {
            continue;
        };
        let mut options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(mode) = unix_mode(&entry) {
            options = options.unix_permissions(mode);
        }
        zip.start_file(name, options).map_err(zip_to_io)?;
        let mut f = File::open(entry.path())?;
        io::copy(&mut f, &mut zip)?;
        count += 1;
    }

    let mut inner = zip.finish().map_err(zip_to_io)?;
    io::Write::flush(&mut inner)?;
    Ok(count)
}

/// Relative path with `/` separators, or None for the root itself.
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(unix)]
fn unix_mode(entry: &walkdir::DirEntry) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    entry.metadata().ok().map(|m| m.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn unix_mode(_entry: &walkdir::DirEntry) -> Option<u32> {
    None
}

fn zip_to_io(e: zip::result::ZipError) -> io::Error {
    match e {
        zip::result::ZipError::Io(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_zip(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut out = Vec::new();
        for i in 0..archive.len() {
            let mut f = archive.by_index(i).unwrap();
            let mut buf = Vec::new();
            f.read_to_end(&mut buf).unwrap();
            out.push((f.name().to_string(), buf));
        }
        out.sort();
        out
    }

    #[test]
    fn test_zip_preserves_relative_paths_and_bytes() {
        let td = tempfile::tempdir().unwrap();
        let nm = td.path().join("node_modules");
        let pkg = nm.join("demo");
        fs::create_dir_all(pkg.join("sub")).unwrap();
        fs::write(pkg.join("a.txt"), b"alpha\n").unwrap();
        fs::write(pkg.join("sub").join("b.txt"), [0u8, 1, 2, 255]).unwrap();
        fs::create_dir_all(pkg.join("empty")).unwrap();

        let out = td.path().join("out");
        let zip_path = zip_package_dir("demo", &nm, &out).unwrap();
        assert_eq!(zip_path, out.join("demo.zip"));

        let entries = read_zip(&zip_path);
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), b"alpha\n".to_vec()),
                ("sub/b.txt".to_string(), vec![0u8, 1, 2, 255]),
            ]
        );
    }

    #[test]
    fn test_zip_uses_deflate() {
        let td = tempfile::tempdir().unwrap();
        let pkg = td.path().join("p");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("big.txt"), "x".repeat(10_000)).unwrap();

        let zip_path = zip_package_dir("p", td.path(), td.path()).unwrap();
        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let f = archive.by_name("big.txt").unwrap();
        assert_eq!(f.compression(), CompressionMethod::Deflated);
        assert!(f.compressed_size() < f.size());
    }

    #[test]
    fn test_zip_missing_source_creates_nothing() {
        let td = tempfile::tempdir().unwrap();
        let out = td.path().join("out");
        let err = zip_package_dir("ghost", &td.path().join("node_modules"), &out).unwrap_err();
        assert_eq!(err.kind(), "missing_source");
        assert!(!out.join("ghost.zip").exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_entry_name_normalizes_separators() {
        let root = Path::new("root");
        let p = root.join("a").join("b.js");
        assert_eq!(entry_name(root, &p).as_deref(), Some("a/b.js"));
        assert_eq!(entry_name(root, root), None);
    }
}
