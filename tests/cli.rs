//! Integration tests: run the npmget binary and check exit codes and output.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::Command;
use std::thread;

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn npmget(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_npmget"));
    cmd.current_dir(cwd)
        .env("HOME", cwd)
        .env("NPMGET_HTTP_RETRIES", "0")
        .env("NPMGET_HTTP_TIMEOUT_SECS", "5")
        .env("NO_COLOR", "1")
        .env_remove("NPMGET_QUIET")
        .env_remove("NPMGET_REGISTRY");
    cmd
}

/// Serves one package, `left-pad@1.3.0`, then stops accepting.
fn serve_left_pad() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let meta = format!(
        r#"{{"dist-tags":{{"latest":"1.3.0"}},"versions":{{"1.3.0":{{"dist":{{"tarball":"{}/left-pad/-/left-pad-1.3.0.tgz"}}}}}}}}"#,
        base
    )
    .into_bytes();

    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::default(),
    ));
    for (name, body) in [("package/index.js", "pad"), ("package/lib/x.js", "x")] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    let tgz = builder.into_inner().unwrap().finish().unwrap();

    thread::spawn(move || {
        for mut stream in listener.incoming().flatten().take(2) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&buf).to_string();
            let body = if head.starts_with("GET /left-pad ") { &meta } else { &tgz };
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(body);
        }
    });
    base
}

#[test]
fn test_help() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path()).arg("--help").output().unwrap();
    assert!(out.status.success(), "npmget --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--zip"));
    assert!(stdout.contains("--output"));
    assert!(stdout.contains("--packages"));
}

#[test]
fn test_version() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path()).arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_packages_fails() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path()).output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_failed_package_still_exits_zero() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path())
        .args(["left-pad", "--registry", UNREACHABLE, "-o", "out"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let abs = std::fs::canonicalize(td.path().join("out")).unwrap();
    assert!(stdout.contains("==== [1/1] left-pad ===="));
    assert!(stdout.contains(&format!("Done: output → {}", abs.display())));
    assert!(td.path().join("out/node_modules").is_dir());
}

#[test]
fn test_strict_exits_nonzero_on_failure() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path())
        .args(["-p", "left-pad", "--registry", UNREACHABLE, "--strict"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_json_summary() {
    let td = tempfile::tempdir().unwrap();
    let out = npmget(td.path())
        .args(["a", "@s/b", "--registry", UNREACHABLE, "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    let reports = v["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["package"], "a");
    assert_eq!(reports[1]["leaf_name"], "b");
    assert_eq!(reports[1]["outcome"], "unresolved");
    assert_eq!(reports[1]["error"]["kind"], "resolution");
}

#[test]
fn test_left_pad_zip_end_to_end() {
    let td = tempfile::tempdir().unwrap();
    let registry = serve_left_pad();
    let out = npmget(td.path())
        .args(["-p", "left-pad", "-o", "./out", "--zip", "--registry", &registry])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let root = td.path().join("out");
    assert_eq!(std::fs::read_to_string(root.join("node_modules/left-pad/index.js")).unwrap(), "pad");
    assert!(root.join("left-pad.zip").is_file());
    assert!(!root.join("left-pad.tgz").exists());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let abs = std::fs::canonicalize(&root).unwrap();
    assert!(stdout.contains(&abs.display().to_string()));
}
