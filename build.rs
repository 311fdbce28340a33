//! Stamps the `av` binary with when and from which commit it was built.
//!
//! Exposed at compile time as `AV_BUILD_TIMESTAMP` (UTC, ISO 8601) and
//! `AV_GIT_COMMIT` (short hash, `unknown` outside a git checkout).

use std::process::Command;

fn short_commit() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())?;
    let hash = String::from_utf8(out.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    for watched in [".git/HEAD", ".git/index"] {
        println!("cargo:rerun-if-changed={watched}");
    }

    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=AV_BUILD_TIMESTAMP={built_at}");
    println!(
        "cargo:rustc-env=AV_GIT_COMMIT={}",
        short_commit().as_deref().unwrap_or("unknown")
    );
}
