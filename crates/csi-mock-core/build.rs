//! Embeds the revision, build time and profile that `GetPluginInfo` reports
//! in its vendor manifest.
//!
//! Packaged builds without a checkout can pin values through the same
//! variable names; `SOURCE_DATE_EPOCH` pins the timestamp for reproducible
//! images.

use std::env;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const REVISION: &str = "CSI_MOCK_GIT_HASH";
const TIMESTAMP: &str = "CSI_MOCK_BUILD_TIMESTAMP";
const PROFILE: &str = "CSI_MOCK_BUILD_PROFILE";

/// Stdout of `git <args>`, trimmed, when git runs and succeeds.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn pinned(var: &str) -> Option<String> {
    println!("cargo:rerun-if-env-changed={var}");
    env::var(var).ok().filter(|v| !v.is_empty())
}

fn revision() -> String {
    pinned(REVISION)
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".into())
}

fn timestamp() -> String {
    pinned(TIMESTAMP)
        .or_else(|| pinned("SOURCE_DATE_EPOCH"))
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
                .to_string()
        })
}

/// Rebuild when HEAD moves, wherever the git directory lives.
fn watch_head() {
    let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) else {
        return;
    };
    let git_dir = PathBuf::from(git_dir);
    for entry in ["HEAD", "refs"] {
        println!("cargo:rerun-if-changed={}", git_dir.join(entry).display());
    }
}

fn main() {
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".into());
    for (key, value) in [
        (REVISION, revision()),
        (TIMESTAMP, timestamp()),
        (PROFILE, profile),
    ] {
        println!("cargo:rustc-env={key}={value}");
    }
    watch_head();
}
