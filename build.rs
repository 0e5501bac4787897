//! Build script for persona-builder
//!
//! Embeds the git revision, build timestamp, target and compiler into the
//! binary so `persona-builder version` can report them.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = run("git", &["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(unknown);
    let git_branch = run("git", &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(unknown);
    let git_dirty = match run("git", &["status", "--porcelain"]) {
        Some(status) if !status.is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };
    let rustc_version = run("rustc", &["--version"]).unwrap_or_else(unknown);

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| unknown());
    let profile = env::var("PROFILE").unwrap_or_else(|_| unknown());

    let vars = [
        ("PERSONA_GIT_HASH", git_hash.as_str()),
        ("PERSONA_GIT_BRANCH", git_branch.as_str()),
        ("PERSONA_GIT_DIRTY", git_dirty),
        ("PERSONA_BUILD_TIMESTAMP", build_timestamp.as_str()),
        ("PERSONA_TARGET", target.as_str()),
        ("PERSONA_PROFILE", profile.as_str()),
        ("PERSONA_RUSTC_VERSION", rustc_version.as_str()),
    ];
    for (key, value) in vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Run a command and return its trimmed stdout, or None if it failed
fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn unknown() -> String {
    "unknown".to_string()
}
