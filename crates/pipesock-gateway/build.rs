use std::process::Command;

/// Run a git subcommand, returning trimmed stdout on success.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    // PIPESOCK_GIT_SHA may be preset by packaging scripts building from a tarball.
    let sha = std::env::var("PIPESOCK_GIT_SHA")
        .ok()
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=PIPESOCK_GIT_SHA={sha}");

    println!("cargo:rerun-if-env-changed=PIPESOCK_GIT_SHA");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
