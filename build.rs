use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_COMMIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let commit = std::env::var("SOURCE_COMMIT_HASH")
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(git_head)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=VOD_SYNC_GIT_COMMIT_HASH={commit}");
}

/// Full hash of `HEAD`, or `None` outside a git checkout.
fn git_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    String::from_utf8(output.stdout)
        .ok()
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
}
