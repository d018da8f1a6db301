/// Build identity reported by `--version`, the bootstrap log event and the
/// `vod_sync_build_info` metric.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT_HASH: &str = env!("VOD_SYNC_GIT_COMMIT_HASH");
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("VOD_SYNC_GIT_COMMIT_HASH")
);

/// Returns the first 12 characters of the commit hash, or `"unknown"` when the
/// build ran outside a git checkout.
pub fn short_commit_hash() -> &'static str {
    GIT_COMMIT_HASH.get(..12).unwrap_or(GIT_COMMIT_HASH)
}
