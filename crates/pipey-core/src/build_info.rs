//! Build metadata, logged once when pipey starts.

pub const GIT_HASH: &str = env!("PIPEY_GIT_HASH");
/// Unix seconds.
pub const BUILD_TIMESTAMP: &str = env!("PIPEY_BUILD_TIMESTAMP");
pub const BUILD_PROFILE: &str = env!("PIPEY_BUILD_PROFILE");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `"0.1.0 (abc1234, debug)"`, as written to the startup log line.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
