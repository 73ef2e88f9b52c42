//! Build metadata embedded by the build script.
//!
//! Surfaced through `--version`, the startup log line, and the identity
//! role's plugin manifest.

use std::collections::BTreeMap;

/// Short git commit hash at build time, or `unknown` outside a checkout.
pub const GIT_HASH: &str = env!("CSI_MOCK_GIT_HASH");

/// Build timestamp as Unix epoch seconds.
pub const BUILD_TIMESTAMP: &str = env!("CSI_MOCK_BUILD_TIMESTAMP");

/// Cargo build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("CSI_MOCK_BUILD_PROFILE");

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string including git hash and profile, e.g. `"0.1.0 (abc1234, debug)"`.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// Vendor manifest reported by `GetPluginInfo`.
pub fn manifest() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("git_hash".to_string(), GIT_HASH.to_string()),
        ("build_profile".to_string(), BUILD_PROFILE.to_string()),
        ("build_timestamp".to_string(), BUILD_TIMESTAMP.to_string()),
    ])
}
