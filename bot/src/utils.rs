//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("DEPLOYBOT_GIT_HASH")
            .unwrap_or("unknown")
            .to_string(),
        build_time: option_env!("DEPLOYBOT_BUILD_TIME")
            .unwrap_or("unknown")
            .to_string(),
    }
}
