//! Utility functions

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Version information for the service
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
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Eight lowercase hex characters, for generated names
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// External tools the pipeline shells out to
const REQUIRED_TOOLS: [(&str, &str); 3] = [
    ("sh", "runs install and build commands"),
    ("git", "clones repository sources"),
    ("npm", "default install command"),
];

/// Print which external tools are reachable on PATH
pub async fn run_diagnostic() {
    let version = version_info();
    println!(
        "{} {} ({}, built {})",
        "sitedrop".bold(),
        version.version,
        version.git_hash,
        version.build_time
    );

    let mut missing = 0;
    for (tool, purpose) in REQUIRED_TOOLS {
        match which(tool) {
            Some(path) => println!("  {} {:<4} {} ({})", "ok".green(), tool, path.display(), purpose),
            None => {
                missing += 1;
                println!("  {} {:<4} not found on PATH ({})", "missing".red(), tool, purpose);
            }
        }
    }

    if missing == 0 {
        println!("{}", "All required tools found".green());
    } else {
        println!("{}", format!("{} required tool(s) missing", missing).yellow());
    }
}

fn which(tool: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}
