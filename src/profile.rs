//! Build profile discovery for the CLI
//!
//! Finds the `.buckconfig` files that make up the active profile and loads
//! them, later files overriding earlier ones.

use anyhow::{Context, Result};
use config::BuildProfile;
use std::path::PathBuf;
use tracing::debug;

/// Standard buckconfig locations, lowest priority first
pub const STANDARD_CONFIG_LOCATIONS: &[&str] = &["/etc/buckos/buckconfig", "/etc/buckos/.buckconfig"];

/// Environment variable naming an extra buckconfig file
pub const CONFIG_ENV: &str = "BUCKOS_BUCKCONFIG";

/// Collect buckconfig files in load order
///
/// 1. Standard system locations that exist
/// 2. `~/.buckconfig`
/// 3. `./.buckconfig`
/// 4. `BUCKOS_BUCKCONFIG`
/// 5. Files given with `--buckconfig`, in order
///
/// Explicitly named files must exist; discovered ones are skipped when missing.
pub fn config_paths(explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut discovered: Vec<PathBuf> = STANDARD_CONFIG_LOCATIONS
        .iter()
        .map(PathBuf::from)
        .collect();

    if let Ok(home) = std::env::var("HOME") {
        discovered.push(PathBuf::from(home).join(".buckconfig"));
    }
    discovered.push(PathBuf::from("./.buckconfig"));

    let mut paths: Vec<PathBuf> = discovered.into_iter().filter(|p| p.is_file()).collect();

    let mut required: Vec<PathBuf> = Vec::new();
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        required.push(PathBuf::from(env_path));
    }
    required.extend(explicit.iter().cloned());

    for path in required {
        if !path.is_file() {
            anyhow::bail!("buckconfig file not found: {}", path.display());
        }
        paths.push(path);
    }

    for path in &paths {
        debug!("Using buckconfig {}", path.display());
    }
    Ok(paths)
}

/// Load the profile from discovered files plus `section.key=value` overrides
pub fn load_profile(explicit: &[PathBuf], overrides: &[String]) -> Result<BuildProfile> {
    let paths = config_paths(explicit)?;
    BuildProfile::load(&paths, overrides).context("Failed to load build profile")
}
