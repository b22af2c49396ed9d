//! Build profile
//!
//! A [`BuildProfile`] bundles every input that is global to a build
//! invocation. It is constructed once and passed by reference into each
//! resolution call, so resolving the same package against the same profile
//! always yields the same result regardless of load order.

use crate::buckconfig::{parse_bool, BuckConfigFile};
use crate::mirrors::MirrorGroups;
use crate::use_config::{UseConfig, UseToggles};
use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Platform names dependencies are resolved against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platforms {
    /// Platform the package is built for
    pub target: String,
    /// Platform build tools execute on
    pub host: String,
}

impl Default for Platforms {
    fn default() -> Self {
        let arch = std::env::consts::ARCH.to_string();
        Self {
            target: arch.clone(),
            host: arch,
        }
    }
}

/// Immutable per-invocation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProfile {
    /// USE flag layers
    pub use_flags: UseConfig,
    /// Mirror groups for `mirror://` source URIs
    pub mirrors: MirrorGroups,
    /// Target and host platforms
    pub platforms: Platforms,
    /// Bootstrap packages may use the host toolchain instead of being pinned locally
    pub use_host_toolchain: bool,
    /// Run the optional test phase
    pub run_tests: bool,
}

impl BuildProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from a merged buckconfig
    pub fn from_buckconfig(config: &BuckConfigFile) -> Result<Self> {
        let use_flags = UseConfig::from_buckconfig(config)?;

        let mirrors = config
            .section("mirrors")
            .map(MirrorGroups::from_section)
            .unwrap_or_default();

        let mut platforms = Platforms::default();
        if let Some(target) = config.get("buckos", "target_platform") {
            platforms.target = target.to_string();
        }
        if let Some(host) = config.get("buckos", "host_platform") {
            platforms.host = host.to_string();
        }

        let use_host_toolchain = read_bool(config, "buckos", "use_host_toolchain")?;
        let run_tests = read_bool(config, "buckos", "run_tests")?;

        debug!(
            "Loaded profile: {} global USE toggles, {} package sections, {} mirror groups",
            use_flags.global.enabled.len() + use_flags.global.disabled.len(),
            use_flags.packages.len(),
            mirrors.len()
        );

        Ok(Self {
            use_flags,
            mirrors,
            platforms,
            use_host_toolchain,
            run_tests,
        })
    }

    /// Load buckconfig files in order, apply `section.key=value` overrides, build a profile
    pub fn load(paths: &[PathBuf], overrides: &[String]) -> Result<Self> {
        let mut config = BuckConfigFile::load_all(paths)?;
        for spec in overrides {
            config.apply_override(spec)?;
        }
        Self::from_buckconfig(&config)
    }

    /// Load a profile serialized as TOML
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Global USE layer, including USE_EXPAND
    pub fn global_use(&self) -> UseToggles {
        self.use_flags.global_layer()
    }

    /// Per-package USE layer for `package`
    pub fn package_use(&self, package: &str) -> UseToggles {
        self.use_flags.package_layer(package)
    }

    /// Copy of this profile with the test phase requested or not
    pub fn with_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }
}

fn read_bool(config: &BuckConfigFile, section: &str, key: &str) -> Result<bool> {
    match config.get(section, key) {
        Some(value) => Ok(parse_bool(section, key, value)?.unwrap_or(false)),
        None => Ok(false),
    }
}
