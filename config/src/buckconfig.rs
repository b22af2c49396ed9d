//! .buckconfig file parsing
//!
//! Build profiles are read from the same INI-style files Buck2 consumes, so
//! the `[use]`, `[use.<pkg>]`, `[use_expand]` and `[mirrors]` sections stay
//! the single source of truth for both the build graph and this engine.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Represents a parsed .buckconfig file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuckConfigFile {
    /// Sections in the config file
    pub sections: BTreeMap<String, BuckConfigSection>,
    /// Source paths of the files merged into this config, in load order
    pub sources: Vec<PathBuf>,
}

/// A section within a .buckconfig file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuckConfigSection {
    /// Key-value pairs in the section
    pub values: BTreeMap<String, String>,
}

impl BuckConfigFile {
    /// Create a new empty config file
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a .buckconfig file from the given path
    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse_str(&content)?;
        config.sources.push(path.to_path_buf());
        Ok(config)
    }

    /// Parse a .buckconfig from a string
    pub fn parse_str(content: &str) -> Result<Self> {
        let mut config = BuckConfigFile::default();
        let mut current_section: Option<String> = None;

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_string();
                config.sections.entry(name.clone()).or_default();
                current_section = Some(name);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse {
                    line: line_num + 1,
                    message: format!("Invalid line in .buckconfig: {}", line),
                });
            };

            let Some(section) = current_section.as_ref() else {
                return Err(ConfigError::Parse {
                    line: line_num + 1,
                    message: format!("Key-value pair outside of section: {}", line),
                });
            };

            config
                .sections
                .entry(section.clone())
                .or_default()
                .values
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(config)
    }

    /// Get a value from the config
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.values.get(key))
            .map(|s| s.as_str())
    }

    /// Get a whole section
    pub fn section(&self, section: &str) -> Option<&BuckConfigSection> {
        self.sections.get(section)
    }

    /// Iterate over sections named `<prefix>.<suffix>`, yielding the suffix
    pub fn subsections<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a BuckConfigSection)> + 'a {
        self.sections.iter().filter_map(move |(name, section)| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
                .filter(|suffix| !suffix.is_empty())
                .map(|suffix| (suffix, section))
        })
    }

    /// Set a value in the config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .values
            .insert(key.to_string(), value.to_string());
    }

    /// Apply a `section.key=value` override, as passed with `-c` on the command line
    ///
    /// The key is split at the last dot so per-package sections such as
    /// `use.openssl.ssl=false` can be addressed.
    pub fn apply_override(&mut self, spec: &str) -> Result<()> {
        let (path, value) = spec
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(spec.to_string()))?;
        let (section, key) = path
            .trim()
            .rsplit_once('.')
            .filter(|(s, k)| !s.is_empty() && !k.is_empty())
            .ok_or_else(|| ConfigError::InvalidOverride(spec.to_string()))?;

        self.set(section, key, value.trim());
        Ok(())
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: &BuckConfigFile) {
        for (section_name, section) in &other.sections {
            let target_section = self.sections.entry(section_name.clone()).or_default();

            for (key, value) in &section.values {
                target_section.values.insert(key.clone(), value.clone());
            }
        }
        self.sources.extend(other.sources.iter().cloned());
    }

    /// Load and merge several config files; later files win
    pub fn load_all(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::new();
        for path in paths {
            config.merge(&Self::parse(path)?);
        }
        Ok(config)
    }
}

/// Parse a buckconfig boolean
///
/// Returns `Ok(None)` for an empty value, which Buck2 treats as unset.
pub fn parse_bool(section: &str, key: &str, value: &str) -> Result<Option<bool>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
