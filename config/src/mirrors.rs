//! Mirror groups
//!
//! Source URIs may name a mirror group instead of a host
//! (`mirror://gnu/bash/bash-5.2.tar.gz`). Groups come from the `[mirrors]`
//! section, one whitespace-separated list of base URLs per group.

use crate::buckconfig::BuckConfigSection;
use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const MIRROR_SCHEME: &str = "mirror://";

/// Named mirror groups, each an ordered list of base URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorGroups {
    groups: IndexMap<String, Vec<String>>,
}

impl MirrorGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group, replacing an existing one of the same name
    pub fn insert(&mut self, group: impl Into<String>, mirrors: Vec<String>) {
        self.groups.insert(group.into(), mirrors);
    }

    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(|m| m.as_slice())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Parse a `[mirrors]` section
    pub fn from_section(section: &BuckConfigSection) -> Self {
        let mut mirrors = Self::new();
        for (group, value) in &section.values {
            let urls = value
                .split_whitespace()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect();
            mirrors.insert(group.as_str(), urls);
        }
        mirrors
    }

    /// Expand a source URI into concrete URLs
    ///
    /// Plain URIs are returned unchanged. A `mirror://` URI naming a group
    /// that is not configured is a configuration error.
    pub fn expand_uri(&self, uri: &str) -> Result<Vec<String>> {
        let Some(rest) = uri.strip_prefix(MIRROR_SCHEME) else {
            return Ok(vec![uri.to_string()]);
        };

        let (group, path) = rest
            .split_once('/')
            .filter(|(group, path)| !group.is_empty() && !path.is_empty())
            .ok_or_else(|| ConfigError::InvalidMirrorUri(uri.to_string()))?;

        let mirrors = self
            .groups
            .get(group)
            .ok_or_else(|| ConfigError::UnknownMirror(group.to_string()))?;

        Ok(mirrors
            .iter()
            .map(|base| format!("{}/{}", base, path))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckconfig::BuckConfigFile;

    fn groups() -> MirrorGroups {
        let config = BuckConfigFile::parse_str(
            "[mirrors]\ngnu = https://ftp.gnu.org/gnu/ https://mirrors.kernel.org/gnu\n",
        )
        .unwrap();
        MirrorGroups::from_section(config.section("mirrors").unwrap())
    }

    #[test]
    fn test_expand_known_group() {
        let urls = groups().expand_uri("mirror://gnu/bash/bash-5.2.tar.gz").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://ftp.gnu.org/gnu/bash/bash-5.2.tar.gz".to_string(),
                "https://mirrors.kernel.org/gnu/bash/bash-5.2.tar.gz".to_string(),
            ]
        );
    }

    #[test]
    fn test_plain_uri_passthrough() {
        let urls = groups().expand_uri("https://example.org/a.tar.xz").unwrap();
        assert_eq!(urls, vec!["https://example.org/a.tar.xz".to_string()]);
    }

    #[test]
    fn test_unknown_group_fails() {
        let err = groups().expand_uri("mirror://sourceforge/x.tgz").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMirror(g) if g == "sourceforge"));
    }

    #[test]
    fn test_malformed_mirror_uri() {
        assert!(matches!(
            groups().expand_uri("mirror://gnu"),
            Err(ConfigError::InvalidMirrorUri(_))
        ));
    }
}
