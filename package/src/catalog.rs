//! Package catalog
//!
//! Maps target references to package definitions so transitive dependency
//! walks can look up what a target itself depends on.

use crate::types::PackageDefinition;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Known package definitions keyed by target
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    packages: BTreeMap<String, PackageDefinition>,
}

impl PackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package under its target, replacing any previous entry
    pub fn insert(&mut self, pkg: PackageDefinition) {
        self.packages.insert(pkg.target(), pkg);
    }

    pub fn get(&self, target: &str) -> Option<&PackageDefinition> {
        self.packages.get(target)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDefinition> {
        self.packages.values()
    }

    /// Load every `*.toml` definition under `dir`
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("toml")
            {
                continue;
            }

            match PackageDefinition::load(path) {
                Ok(pkg) => {
                    debug!("Catalog: {} from {}", pkg.target(), path.display());
                    catalog.insert(pkg);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(catalog)
    }
}

impl FromIterator<PackageDefinition> for PackageCatalog {
    fn from_iter<T: IntoIterator<Item = PackageDefinition>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for pkg in iter {
            catalog.insert(pkg);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("zlib.toml"),
            "category = \"sys-libs\"\nname = \"zlib\"\nversion = \"1.3\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "name = ").unwrap();
        std::fs::write(dir.path().join("README"), "not a package").unwrap();

        let catalog = PackageCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("//sys-libs/zlib").is_some());
    }
}
