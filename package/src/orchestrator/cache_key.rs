//! Cache key composition
//!
//! A descriptor captures every input that can change a package's output.
//! Its fingerprint is the SHA-256 of the descriptor's JSON form; all maps are
//! ordered so equal inputs always hash equally.

use crate::types::{BootstrapStage, PackageMetadata};
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Inputs that determine a package build's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyDescriptor {
    /// `category/name-version`
    pub package: String,
    pub slot: String,
    pub eapi: u32,
    pub bootstrap_stage: BootstrapStage,
    /// Canonical enabled USE flags
    pub use_flags: String,
    pub use_args: Vec<String>,
    /// Target-platform build inputs → output fingerprint
    pub dependencies: BTreeMap<String, String>,
    /// Host-platform tools → output fingerprint
    pub host_dependencies: BTreeMap<String, String>,
    /// Post-merge dependencies → output fingerprint
    ///
    /// These never gate a phase but still invalidate the key.
    pub pdepend: BTreeMap<String, String>,
    /// Phase function name → script body
    pub phases: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub patches: Vec<String>,
    pub sources: Vec<String>,
    pub metadata: PackageMetadata,
}

impl CacheKeyDescriptor {
    /// Hex SHA-256 of the canonical JSON serialization
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Look up output fingerprints for `targets`; unknown targets map to ""
pub fn fingerprints_for<'a>(
    targets: impl IntoIterator<Item = &'a String>,
    known: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    targets
        .into_iter()
        .map(|t| (t.clone(), known.get(t).cloned().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> CacheKeyDescriptor {
        CacheKeyDescriptor {
            package: "sys-libs/zlib-1.3".to_string(),
            slot: "0".to_string(),
            eapi: 8,
            bootstrap_stage: BootstrapStage::None,
            use_flags: "static-libs".to_string(),
            use_args: Vec::new(),
            dependencies: BTreeMap::new(),
            host_dependencies: BTreeMap::new(),
            pdepend: BTreeMap::new(),
            phases: BTreeMap::new(),
            env: BTreeMap::new(),
            patches: Vec::new(),
            sources: Vec::new(),
            metadata: PackageMetadata::default(),
        }
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = descriptor().fingerprint().unwrap();
        let b = descriptor().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pdepend_changes_fingerprint() {
        let base = descriptor();
        let mut changed = descriptor();
        changed
            .pdepend
            .insert("//pkg/docs".to_string(), "abc".to_string());
        assert_ne!(base.fingerprint().unwrap(), changed.fingerprint().unwrap());
    }

    #[test]
    fn test_unknown_fingerprints_are_empty() {
        let mut known = BTreeMap::new();
        known.insert("//pkg/a".to_string(), "f00".to_string());
        let targets = vec!["//pkg/a".to_string(), "//pkg/b".to_string()];
        let map = fingerprints_for(&targets, &known);
        assert_eq!(map["//pkg/a"], "f00");
        assert_eq!(map["//pkg/b"], "");
    }
}
