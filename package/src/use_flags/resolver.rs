//! Layered USE flag resolution
//!
//! Resolution applies four layers in a fixed order:
//!
//! 1. `use_defaults` seed the set unconditionally
//! 2. global enables, kept only for flags in IUSE
//! 3. global disables, applied unconditionally
//! 4. per-package enables then disables, with the same rules, applied last
//!
//! Enabling checks IUSE membership and disabling does not, so a disable
//! always wins over any earlier layer.

use super::registry::FlagRegistry;
use crate::types::PackageDefinition;
use buckos_config::{BuildProfile, UseToggles};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::debug;

/// Effective USE flags for one package under one profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveUseSet {
    enabled: BTreeSet<String>,
    iuse: BTreeSet<String>,
}

impl EffectiveUseSet {
    pub fn from_flags<E, I>(enabled: E, iuse: I) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
            iuse: iuse.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_enabled(&self, flag: &str) -> bool {
        self.enabled.contains(flag)
    }

    /// Enabled flags, sorted
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(|f| f.as_str())
    }

    pub fn enabled_set(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    pub fn iuse(&self) -> &BTreeSet<String> {
        &self.iuse
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Flag → enabled over IUSE plus every enabled flag
    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.iuse
            .iter()
            .chain(self.enabled.iter())
            .map(|flag| (flag.clone(), self.enabled.contains(flag)))
            .collect()
    }

    /// Sorted, comma-joined enabled flags
    pub fn canonical(&self) -> String {
        self.enabled().collect::<Vec<_>>().join(",")
    }

    /// Space-joined enabled flags, as exported in `USE`
    pub fn use_string(&self) -> String {
        self.enabled().collect::<Vec<_>>().join(" ")
    }

    /// Build labels describing declared and enabled flags
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .iuse
            .iter()
            .map(|flag| format!("buckos:iuse:{flag}"))
            .collect();
        labels.extend(self.enabled.iter().map(|flag| format!("buckos:use:{flag}")));
        labels
    }

    /// Environment variables exported to every phase
    pub fn env(&self) -> BTreeMap<String, String> {
        let use_string = self.use_string();
        let mut env = BTreeMap::new();
        env.insert("USE".to_string(), use_string.clone());
        env.insert("BUCKOS_USE".to_string(), use_string);
        env.insert(
            "IUSE".to_string(),
            self.iuse.iter().cloned().collect::<Vec<_>>().join(" "),
        );
        env
    }
}

/// Computes effective USE sets
pub struct UseResolver;

impl UseResolver {
    /// Resolve from explicit layers
    pub fn resolve(
        iuse: &[String],
        use_defaults: &[String],
        global_use: &UseToggles,
        package_overrides: &UseToggles,
    ) -> EffectiveUseSet {
        let declared: BTreeSet<String> = iuse.iter().cloned().collect();
        let mut enabled: BTreeSet<String> = use_defaults.iter().cloned().collect();

        for layer in [global_use, package_overrides] {
            for flag in &layer.enabled {
                if declared.contains(flag) {
                    enabled.insert(flag.clone());
                }
            }
            for flag in &layer.disabled {
                enabled.remove(flag);
            }
        }

        EffectiveUseSet {
            enabled,
            iuse: declared,
        }
    }

    /// Resolve a package against a profile
    pub fn resolve_package(pkg: &PackageDefinition, profile: &BuildProfile) -> EffectiveUseSet {
        let use_set = Self::resolve(
            &pkg.iuse,
            &pkg.use_defaults,
            &profile.global_use(),
            &profile.package_use(&pkg.name),
        );
        debug!("{}: USE=\"{}\"", pkg.identity(), use_set.use_string());
        use_set
    }
}

/// Why a requested flag produced a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Not in IUSE and not a known global flag
    UnknownFlag,
    /// Not a syntactically valid flag name
    InvalidName,
}

/// Non-fatal USE flag problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub flag: String,
    pub kind: WarningKind,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            WarningKind::UnknownFlag => write!(
                f,
                "USE flag '{}' is neither in IUSE nor a known global flag",
                self.flag
            ),
            WarningKind::InvalidName => write!(f, "invalid USE flag name '{}'", self.flag),
        }
    }
}

fn flag_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9+_@-]*$").ok())
        .as_ref()
}

/// Warn about requested flags the package and registry do not know
pub fn validate_use_flags<'a>(
    requested: impl IntoIterator<Item = &'a String>,
    iuse: &[String],
    registry: &FlagRegistry,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen = BTreeSet::new();

    for flag in requested {
        if !seen.insert(flag.as_str()) {
            continue;
        }
        if let Some(pattern) = flag_name_pattern() {
            if !pattern.is_match(flag) {
                warnings.push(ValidationWarning {
                    flag: flag.clone(),
                    kind: WarningKind::InvalidName,
                });
                continue;
            }
        }
        if !iuse.contains(flag) && !registry.contains(flag) {
            warnings.push(ValidationWarning {
                flag: flag.clone(),
                kind: WarningKind::UnknownFlag,
            });
        }
    }

    warnings
}
