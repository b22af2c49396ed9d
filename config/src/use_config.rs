//! USE flag layers read from .buckconfig
//!
//! - `[use]` holds the global layer (`flag = true|false`, empty means unset)
//! - `[use.<pkgname>]` holds per-package overrides
//! - `[use_expand]` holds USE_EXPAND variables (`video_cards = fbdev,vesa`)

use crate::buckconfig::{parse_bool, BuckConfigFile, BuckConfigSection};
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One layer of USE input: flags explicitly switched on and off
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseToggles {
    /// Flags requested on
    pub enabled: BTreeSet<String>,
    /// Flags requested off
    pub disabled: BTreeSet<String>,
}

impl UseToggles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a flag on; a later request wins over an earlier one
    pub fn enable(&mut self, flag: impl Into<String>) -> &mut Self {
        let flag = flag.into();
        self.disabled.remove(&flag);
        self.enabled.insert(flag);
        self
    }

    /// Request a flag off; a later request wins over an earlier one
    pub fn disable(&mut self, flag: impl Into<String>) -> &mut Self {
        let flag = flag.into();
        self.enabled.remove(&flag);
        self.disabled.insert(flag);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }

    /// Every flag mentioned by this layer
    pub fn requested(&self) -> impl Iterator<Item = &String> {
        self.enabled.iter().chain(self.disabled.iter())
    }

    /// Build a layer from a buckconfig section of `flag = bool` entries
    pub fn from_section(section_name: &str, section: &BuckConfigSection) -> Result<Self> {
        let mut toggles = Self::new();
        for (flag, value) in &section.values {
            match parse_bool(section_name, flag, value)? {
                Some(true) => {
                    toggles.enable(flag.as_str());
                }
                Some(false) => {
                    toggles.disable(flag.as_str());
                }
                None => {}
            }
        }
        Ok(toggles)
    }
}

/// USE_EXPAND variables, e.g. `VIDEO_CARDS="fbdev vesa"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UseExpand {
    vars: IndexMap<String, Vec<String>>,
}

impl UseExpand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values of a variable, replacing any previous ones
    pub fn set(&mut self, variable: impl Into<String>, values: Vec<String>) {
        self.vars.insert(variable.into().to_lowercase(), values);
    }

    /// Parse a `[use_expand]` section; values are comma or whitespace separated
    pub fn from_section(section: &BuckConfigSection) -> Self {
        let mut expand = Self::new();
        for (variable, value) in &section.values {
            let values = value
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_lowercase())
                .collect();
            expand.set(variable.as_str(), values);
        }
        expand
    }

    /// Expanded flag names (`video_cards_fbdev`) in declaration order
    pub fn flags(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|(variable, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}_{}", variable, value))
            })
            .collect()
    }
}

/// All USE input layers of a build profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseConfig {
    /// Global `[use]` layer
    pub global: UseToggles,
    /// Per-package `[use.<pkgname>]` layers
    pub packages: BTreeMap<String, UseToggles>,
    /// `[use_expand]` variables
    pub expand: UseExpand,
}

impl UseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every USE layer from a merged buckconfig
    pub fn from_buckconfig(config: &BuckConfigFile) -> Result<Self> {
        let global = match config.section("use") {
            Some(section) => UseToggles::from_section("use", section)?,
            None => UseToggles::new(),
        };

        let mut packages = BTreeMap::new();
        for (package, section) in config.subsections("use") {
            let name = format!("use.{}", package);
            packages.insert(package.to_string(), UseToggles::from_section(&name, section)?);
        }

        let expand = config
            .section("use_expand")
            .map(UseExpand::from_section)
            .unwrap_or_default();

        Ok(Self {
            global,
            packages,
            expand,
        })
    }

    /// The global layer as seen by resolution: `[use]` plus expanded USE_EXPAND flags
    ///
    /// Expanded flags are enabling input only; an explicit `[use]` disable of
    /// the same flag still removes it because disables apply after enables.
    pub fn global_layer(&self) -> UseToggles {
        let mut layer = self.global.clone();
        for flag in self.expand.flags() {
            if !layer.disabled.contains(&flag) {
                layer.enabled.insert(flag);
            }
        }
        layer
    }

    /// The per-package layer for `package`, empty when none is configured
    pub fn package_layer(&self, package: &str) -> UseToggles {
        self.packages.get(package).cloned().unwrap_or_default()
    }
}
