//! USE flag to build argument rules
//!
//! A rule carries its polarity explicitly, so a flag whose name starts with
//! `-` is never mistaken for a "when disabled" entry.

use super::EffectiveUseSet;
use serde::{Deserialize, Serialize};

/// When a rule applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Flag is enabled
    #[default]
    Enabled,
    /// Flag is disabled
    Disabled,
}

/// Build arguments contributed when a flag has the given polarity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseArgRule {
    pub flag: String,
    #[serde(default)]
    pub polarity: Polarity,
    pub args: Vec<String>,
}

impl UseArgRule {
    pub fn enabled(flag: impl Into<String>, args: &[&str]) -> Self {
        Self {
            flag: flag.into(),
            polarity: Polarity::Enabled,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn disabled(flag: impl Into<String>, args: &[&str]) -> Self {
        Self {
            flag: flag.into(),
            polarity: Polarity::Disabled,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn applies(&self, use_set: &EffectiveUseSet) -> bool {
        match self.polarity {
            Polarity::Enabled => use_set.is_enabled(&self.flag),
            Polarity::Disabled => !use_set.is_enabled(&self.flag),
        }
    }
}

/// Render rules against an effective set, in declaration order
pub fn render_use_args(rules: &[UseArgRule], use_set: &EffectiveUseSet) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.applies(use_set))
        .flat_map(|rule| rule.args.iter().cloned())
        .collect()
}
