//! Blocker handling
//!
//! Blockers declare that a package cannot coexist with another target:
//! - Soft blockers (!target): the blocking package may be removed after install
//! - Hard blockers (!!target): the blocking package must be absent before install

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Blocker strength
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardness {
    /// Reported, does not stop the build
    #[default]
    Soft,
    /// Stops the build before any phase runs
    Hard,
}

/// A declared incompatibility with another target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blocker {
    pub target: String,
    #[serde(default)]
    pub hardness: Hardness,
}

impl Blocker {
    pub fn soft(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            hardness: Hardness::Soft,
        }
    }

    pub fn hard(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            hardness: Hardness::Hard,
        }
    }

    /// Parse `!target` (soft) or `!!target` (hard)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (hardness, target) = if let Some(rest) = s.strip_prefix("!!") {
            (Hardness::Hard, rest)
        } else if let Some(rest) = s.strip_prefix('!') {
            (Hardness::Soft, rest)
        } else {
            return Err(Error::InvalidBlocker(format!(
                "'{s}' must start with '!' or '!!'"
            )));
        };

        let target = target.trim();
        if target.is_empty() || target.starts_with('!') {
            return Err(Error::InvalidBlocker(format!("'{s}' names no target")));
        }

        Ok(Self {
            target: target.to_string(),
            hardness,
        })
    }
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.hardness {
            Hardness::Soft => write!(f, "!{}", self.target),
            Hardness::Hard => write!(f, "!!{}", self.target),
        }
    }
}

/// A blocker as written in a package definition: a string or a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockerDecl {
    Atom(String),
    Table(Blocker),
}

impl BlockerDecl {
    pub fn to_blocker(&self) -> Result<Blocker> {
        match self {
            BlockerDecl::Atom(s) => Blocker::parse(s),
            BlockerDecl::Table(blocker) => Ok(blocker.clone()),
        }
    }
}

/// Outcome of checking blockers against the installed set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerResult {
    /// Any blocker matched
    pub blocked: bool,
    pub hard_blockers: Vec<String>,
    pub soft_blockers: Vec<String>,
}

impl BlockerResult {
    pub fn has_hard(&self) -> bool {
        !self.hard_blockers.is_empty()
    }
}

/// Classify every blocker whose target is installed
pub fn check_blockers(installed: &BTreeSet<String>, blockers: &[Blocker]) -> BlockerResult {
    let mut result = BlockerResult::default();

    for blocker in blockers {
        if !installed.contains(&blocker.target) {
            continue;
        }
        let bucket = match blocker.hardness {
            Hardness::Hard => &mut result.hard_blockers,
            Hardness::Soft => &mut result.soft_blockers,
        };
        if !bucket.contains(&blocker.target) {
            bucket.push(blocker.target.clone());
        }
    }

    result.blocked = !result.hard_blockers.is_empty() || !result.soft_blockers.is_empty();
    for target in &result.soft_blockers {
        warn!("Soft blocker: {} is installed and should be removed after install", target);
    }
    result
}
