//! Phase execution contract
//!
//! The orchestrator hands one phase at a time to a [`PhaseExecutor`]. What
//! runs the script (a local shell, a remote worker) is the executor's
//! business; the orchestrator only fixes ordering, the environment and the
//! execution context each phase may use.

pub mod coordinator;
pub mod mock;
pub mod shell;

pub use coordinator::{BuildCoordinator, CoordinatedBuild};
pub use mock::MockExecutor;
pub use shell::ShellExecutor;

use crate::phase::BuildPhase;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a build may be scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// Local or remote
    #[default]
    Any,
    /// Pinned to the local host, never distributed
    LocalOnly,
}

/// Capabilities granted to one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub network: bool,
    pub locality: Locality,
}

/// One phase to run
#[derive(Debug, Clone)]
pub struct PhaseRequest {
    /// `category/name-version`
    pub package: String,
    pub phase: BuildPhase,
    pub script: String,
    pub env: BTreeMap<String, String>,
    /// Directory the script runs in
    pub workdir: PathBuf,
    /// Directory `src_install` installs into
    pub image_dir: PathBuf,
    pub context: ExecutionContext,
}

/// What a phase produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr
    pub log: String,
}

impl PhaseOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs phase scripts
///
/// An `Err` means the executor itself could not run the phase; a script that
/// ran and failed is an `Ok` with a non-zero exit code.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn run_phase(&self, request: &PhaseRequest) -> Result<PhaseOutput>;
}
