//! Build phases
//!
//! A build runs a fixed sequence of phases. Each phase is one unit of
//! execution with its own record of state, timing and captured output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PhaseScripts;

/// One step of the build pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Unpack,
    Prepare,
    PreConfigure,
    Configure,
    Compile,
    Test,
    Install,
}

impl BuildPhase {
    /// Every phase in execution order
    pub const SEQUENCE: [BuildPhase; 7] = [
        BuildPhase::Unpack,
        BuildPhase::Prepare,
        BuildPhase::PreConfigure,
        BuildPhase::Configure,
        BuildPhase::Compile,
        BuildPhase::Test,
        BuildPhase::Install,
    ];

    /// Phases to run, with `test` left out unless requested
    pub fn sequence(run_tests: bool) -> Vec<BuildPhase> {
        Self::SEQUENCE
            .into_iter()
            .filter(|phase| run_tests || *phase != BuildPhase::Test)
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildPhase::Unpack => "unpack",
            BuildPhase::Prepare => "prepare",
            BuildPhase::PreConfigure => "pre_configure",
            BuildPhase::Configure => "configure",
            BuildPhase::Compile => "compile",
            BuildPhase::Test => "test",
            BuildPhase::Install => "install",
        }
    }

    /// Phase function name used in logs and errors
    pub fn function_name(&self) -> &'static str {
        match self {
            BuildPhase::Unpack => "src_unpack",
            BuildPhase::Prepare => "src_prepare",
            BuildPhase::PreConfigure => "pre_configure",
            BuildPhase::Configure => "src_configure",
            BuildPhase::Compile => "src_compile",
            BuildPhase::Test => "src_test",
            BuildPhase::Install => "src_install",
        }
    }

    /// Only source acquisition and preparation may reach the network
    pub fn allows_network(&self) -> bool {
        matches!(self, BuildPhase::Unpack | BuildPhase::Prepare)
    }

    /// The script body for this phase in `scripts`, if set
    pub fn script<'a>(&self, scripts: &'a PhaseScripts) -> Option<&'a str> {
        let body = match self {
            BuildPhase::Unpack => &scripts.unpack,
            BuildPhase::Prepare => &scripts.prepare,
            BuildPhase::PreConfigure => &scripts.pre_configure,
            BuildPhase::Configure => &scripts.configure,
            BuildPhase::Compile => &scripts.compile,
            BuildPhase::Test => &scripts.test,
            BuildPhase::Install => &scripts.install,
        };
        body.as_deref()
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Phase state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Execution record of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: BuildPhase,
    pub state: PhaseState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr
    pub output: String,
}

impl PhaseRecord {
    pub fn new(phase: BuildPhase) -> Self {
        Self {
            phase,
            state: PhaseState::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
            output: String::new(),
        }
    }

    pub fn start(&mut self) {
        self.state = PhaseState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, exit_code: i32, output: String) {
        self.state = if exit_code == 0 {
            PhaseState::Succeeded
        } else {
            PhaseState::Failed
        };
        self.exit_code = Some(exit_code);
        self.output = output;
        self.finished_at = Some(Utc::now());
    }

    /// Mark failed without an exit code (the executor itself failed)
    pub fn abort(&mut self, message: String) {
        self.state = PhaseState::Failed;
        self.output = message;
        self.finished_at = Some(Utc::now());
    }

    /// Whether the phase has run, successfully or not
    pub fn has_run(&self) -> bool {
        matches!(self.state, PhaseState::Succeeded | PhaseState::Failed)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_skips_test_unless_requested() {
        assert_eq!(BuildPhase::sequence(false).len(), 6);
        assert!(!BuildPhase::sequence(false).contains(&BuildPhase::Test));
        assert_eq!(BuildPhase::sequence(true), BuildPhase::SEQUENCE.to_vec());
    }

    #[test]
    fn test_order_and_names() {
        let mut sorted = BuildPhase::SEQUENCE.to_vec();
        sorted.sort();
        assert_eq!(sorted, BuildPhase::SEQUENCE.to_vec());
        assert_eq!(BuildPhase::Configure.to_string(), "src_configure");
        assert_eq!(BuildPhase::PreConfigure.function_name(), "pre_configure");
    }

    #[test]
    fn test_network_only_early() {
        let networked: Vec<_> = BuildPhase::SEQUENCE
            .into_iter()
            .filter(BuildPhase::allows_network)
            .collect();
        assert_eq!(networked, vec![BuildPhase::Unpack, BuildPhase::Prepare]);
    }

    #[test]
    fn test_record_lifecycle() {
        let mut record = PhaseRecord::new(BuildPhase::Compile);
        assert!(!record.has_run());
        record.start();
        assert_eq!(record.state, PhaseState::Running);
        record.finish(2, "make: *** Error 2".to_string());
        assert_eq!(record.state, PhaseState::Failed);
        assert!(record.has_run());
        assert!(record.duration().is_some());
    }
}
