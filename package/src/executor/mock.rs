//! In-memory executor for tests and dry runs

use super::{PhaseExecutor, PhaseOutput, PhaseRequest};
use crate::phase::BuildPhase;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Executor that never runs scripts
///
/// Every phase succeeds unless told otherwise. `src_install` writes one file
/// into the image directory unless [`MockExecutor::empty_install`] is set.
#[derive(Default)]
pub struct MockExecutor {
    exit_codes: Mutex<HashMap<BuildPhase, i32>>,
    empty_install: bool,
    calls: Mutex<Vec<PhaseRequest>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `phase` exit with `code`
    pub fn fail_phase(self, phase: BuildPhase, code: i32) -> Self {
        self.exit_codes.lock().insert(phase, code);
        self
    }

    /// Let `src_install` succeed without installing anything
    pub fn empty_install(mut self) -> Self {
        self.empty_install = true;
        self
    }

    /// Phases run so far, in order
    pub fn phases_run(&self) -> Vec<BuildPhase> {
        self.calls.lock().iter().map(|r| r.phase).collect()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<PhaseRequest> {
        self.calls.lock().clone()
    }

    /// Number of packages whose `src_unpack` ran
    pub fn builds_started(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.phase == BuildPhase::Unpack)
            .count()
    }
}

#[async_trait]
impl PhaseExecutor for MockExecutor {
    async fn run_phase(&self, request: &PhaseRequest) -> Result<PhaseOutput> {
        self.calls.lock().push(request.clone());
        tokio::task::yield_now().await;

        let exit_code = self
            .exit_codes
            .lock()
            .get(&request.phase)
            .copied()
            .unwrap_or(0);

        if exit_code == 0 && request.phase == BuildPhase::Install && !self.empty_install {
            let dest = request.image_dir.join("usr/share/mock");
            tokio::fs::create_dir_all(&dest).await?;
            tokio::fs::write(dest.join("installed"), request.package.as_bytes()).await?;
        }

        Ok(PhaseOutput {
            exit_code,
            log: format!("{} {}\n", request.phase, request.package),
        })
    }
}
