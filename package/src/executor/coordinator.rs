//! Single-flight build coordination
//!
//! At most one execution runs per `(package identity, cache key fingerprint)`.
//! Later requests for the same key wait for the running one and share its
//! outcome. A failed execution leaves nothing cached, so the next request
//! runs again.

use super::PhaseExecutor;
use crate::orchestrator::{BuildLayout, BuildOutcome, PackageBuild};
use crate::{Error, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info};

/// Outcome of a coordinated build
#[derive(Debug, Clone)]
pub struct CoordinatedBuild {
    pub outcome: BuildOutcome,
    /// Served from an earlier or concurrent execution of the same key
    pub cached: bool,
}

type FlightKey = (String, String);

/// Runs planned builds with per-key deduplication
pub struct BuildCoordinator {
    executor: Arc<dyn PhaseExecutor>,
    build_root: PathBuf,
    semaphore: Arc<Semaphore>,
    flights: Mutex<HashMap<FlightKey, Arc<OnceCell<BuildOutcome>>>>,
}

impl BuildCoordinator {
    pub fn new(executor: Arc<dyn PhaseExecutor>, build_root: impl Into<PathBuf>) -> Self {
        Self::with_parallelism(executor, build_root, default_parallelism())
    }

    pub fn with_parallelism(
        executor: Arc<dyn PhaseExecutor>,
        build_root: impl Into<PathBuf>,
        parallelism: usize,
    ) -> Self {
        Self {
            executor,
            build_root: build_root.into(),
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
            flights: Mutex::new(HashMap::new()),
        }
    }

    fn flight(&self, key: FlightKey) -> Arc<OnceCell<BuildOutcome>> {
        self.flights.lock().entry(key).or_default().clone()
    }

    /// Drop a flight whose execution failed, unless a newer attempt owns it
    fn forget_failed(&self, key: &FlightKey, cell: &Arc<OnceCell<BuildOutcome>>) {
        let mut flights = self.flights.lock();
        let stale = flights
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            flights.remove(key);
        }
    }

    /// Execute a planned build unless its key already has an outcome
    pub async fn run(&self, mut build: PackageBuild) -> Result<CoordinatedBuild> {
        let Some(fingerprint) = build.plan().map(|p| p.fingerprint.clone()) else {
            return Err(Error::InvalidTransition {
                package: build.identity(),
                action: "coordinate",
                state: build.state().name(),
            });
        };
        let identity = build.identity();
        let key = (identity.clone(), fingerprint.clone());
        let cell = self.flight(key.clone());
        let executed = AtomicBool::new(false);

        let result = cell
            .get_or_try_init(|| async {
                executed.store(true, Ordering::SeqCst);
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|e| Error::Executor(e.to_string()))?;
                let layout = BuildLayout::new(self.build_root.join(&fingerprint));
                build.execute(self.executor.as_ref(), &layout).await
            })
            .await
            .cloned();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.forget_failed(&key, &cell);
                return Err(e);
            }
        };

        let cached = !executed.load(Ordering::SeqCst);
        if cached {
            debug!("{}: reusing outcome for {}", identity, fingerprint);
        }
        Ok(CoordinatedBuild { outcome, cached })
    }

    /// Run independent builds concurrently
    pub async fn run_all(&self, builds: Vec<PackageBuild>) -> Vec<Result<CoordinatedBuild>> {
        info!("Coordinating {} builds", builds.len());
        join_all(builds.into_iter().map(|build| self.run(build))).await
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
