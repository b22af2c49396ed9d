//! Buckos package build engine
//!
//! Resolves a package's configuration and drives its build:
//!
//! - **USE flags**: layered resolution of the effective flag set
//! - **REQUIRED_USE**: declarative constraints over that set
//! - **Dependencies**: role partitioning, USE-conditional expansion,
//!   transitive walks and blockers
//! - **EAPI**: versioned feature tables, deprecations and default phases
//! - **Orchestrator**: the per-package phase state machine and cache key
//! - **Executor**: the phase execution contract and single-flight coordination
//!
//! Everything up to planning is pure and takes an explicit
//! [`buckos_config::BuildProfile`]; only phase execution has side effects.

pub mod catalog;
pub mod eapi;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod phase;
pub mod resolver;
pub mod types;
pub mod use_flags;

pub use catalog::PackageCatalog;
pub use eapi::EapiGate;
pub use error::{Error, ErrorClass, Result};
pub use executor::{
    BuildCoordinator, ExecutionContext, Locality, PhaseExecutor, PhaseOutput, PhaseRequest,
    ShellExecutor,
};
pub use orchestrator::{
    BuildLayout, BuildOutcome, BuildPlan, BuildState, CacheKeyDescriptor, PackageBuild,
};
pub use phase::{BuildPhase, PhaseRecord, PhaseState};
pub use resolver::{
    Blocker, BlockerResult, Constraint, ConstraintChecker, ConstraintResult, DependencyResolver,
    PartitionedDependencies,
};
pub use types::*;
pub use use_flags::{EffectiveUseSet, FlagRegistry, UseArgRule, UseResolver, ValidationWarning};
