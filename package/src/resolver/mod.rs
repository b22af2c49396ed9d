//! Pre-build gates over a package's effective USE set
//!
//! - [`required_use`]: REQUIRED_USE constraints
//! - [`deps`]: dependency partitioning, conditional expansion, transitive walks
//! - [`blocker`]: soft and hard blockers

pub mod blocker;
pub mod deps;
pub mod required_use;

pub use blocker::{check_blockers, Blocker, BlockerDecl, BlockerResult, Hardness};
pub use deps::{
    expand_source_uris, DependencyEdge, DependencyResolver, PartitionedDependencies,
    TargetDependencies,
};
pub use required_use::{
    parse_required_use, Constraint, ConstraintChecker, ConstraintResult, RequiredUseSpec,
};
