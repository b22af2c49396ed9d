//! USE flag resolution
//!
//! - [`registry`]: catalog of known global flags (validation only)
//! - [`resolver`]: layered resolution into an [`EffectiveUseSet`]
//! - [`args`]: typed flag → build argument rules

pub mod args;
pub mod registry;
pub mod resolver;

pub use args::{Polarity, UseArgRule};
pub use registry::{FlagInfo, FlagRegistry};
pub use resolver::{
    validate_use_flags, EffectiveUseSet, UseResolver, ValidationWarning, WarningKind,
};
