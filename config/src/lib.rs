//! Buckos build profile configuration
//!
//! This crate turns `.buckconfig` files into an immutable [`BuildProfile`]
//! consumed by the package build engine.
//!
//! - [`buckconfig`]: INI-style `.buckconfig` parsing and merging
//! - [`use_config`]: `[use]`, `[use.<pkg>]` and `[use_expand]` layers
//! - [`mirrors`]: `[mirrors]` groups and `mirror://` expansion
//! - [`profile`]: the profile object passed into every resolution
//!
//! ```rust
//! use buckos_config::{BuckConfigFile, BuildProfile};
//!
//! let config = BuckConfigFile::parse_str("[use]\nssl = true\n").unwrap();
//! let profile = BuildProfile::from_buckconfig(&config).unwrap();
//! assert!(profile.global_use().enabled.contains("ssl"));
//! ```

pub mod buckconfig;
pub mod error;
pub mod mirrors;
pub mod profile;
pub mod use_config;

pub use buckconfig::{BuckConfigFile, BuckConfigSection};
pub use error::{ConfigError, Result};
pub use mirrors::MirrorGroups;
pub use profile::{BuildProfile, Platforms};
pub use use_config::{UseConfig, UseExpand, UseToggles};
