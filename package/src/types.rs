//! Core type definitions for the build engine

use crate::resolver::blocker::BlockerDecl;
use crate::resolver::required_use::RequiredUseSpec;
use crate::use_flags::UseArgRule;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Package identifier with category and name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub category: String,
    pub name: String,
}

impl PackageId {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Parse a package identifier from string (e.g., "sys-apps/systemd")
    pub fn parse(s: &str) -> Option<Self> {
        let (category, name) = s.split_once('/')?;
        if category.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(category, name))
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// Bootstrap stage a package is built in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapStage {
    /// Regular build against the final toolchain
    #[default]
    None,
    /// Cross toolchain built with the host compiler
    Stage1,
    /// Native toolchain built with the stage1 cross toolchain
    Stage2,
    /// Full system rebuilt with the stage2 toolchain
    Stage3,
}

impl BootstrapStage {
    pub fn name(&self) -> &'static str {
        match self {
            BootstrapStage::None => "none",
            BootstrapStage::Stage1 => "stage1",
            BootstrapStage::Stage2 => "stage2",
            BootstrapStage::Stage3 => "stage3",
        }
    }
}

impl std::fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Dependency role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRole {
    /// Build-time, target platform
    Depend,
    /// Runtime, target platform
    Rdepend,
    /// Build-time, target platform
    Bdepend,
    /// Build-time tools that execute on the host platform
    ExecBdepend,
    /// Post-merge, target platform
    Pdepend,
}

/// Which platform a dependency role resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformSide {
    Target,
    Host,
}

impl DependencyRole {
    pub const ALL: [DependencyRole; 5] = [
        DependencyRole::Depend,
        DependencyRole::Rdepend,
        DependencyRole::Bdepend,
        DependencyRole::ExecBdepend,
        DependencyRole::Pdepend,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DependencyRole::Depend => "depend",
            DependencyRole::Rdepend => "rdepend",
            DependencyRole::Bdepend => "bdepend",
            DependencyRole::ExecBdepend => "exec_bdepend",
            DependencyRole::Pdepend => "pdepend",
        }
    }

    pub fn platform_side(&self) -> PlatformSide {
        match self {
            DependencyRole::ExecBdepend => PlatformSide::Host,
            _ => PlatformSide::Target,
        }
    }

    /// Roles followed when collecting transitive runtime dependencies
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            DependencyRole::Depend | DependencyRole::Rdepend | DependencyRole::Pdepend
        )
    }
}

impl std::fmt::Display for DependencyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key used in a platform-conditional map when no entry matches the platform
pub const DEFAULT_PLATFORM_KEY: &str = "default";

/// Dependency list, either fixed or selected by platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Concrete(Vec<String>),
    PlatformConditional(BTreeMap<String, Vec<String>>),
}

impl Default for DependencySpec {
    fn default() -> Self {
        DependencySpec::Concrete(Vec::new())
    }
}

impl DependencySpec {
    /// Resolve against a platform name
    ///
    /// A platform-conditional spec with neither an entry for `platform` nor a
    /// `default` entry resolves to nothing.
    pub fn resolve(&self, platform: &str) -> &[String] {
        match self {
            DependencySpec::Concrete(targets) => targets,
            DependencySpec::PlatformConditional(by_platform) => by_platform
                .get(platform)
                .or_else(|| by_platform.get(DEFAULT_PLATFORM_KEY))
                .map(|targets| targets.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DependencySpec::Concrete(targets) => targets.is_empty(),
            DependencySpec::PlatformConditional(by_platform) => {
                by_platform.values().all(|targets| targets.is_empty())
            }
        }
    }
}

impl From<Vec<String>> for DependencySpec {
    fn from(targets: Vec<String>) -> Self {
        DependencySpec::Concrete(targets)
    }
}

/// Declared dependencies by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDependencies {
    pub depend: DependencySpec,
    pub rdepend: DependencySpec,
    pub bdepend: DependencySpec,
    pub exec_bdepend: DependencySpec,
    pub pdepend: DependencySpec,
}

impl RoleDependencies {
    pub fn get(&self, role: DependencyRole) -> &DependencySpec {
        match role {
            DependencyRole::Depend => &self.depend,
            DependencyRole::Rdepend => &self.rdepend,
            DependencyRole::Bdepend => &self.bdepend,
            DependencyRole::ExecBdepend => &self.exec_bdepend,
            DependencyRole::Pdepend => &self.pdepend,
        }
    }
}

/// Phase script bodies; `None` means "use the default"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseScripts {
    pub unpack: Option<String>,
    pub prepare: Option<String>,
    pub pre_configure: Option<String>,
    pub configure: Option<String>,
    pub compile: Option<String>,
    pub test: Option<String>,
    pub install: Option<String>,
}

/// Alternate phase scripts per bootstrap stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageVariants {
    pub stage1: Option<PhaseScripts>,
    pub stage2: Option<PhaseScripts>,
    pub stage3: Option<PhaseScripts>,
}

impl StageVariants {
    pub fn for_stage(&self, stage: BootstrapStage) -> Option<&PhaseScripts> {
        match stage {
            BootstrapStage::None => None,
            BootstrapStage::Stage1 => self.stage1.as_ref(),
            BootstrapStage::Stage2 => self.stage2.as_ref(),
            BootstrapStage::Stage3 => self.stage3.as_ref(),
        }
    }
}

/// Descriptive package metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    pub description: String,
    pub homepage: Option<String>,
    pub license: String,
    pub maintainers: Vec<String>,
}

fn default_slot() -> String {
    "0".to_string()
}

fn default_eapi() -> u32 {
    crate::eapi::DEFAULT_EAPI
}

fn default_build_system() -> String {
    "generic".to_string()
}

/// A package definition, as written in the package's `package.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDefinition {
    pub category: String,
    pub name: String,
    pub version: String,
    #[serde(default = "default_slot")]
    pub slot: String,
    /// Build target this package's outputs are known by (defaults to `//<category>/<name>`)
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_eapi")]
    pub eapi: u32,
    #[serde(default)]
    pub bootstrap_stage: BootstrapStage,
    /// Package is part of the toolchain bootstrap and needs the host's compiler
    #[serde(default)]
    pub use_bootstrap: bool,
    #[serde(default = "default_build_system")]
    pub build_system: String,
    #[serde(default)]
    pub iuse: Vec<String>,
    #[serde(default)]
    pub use_defaults: Vec<String>,
    #[serde(default)]
    pub use_deps: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub use_args: Vec<UseArgRule>,
    #[serde(default)]
    pub required_use: RequiredUseSpec,
    #[serde(default)]
    pub dependencies: RoleDependencies,
    #[serde(default)]
    pub blockers: Vec<BlockerDecl>,
    #[serde(default)]
    pub src_uri: Vec<String>,
    #[serde(default)]
    pub patches: Vec<String>,
    #[serde(default)]
    pub phases: PhaseScripts,
    #[serde(default)]
    pub phase_variants: StageVariants,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: PackageMetadata,
}

impl PackageDefinition {
    /// Create a minimal definition; everything else takes its default
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            version: version.into(),
            slot: default_slot(),
            target: None,
            eapi: default_eapi(),
            bootstrap_stage: BootstrapStage::None,
            use_bootstrap: false,
            build_system: default_build_system(),
            iuse: Vec::new(),
            use_defaults: Vec::new(),
            use_deps: BTreeMap::new(),
            use_args: Vec::new(),
            required_use: RequiredUseSpec::default(),
            dependencies: RoleDependencies::default(),
            blockers: Vec::new(),
            src_uri: Vec::new(),
            patches: Vec::new(),
            phases: PhaseScripts::default(),
            phase_variants: StageVariants::default(),
            env: BTreeMap::new(),
            metadata: PackageMetadata::default(),
        }
    }

    /// Parse a definition from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let pkg: Self = toml::from_str(content)?;
        pkg.check()?;
        Ok(pkg)
    }

    /// Load a definition from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Structural checks that do not depend on any profile
    pub fn check(&self) -> Result<()> {
        if self.category.is_empty() || self.name.is_empty() {
            return Err(Error::InvalidPackage(
                "category and name must not be empty".to_string(),
            ));
        }
        if self.version.is_empty() {
            return Err(Error::InvalidPackage(format!(
                "{}: empty version",
                self.id()
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.category, &self.name)
    }

    /// `category/name-version`, used in every error and log line
    pub fn identity(&self) -> String {
        format!("{}/{}-{}", self.category, self.name, self.version)
    }

    /// Target reference identifying this package's output
    pub fn target(&self) -> String {
        self.target
            .clone()
            .unwrap_or_else(|| format!("//{}/{}", self.category, self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_parse() {
        let id = PackageId::parse("net-misc/curl").unwrap();
        assert_eq!(id.category, "net-misc");
        assert_eq!(id.name, "curl");
        assert!(PackageId::parse("curl").is_none());
        assert!(PackageId::parse("a/b/c").is_none());
    }

    #[test]
    fn test_dependency_spec_resolve() {
        let concrete = DependencySpec::Concrete(vec!["//pkg/zlib".to_string()]);
        assert_eq!(concrete.resolve("aarch64"), &["//pkg/zlib".to_string()]);

        let mut by_platform = BTreeMap::new();
        by_platform.insert("x86_64".to_string(), vec!["//pkg/nasm".to_string()]);
        by_platform.insert("default".to_string(), vec!["//pkg/generic".to_string()]);
        let conditional = DependencySpec::PlatformConditional(by_platform);

        assert_eq!(conditional.resolve("x86_64"), &["//pkg/nasm".to_string()]);
        assert_eq!(conditional.resolve("riscv64"), &["//pkg/generic".to_string()]);
    }

    #[test]
    fn test_conditional_without_default_is_empty() {
        let mut by_platform = BTreeMap::new();
        by_platform.insert("x86_64".to_string(), vec!["//pkg/nasm".to_string()]);
        let conditional = DependencySpec::PlatformConditional(by_platform);
        assert!(conditional.resolve("aarch64").is_empty());
    }

    #[test]
    fn test_role_platform_side() {
        assert_eq!(DependencyRole::ExecBdepend.platform_side(), PlatformSide::Host);
        assert_eq!(DependencyRole::Bdepend.platform_side(), PlatformSide::Target);
        assert!(!DependencyRole::ExecBdepend.is_transitive());
        assert!(!DependencyRole::Bdepend.is_transitive());
        assert!(DependencyRole::Pdepend.is_transitive());
    }

    #[test]
    fn test_definition_from_toml() {
        let pkg = PackageDefinition::from_toml_str(
            r#"
category = "net-misc"
name = "curl"
version = "8.5.0"
eapi = 8
iuse = ["ssl", "zstd"]
use_defaults = ["ssl"]

[use_deps]
ssl = ["//pkg/openssl"]

[dependencies]
depend = ["//pkg/zlib"]
exec_bdepend = { default = ["//pkg/pkgconf"] }

[phases]
configure = "econf --disable-static"
"#,
        )
        .unwrap();

        assert_eq!(pkg.identity(), "net-misc/curl-8.5.0");
        assert_eq!(pkg.target(), "//net-misc/curl");
        assert_eq!(pkg.slot, "0");
        assert_eq!(pkg.bootstrap_stage, BootstrapStage::None);
        assert_eq!(pkg.dependencies.depend.resolve("x86_64").len(), 1);
        assert_eq!(
            pkg.dependencies.exec_bdepend.resolve("x86_64"),
            &["//pkg/pkgconf".to_string()]
        );
        assert_eq!(pkg.phases.configure.as_deref(), Some("econf --disable-static"));
        assert!(pkg.phases.compile.is_none());
    }

    #[test]
    fn test_definition_rejects_empty_version() {
        let err = PackageDefinition::from_toml_str(
            "category = \"a\"\nname = \"b\"\nversion = \"\"\n",
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
