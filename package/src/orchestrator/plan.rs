//! Build plans
//!
//! A plan is everything the executor needs, computed without side effects:
//! the ordered phases with their bodies and capabilities, the environment,
//! labels, partitioned dependencies and the cache key.

use super::cache_key::CacheKeyDescriptor;
use crate::eapi::EapiGate;
use crate::executor::{ExecutionContext, Locality};
use crate::phase::BuildPhase;
use crate::resolver::{BlockerResult, PartitionedDependencies};
use crate::types::{BootstrapStage, PackageDefinition};
use crate::use_flags::EffectiveUseSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a phase body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    /// Bootstrap-stage variant supplied by the package
    StageVariant,
    /// The package's own override
    Custom,
    /// EAPI default
    Default,
    /// Nothing defined; the phase is a no-op
    Empty,
}

/// One phase as it will run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub phase: BuildPhase,
    /// Phase function name, e.g. `src_configure`
    pub function: String,
    pub body: String,
    pub source: ScriptSource,
    pub context: ExecutionContext,
}

/// Fully resolved plan for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub package: String,
    pub target: String,
    pub bootstrap_stage: BootstrapStage,
    pub locality: Locality,
    pub use_flags: Vec<String>,
    pub use_args: Vec<String>,
    pub labels: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub dependencies: PartitionedDependencies,
    pub blockers: BlockerResult,
    pub sources: Vec<String>,
    pub phases: Vec<PlannedPhase>,
    pub cache_key: CacheKeyDescriptor,
    pub fingerprint: String,
}

impl BuildPlan {
    pub fn phase(&self, phase: BuildPhase) -> Option<&PlannedPhase> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// Packages that need the host's own compiler run locally unless the profile
/// provides a host toolchain override
pub fn locality_for(pkg: &PackageDefinition, use_host_toolchain: bool) -> Locality {
    if pkg.use_bootstrap && !use_host_toolchain {
        Locality::LocalOnly
    } else {
        Locality::Any
    }
}

/// Pick each phase body: stage variant, then custom override, then EAPI default
pub fn compose_phases(
    pkg: &PackageDefinition,
    run_tests: bool,
    locality: Locality,
) -> Vec<PlannedPhase> {
    let variant = pkg.phase_variants.for_stage(pkg.bootstrap_stage);

    BuildPhase::sequence(run_tests)
        .into_iter()
        .map(|phase| {
            let (body, source) = if let Some(body) = variant.and_then(|v| phase.script(v)) {
                (body.to_string(), ScriptSource::StageVariant)
            } else if let Some(body) = phase.script(&pkg.phases) {
                (body.to_string(), ScriptSource::Custom)
            } else if let Some(body) = EapiGate::default_phase(phase, pkg.eapi) {
                (body.to_string(), ScriptSource::Default)
            } else {
                (":".to_string(), ScriptSource::Empty)
            };

            PlannedPhase {
                phase,
                function: phase.function_name().to_string(),
                body,
                source,
                context: ExecutionContext {
                    network: phase.allows_network(),
                    locality,
                },
            }
        })
        .collect()
}

/// Build labels: USE labels plus the compile and build-system markers
pub fn labels_for(pkg: &PackageDefinition, use_set: &EffectiveUseSet) -> Vec<String> {
    let mut labels = use_set.labels();
    labels.push("buckos:compile".to_string());
    labels.push(format!("buckos:build:{}", pkg.build_system));
    labels
}

/// Package-level environment shared by every phase
///
/// Layout-dependent variables (`WORKDIR`, `S`, `D`) are added at execution.
pub fn phase_env(
    pkg: &PackageDefinition,
    use_set: &EffectiveUseSet,
    use_args: &[String],
) -> BTreeMap<String, String> {
    let mut env = pkg.env.clone();
    env.extend(use_set.env());
    env.insert("USE_ARGS".to_string(), use_args.join(" "));
    env.insert("CATEGORY".to_string(), pkg.category.clone());
    env.insert("PN".to_string(), pkg.name.clone());
    env.insert("PV".to_string(), pkg.version.clone());
    env.insert("P".to_string(), format!("{}-{}", pkg.name, pkg.version));
    env.insert("PF".to_string(), format!("{}-{}", pkg.name, pkg.version));
    env.insert("SLOT".to_string(), pkg.slot.clone());
    env.insert("EAPI".to_string(), pkg.eapi.to_string());
    env.insert("PATCHES".to_string(), pkg.patches.join(" "));
    env.insert(
        "BUCKOS_BOOTSTRAP_STAGE".to_string(),
        pkg.bootstrap_stage.to_string(),
    );
    env
}

/// On-disk layout of one build
#[derive(Debug, Clone)]
pub struct BuildLayout {
    root: PathBuf,
}

impl BuildLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `WORKDIR`: where sources are unpacked
    pub fn workdir(&self) -> PathBuf {
        self.root.join("work")
    }

    /// `S`: the unpacked source tree
    pub fn source_dir(&self, pkg: &PackageDefinition) -> PathBuf {
        self.workdir().join(format!("{}-{}", pkg.name, pkg.version))
    }

    /// `D`: the install image
    pub fn image_dir(&self) -> PathBuf {
        self.root.join("image")
    }

    /// Create empty work and image directories, discarding leftovers from
    /// an earlier build in the same root
    pub async fn create(&self) -> std::io::Result<()> {
        for dir in [self.workdir(), self.image_dir()] {
            match tokio::fs::remove_dir_all(&dir).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Variables that point into this layout
    pub fn env(&self, pkg: &PackageDefinition) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("WORKDIR".to_string(), self.workdir().display().to_string());
        env.insert("S".to_string(), self.source_dir(pkg).display().to_string());
        env.insert("D".to_string(), self.image_dir().display().to_string());
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhaseScripts;

    #[tokio::test]
    async fn test_create_discards_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        layout.create().await.unwrap();

        let stale = layout.image_dir().join("usr/bin/hello");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();
        std::fs::write(layout.workdir().join("leftover"), "old").unwrap();

        layout.create().await.unwrap();
        assert!(layout.image_dir().is_dir());
        assert_eq!(std::fs::read_dir(layout.image_dir()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(layout.workdir()).unwrap().count(), 0);
    }

    #[test]
    fn test_custom_beats_default() {
        let mut pkg = PackageDefinition::new("app-misc", "hello", "1.0");
        pkg.phases.configure = Some("./configure --enable-hello".to_string());

        let phases = compose_phases(&pkg, false, Locality::Any);
        let configure = phases.iter().find(|p| p.phase == BuildPhase::Configure).unwrap();
        assert_eq!(configure.source, ScriptSource::Custom);
        assert_eq!(configure.body, "./configure --enable-hello");

        let compile = phases.iter().find(|p| p.phase == BuildPhase::Compile).unwrap();
        assert_eq!(compile.source, ScriptSource::Default);
        assert!(phases.iter().all(|p| p.phase != BuildPhase::Test));
    }

    #[test]
    fn test_stage_variant_selected_only_for_its_stage() {
        let mut pkg = PackageDefinition::new("sys-devel", "gcc", "13.2.0");
        pkg.phases.compile = Some("make".to_string());
        pkg.phase_variants.stage1 = Some(PhaseScripts {
            compile: Some("make all-gcc".to_string()),
            ..Default::default()
        });

        let compile = |pkg: &PackageDefinition| {
            compose_phases(pkg, false, Locality::Any)
                .into_iter()
                .find(|p| p.phase == BuildPhase::Compile)
                .unwrap()
        };

        assert_eq!(compile(&pkg).body, "make");
        pkg.bootstrap_stage = BootstrapStage::Stage1;
        assert_eq!(compile(&pkg).body, "make all-gcc");
        assert_eq!(compile(&pkg).source, ScriptSource::StageVariant);
        pkg.bootstrap_stage = BootstrapStage::Stage2;
        assert_eq!(compile(&pkg).body, "make");
    }

    #[test]
    fn test_network_only_for_unpack_and_prepare() {
        let pkg = PackageDefinition::new("app-misc", "hello", "1.0");
        for planned in compose_phases(&pkg, true, Locality::Any) {
            assert_eq!(
                planned.context.network,
                matches!(planned.phase, BuildPhase::Unpack | BuildPhase::Prepare),
                "{}",
                planned.function
            );
        }
    }

    #[test]
    fn test_locality() {
        let mut pkg = PackageDefinition::new("sys-devel", "binutils", "2.42");
        assert_eq!(locality_for(&pkg, false), Locality::Any);
        pkg.use_bootstrap = true;
        assert_eq!(locality_for(&pkg, false), Locality::LocalOnly);
        assert_eq!(locality_for(&pkg, true), Locality::Any);
    }

    #[test]
    fn test_labels_and_env() {
        let mut pkg = PackageDefinition::new("net-misc", "curl", "8.5.0");
        pkg.build_system = "autotools".to_string();
        let use_set = EffectiveUseSet::from_flags(["ssl"], ["ssl"]);

        let labels = labels_for(&pkg, &use_set);
        assert!(labels.contains(&"buckos:use:ssl".to_string()));
        assert!(labels.contains(&"buckos:build:autotools".to_string()));
        assert!(labels.contains(&"buckos:compile".to_string()));

        let env = phase_env(&pkg, &use_set, &["--with-ssl".to_string()]);
        assert_eq!(env["USE_ARGS"], "--with-ssl");
        assert_eq!(env["P"], "curl-8.5.0");
        assert_eq!(env["USE"], "ssl");
    }
}
