//! Per-package build orchestration
//!
//! A [`PackageBuild`] walks one package through
//! `Unresolved → Validated → Planned → Executing(phase) → Succeeded | Failed`.
//! Validation and planning are pure; only [`PackageBuild::execute`] has side
//! effects. Any failure moves the build to `Failed` and is returned to the
//! caller with the package identity and the phase or constraint involved.

pub mod cache_key;
pub mod plan;

pub use cache_key::CacheKeyDescriptor;
pub use plan::{BuildLayout, BuildPlan, PlannedPhase, ScriptSource};

use crate::eapi::{EapiGate, MIN_EAPI};
use crate::error::ErrorClass;
use crate::executor::{PhaseExecutor, PhaseRequest};
use crate::phase::{BuildPhase, PhaseRecord};
use crate::resolver::{check_blockers, Blocker, ConstraintChecker, DependencyResolver};
use crate::types::PackageDefinition;
use crate::use_flags::{
    args::render_use_args, validate_use_flags, EffectiveUseSet, FlagRegistry, UseResolver,
    ValidationWarning,
};
use crate::{Error, Result};
use buckos_config::BuildProfile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Build state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum BuildState {
    Unresolved,
    Validated,
    Planned,
    Executing(BuildPhase),
    Succeeded,
    Failed,
}

impl BuildState {
    pub fn name(&self) -> &'static str {
        match self {
            BuildState::Unresolved => "unresolved",
            BuildState::Validated => "validated",
            BuildState::Planned => "planned",
            BuildState::Executing(_) => "executing",
            BuildState::Succeeded => "succeeded",
            BuildState::Failed => "failed",
        }
    }
}

/// Why a build failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub class: ErrorClass,
    pub message: String,
    /// Failing phase function name, for phase failures
    pub phase: Option<String>,
    /// Captured output of the failing phase
    pub log: Option<String>,
}

/// A successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub package: String,
    pub fingerprint: String,
    pub phases: Vec<PhaseRecord>,
    /// Files found in the install image
    pub installed_files: usize,
}

/// One package instance moving through the build state machine
pub struct PackageBuild {
    pkg: PackageDefinition,
    profile: Arc<BuildProfile>,
    registry: Arc<FlagRegistry>,
    state: BuildState,
    use_set: Option<EffectiveUseSet>,
    warnings: Vec<ValidationWarning>,
    plan: Option<BuildPlan>,
    records: Vec<PhaseRecord>,
    failure: Option<FailureInfo>,
}

impl PackageBuild {
    pub fn new(pkg: PackageDefinition, profile: Arc<BuildProfile>) -> Self {
        Self::with_registry(pkg, profile, Arc::new(FlagRegistry::with_defaults()))
    }

    pub fn with_registry(
        pkg: PackageDefinition,
        profile: Arc<BuildProfile>,
        registry: Arc<FlagRegistry>,
    ) -> Self {
        Self {
            pkg,
            profile,
            registry,
            state: BuildState::Unresolved,
            use_set: None,
            warnings: Vec::new(),
            plan: None,
            records: Vec::new(),
            failure: None,
        }
    }

    pub fn package(&self) -> &PackageDefinition {
        &self.pkg
    }

    pub fn identity(&self) -> String {
        self.pkg.identity()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn use_set(&self) -> Option<&EffectiveUseSet> {
        self.use_set.as_ref()
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn plan(&self) -> Option<&BuildPlan> {
        self.plan.as_ref()
    }

    /// Phase records; empty until the build is planned
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        self.failure.as_ref()
    }

    fn expect_state(&self, expected: BuildState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                package: self.identity(),
                action,
                state: self.state.name(),
            })
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        let (phase, log) = match &err {
            Error::PhaseFailed { phase, log, .. } => (Some(phase.clone()), Some(log.clone())),
            _ => (None, None),
        };
        error!("{}: build failed: {}", self.identity(), err);
        self.state = BuildState::Failed;
        self.failure = Some(FailureInfo {
            class: err.class(),
            message: err.to_string(),
            phase,
            log,
        });
        err
    }

    /// Resolve USE flags and run the pre-build configuration gates
    pub fn validate(&mut self) -> Result<&EffectiveUseSet> {
        self.expect_state(BuildState::Unresolved, "validate")?;
        match self.run_validation() {
            Ok(use_set) => {
                info!("{}: validated (USE=\"{}\")", self.identity(), use_set.use_string());
                self.state = BuildState::Validated;
                Ok(self.use_set.insert(use_set))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_validation(&mut self) -> Result<EffectiveUseSet> {
        let identity = self.identity();
        EapiGate::require(&identity, self.pkg.eapi, MIN_EAPI)?;

        let global = self.profile.global_use();
        let overrides = self.profile.package_use(&self.pkg.name);
        let requested: Vec<&String> = global
            .requested()
            .chain(overrides.requested())
            .chain(self.pkg.use_defaults.iter())
            .collect();
        self.warnings = validate_use_flags(requested, &self.pkg.iuse, &self.registry);
        for warning in &self.warnings {
            warn!("{}: {}", identity, warning);
        }

        let use_set = UseResolver::resolve(&self.pkg.iuse, &self.pkg.use_defaults, &global, &overrides);

        let constraints = self
            .pkg
            .required_use
            .to_constraints()
            .map_err(|e| e.in_package(&identity))?;
        let result = ConstraintChecker::check(&constraints, &use_set);
        if !result.valid {
            return Err(Error::RequiredUse {
                package: identity,
                errors: result.errors,
            });
        }

        self.check_scripts()?;
        Ok(use_set)
    }

    /// Reject banned helpers in package-supplied phase bodies
    fn check_scripts(&self) -> Result<()> {
        let variant = self.pkg.phase_variants.for_stage(self.pkg.bootstrap_stage);
        for phase in BuildPhase::SEQUENCE {
            let scripts = [Some(&self.pkg.phases), variant];
            for body in scripts.into_iter().flatten().filter_map(|s| phase.script(s)) {
                let report = EapiGate::scan_script(body, self.pkg.eapi);
                if let Some(function) = report.banned.into_iter().next() {
                    return Err(Error::BannedFunction {
                        package: self.identity(),
                        phase: phase.function_name().to_string(),
                        function,
                        eapi: self.pkg.eapi,
                    });
                }
                for function in report.deprecated {
                    warn!(
                        "{}: {} calls {}, deprecated in EAPI {}",
                        self.identity(),
                        phase,
                        function,
                        self.pkg.eapi
                    );
                }
            }
        }
        Ok(())
    }

    /// Resolve dependencies and blockers and compose the phase plan
    ///
    /// `fingerprints` maps dependency targets to their output fingerprints.
    pub fn plan_build(
        &mut self,
        installed: &BTreeSet<String>,
        fingerprints: &BTreeMap<String, String>,
    ) -> Result<&BuildPlan> {
        self.expect_state(BuildState::Validated, "plan")?;
        let Some(use_set) = self.use_set.clone() else {
            return Err(Error::InvalidTransition {
                package: self.identity(),
                action: "plan",
                state: "validated without a USE set",
            });
        };

        match self.compose_plan(&use_set, installed, fingerprints) {
            Ok(plan) => {
                info!(
                    "{}: planned {} phases, cache key {}",
                    self.identity(),
                    plan.phases.len(),
                    plan.fingerprint
                );
                self.records = plan.phases.iter().map(|p| PhaseRecord::new(p.phase)).collect();
                self.state = BuildState::Planned;
                Ok(self.plan.insert(plan))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn compose_plan(
        &self,
        use_set: &EffectiveUseSet,
        installed: &BTreeSet<String>,
        fingerprints: &BTreeMap<String, String>,
    ) -> Result<BuildPlan> {
        let pkg = &self.pkg;
        let identity = pkg.identity();

        let blockers = pkg
            .blockers
            .iter()
            .map(|decl| decl.to_blocker())
            .collect::<Result<Vec<Blocker>>>()
            .map_err(|e| e.in_package(&identity))?;
        let blocker_result = check_blockers(installed, &blockers);
        if blocker_result.has_hard() {
            return Err(Error::HardBlocker {
                package: identity,
                targets: blocker_result.hard_blockers,
            });
        }

        let resolver = DependencyResolver::new(&self.profile);
        let dependencies = resolver.partition(pkg, use_set);
        let sources = resolver.expand_source_uris(pkg)?;

        let locality = plan::locality_for(pkg, self.profile.use_host_toolchain);
        let phases = plan::compose_phases(pkg, self.profile.run_tests, locality);
        let use_args = render_use_args(&pkg.use_args, use_set);
        let env = plan::phase_env(pkg, use_set, &use_args);
        let labels = plan::labels_for(pkg, use_set);

        let cache_key = CacheKeyDescriptor {
            package: identity.clone(),
            slot: pkg.slot.clone(),
            eapi: pkg.eapi,
            bootstrap_stage: pkg.bootstrap_stage,
            use_flags: use_set.canonical(),
            use_args: use_args.clone(),
            dependencies: cache_key::fingerprints_for(
                dependencies.target.build_inputs(),
                fingerprints,
            ),
            host_dependencies: cache_key::fingerprints_for(&dependencies.host, fingerprints),
            pdepend: cache_key::fingerprints_for(&dependencies.target.pdepend, fingerprints),
            phases: phases
                .iter()
                .map(|p| (p.function.clone(), p.body.clone()))
                .collect(),
            env: env.clone(),
            patches: pkg.patches.clone(),
            sources: sources.clone(),
            metadata: pkg.metadata.clone(),
        };
        let fingerprint = cache_key.fingerprint()?;
        debug!("{}: cache key descriptor {:?}", identity, cache_key);

        Ok(BuildPlan {
            package: identity,
            target: pkg.target(),
            bootstrap_stage: pkg.bootstrap_stage,
            locality,
            use_flags: use_set.enabled().map(str::to_string).collect(),
            use_args,
            labels,
            env,
            dependencies,
            blockers: blocker_result,
            sources,
            phases,
            cache_key,
            fingerprint,
        })
    }

    /// Validate then plan
    pub fn prepare(
        &mut self,
        installed: &BTreeSet<String>,
        fingerprints: &BTreeMap<String, String>,
    ) -> Result<&BuildPlan> {
        self.validate()?;
        self.plan_build(installed, fingerprints)
    }

    /// Run every planned phase in order, then verify the install image
    pub async fn execute(
        &mut self,
        executor: &dyn PhaseExecutor,
        layout: &BuildLayout,
    ) -> Result<BuildOutcome> {
        self.expect_state(BuildState::Planned, "execute")?;
        let Some(plan) = self.plan.clone() else {
            return Err(Error::InvalidTransition {
                package: self.identity(),
                action: "execute",
                state: "planned without a plan",
            });
        };

        if let Err(e) = layout.create().await {
            return Err(self.fail(e.into()));
        }

        let mut env = plan.env.clone();
        env.extend(layout.env(&self.pkg));

        for (index, planned) in plan.phases.iter().enumerate() {
            self.state = BuildState::Executing(planned.phase);
            self.records[index].start();
            info!("{}: running {}", plan.package, planned.function);

            let request = PhaseRequest {
                package: plan.package.clone(),
                phase: planned.phase,
                script: planned.body.clone(),
                env: env.clone(),
                workdir: layout.workdir(),
                image_dir: layout.image_dir(),
                context: planned.context,
            };

            let output = match executor.run_phase(&request).await {
                Ok(output) => output,
                Err(e) => {
                    self.records[index].abort(e.to_string());
                    return Err(self.fail(e));
                }
            };

            let exit_code = output.exit_code;
            self.records[index].finish(exit_code, output.log.clone());
            if exit_code != 0 {
                return Err(self.fail(Error::PhaseFailed {
                    package: plan.package.clone(),
                    phase: planned.function.clone(),
                    exit_code,
                    log: output.log,
                }));
            }
        }

        let installed_files = match count_installed_files(layout.image_dir()).await {
            Ok(count) => count,
            Err(e) => return Err(self.fail(e)),
        };
        if installed_files == 0 {
            return Err(self.fail(Error::EmptyInstall {
                package: plan.package.clone(),
                image_dir: layout.image_dir().display().to_string(),
            }));
        }

        self.state = BuildState::Succeeded;
        info!(
            "{}: succeeded, {} files installed",
            plan.package, installed_files
        );
        Ok(BuildOutcome {
            package: plan.package,
            fingerprint: plan.fingerprint,
            phases: self.records.clone(),
            installed_files,
        })
    }
}

/// Count non-directory entries under `image_dir` on the blocking pool
async fn count_installed_files(image_dir: PathBuf) -> Result<usize> {
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(&image_dir) {
            if !entry?.file_type().is_dir() {
                count += 1;
            }
        }
        Ok(count)
    })
    .await
    .map_err(|e| Error::Executor(format!("image scan task failed: {e}")))?
}
