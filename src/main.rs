//! Buckos build CLI
//!
//! Resolves, checks, plans and builds a single package definition against
//! the active build profile. Results are printed as JSON.

mod profile;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::BuildProfile;
use package::executor::BuildCoordinator;
use package::use_flags::validate_use_flags;
use package::{
    ConstraintChecker, DependencyResolver, DependencyRole, Error, FlagRegistry, PackageBuild,
    PackageCatalog, PackageDefinition, ShellExecutor, UseResolver,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "buckos-build",
    about = "Buckos package build engine - USE resolution, REQUIRED_USE, dependencies and phases",
    version,
    author
)]
struct Cli {
    /// Additional buckconfig file (repeatable, later files win)
    #[arg(long = "buckconfig", global = true, value_name = "FILE")]
    buckconfig: Vec<PathBuf>,

    /// Override a config value (repeatable)
    #[arg(short = 'c', long = "config", global = true, value_name = "SECTION.KEY=VALUE")]
    overrides: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective USE set and validation warnings
    Resolve(PackageArgs),
    /// Check REQUIRED_USE (exits non-zero when violated)
    Check(PackageArgs),
    /// Print the build plan and cache key
    Plan(PlanArgs),
    /// Plan and run every phase with the local shell executor
    Build(BuildArgs),
}

#[derive(Args)]
struct PackageArgs {
    /// Package definition (TOML)
    package: PathBuf,
}

#[derive(Args)]
struct PlanArgs {
    /// Package definition (TOML)
    package: PathBuf,

    /// Installed target, checked against blockers (repeatable)
    #[arg(long, value_name = "TARGET")]
    installed: Vec<String>,

    /// Dependency output fingerprint (repeatable)
    #[arg(long = "fingerprint", value_name = "TARGET=HASH")]
    fingerprints: Vec<String>,

    /// Include src_test
    #[arg(long)]
    test: bool,

    /// Directory of package definitions used to list transitive runtime dependencies
    #[arg(long, value_name = "DIR")]
    catalog: Option<PathBuf>,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    plan: PlanArgs,

    /// Build directory
    #[arg(long, value_name = "DIR")]
    workdir: PathBuf,

    /// Run phases without network isolation
    #[arg(long = "no-isolation")]
    no_isolation: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let profile = match profile::load_profile(&cli.buckconfig, &cli.overrides) {
        Ok(p) => p,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Resolve(args) => cmd_resolve(&profile, args),
        Commands::Check(args) => cmd_check(&profile, args),
        Commands::Plan(args) => cmd_plan(profile, args),
        Commands::Build(args) => cmd_build(profile, args).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_package(path: &Path) -> Result<PackageDefinition> {
    PackageDefinition::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_fingerprints(specs: &[String]) -> Result<BTreeMap<String, String>> {
    specs
        .iter()
        .map(|spec| {
            spec.split_once('=')
                .map(|(target, hash)| (target.to_string(), hash.to_string()))
                .with_context(|| format!("Invalid fingerprint (expected TARGET=HASH): {spec}"))
        })
        .collect()
}

fn cmd_resolve(profile: &BuildProfile, args: PackageArgs) -> Result<bool> {
    let pkg = load_package(&args.package)?;
    let use_set = UseResolver::resolve_package(&pkg, profile);

    let global = profile.global_use();
    let overrides = profile.package_use(&pkg.name);
    let requested = global
        .requested()
        .chain(overrides.requested())
        .chain(pkg.use_defaults.iter());
    let warnings = validate_use_flags(requested, &pkg.iuse, &FlagRegistry::with_defaults());

    print_json(&serde_json::json!({
        "package": pkg.identity(),
        "use": use_set.to_map(),
        "enabled": use_set.canonical(),
        "warnings": warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    }))?;
    Ok(true)
}

fn cmd_check(profile: &BuildProfile, args: PackageArgs) -> Result<bool> {
    let pkg = load_package(&args.package)?;
    let use_set = UseResolver::resolve_package(&pkg, profile);
    let constraints = pkg
        .required_use
        .to_constraints()
        .map_err(|e| e.in_package(pkg.identity()))?;
    let result = ConstraintChecker::check(&constraints, &use_set);

    print_json(&serde_json::json!({
        "package": pkg.identity(),
        "valid": result.valid,
        "errors": result.errors,
    }))?;
    Ok(result.valid)
}

fn prepare_build(profile: BuildProfile, args: &PlanArgs) -> Result<PackageBuild> {
    let pkg = load_package(&args.package)?;
    let profile = Arc::new(profile.with_tests(args.test));
    let installed: BTreeSet<String> = args.installed.iter().cloned().collect();
    let fingerprints = parse_fingerprints(&args.fingerprints)?;

    let mut build = PackageBuild::new(pkg, profile);
    build.prepare(&installed, &fingerprints)?;
    Ok(build)
}

fn cmd_plan(profile: BuildProfile, args: PlanArgs) -> Result<bool> {
    let transitive = match &args.catalog {
        Some(dir) => {
            let catalog = PackageCatalog::load_dir(dir)?;
            let pkg = load_package(&args.package)?;
            Some(DependencyResolver::new(&profile).collect_transitive(
                &[&pkg],
                &[
                    DependencyRole::Depend,
                    DependencyRole::Rdepend,
                    DependencyRole::Pdepend,
                ],
                &catalog,
            ))
        }
        None => None,
    };

    let build = prepare_build(profile, &args)?;
    let Some(plan) = build.plan() else {
        return Ok(false);
    };

    print_json(&serde_json::json!({
        "plan": plan,
        "warnings": build.warnings().iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        "transitive": transitive,
    }))?;
    Ok(true)
}

async fn cmd_build(profile: BuildProfile, args: BuildArgs) -> Result<bool> {
    let build = prepare_build(profile, &args.plan)?;
    info!("Building {} in {}", build.identity(), args.workdir.display());

    let mut executor = ShellExecutor::new();
    if args.no_isolation {
        executor = executor.without_isolation();
    }
    let coordinator = BuildCoordinator::new(Arc::new(executor), &args.workdir);

    match coordinator.run(build).await {
        Ok(result) => {
            print_json(&result.outcome)?;
            Ok(true)
        }
        Err(Error::PhaseFailed {
            package,
            phase,
            exit_code,
            log,
        }) => {
            eprintln!("{log}");
            error!("{package}: {phase} failed with exit code {exit_code}");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
