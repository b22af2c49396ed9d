//! Tests for USE resolution, REQUIRED_USE, blockers and dependency expansion

use buckos_config::{BuildProfile, UseToggles};
use buckos_package::resolver::{check_blockers, parse_required_use, DependencyEdge};
use buckos_package::*;
use std::collections::{BTreeMap, BTreeSet};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn use_set(enabled: &[&str]) -> EffectiveUseSet {
    EffectiveUseSet::from_flags(enabled.iter().copied(), enabled.iter().copied())
}

mod use_resolution_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn toggles(enabled: &[&str], disabled: &[&str]) -> UseToggles {
        let mut t = UseToggles::new();
        for flag in enabled {
            t.enable(*flag);
        }
        for flag in disabled {
            t.disable(*flag);
        }
        t
    }

    #[test]
    fn test_defaults_only() {
        let set = UseResolver::resolve(
            &strings(&["ssl", "zstd", "http2"]),
            &strings(&["ssl"]),
            &UseToggles::new(),
            &UseToggles::new(),
        );
        assert_eq!(set.canonical(), "ssl");
    }

    #[test]
    fn test_global_disable_beats_default() {
        let set = UseResolver::resolve(
            &strings(&["ssl", "zstd"]),
            &strings(&["ssl"]),
            &toggles(&[], &["ssl"]),
            &UseToggles::new(),
        );
        assert!(!set.is_enabled("ssl"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_package_layer_beats_global() {
        let set = UseResolver::resolve(
            &strings(&["ssl", "zstd"]),
            &[],
            &toggles(&["zstd"], &["ssl"]),
            &toggles(&["ssl"], &["zstd"]),
        );
        assert_eq!(set.canonical(), "ssl");
    }

    #[test]
    fn test_enable_outside_iuse_is_ignored() {
        let set = UseResolver::resolve(
            &strings(&["ssl"]),
            &[],
            &toggles(&["ssl", "X", "wayland"], &[]),
            &UseToggles::new(),
        );
        assert_eq!(set.enabled().collect::<Vec<_>>(), vec!["ssl"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let iuse = strings(&["zstd", "ssl", "http2", "brotli"]);
        let defaults = strings(&["http2", "ssl"]);
        let global = toggles(&["brotli", "zstd"], &["http2"]);
        let first = UseResolver::resolve(&iuse, &defaults, &global, &UseToggles::new());
        let second = UseResolver::resolve(&iuse, &defaults, &global, &UseToggles::new());
        assert_eq!(first, second);
        assert_eq!(first.canonical(), "brotli,ssl,zstd");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let iuse = strings(&["ssl", "zstd", "debug"]);
        let global = toggles(&["zstd"], &["debug"]);
        let once = UseResolver::resolve(&iuse, &strings(&["ssl", "debug"]), &global, &UseToggles::new());
        let enabled: Vec<String> = once.enabled().map(str::to_string).collect();
        let twice = UseResolver::resolve(&iuse, &enabled, &global, &UseToggles::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_resolve_package_uses_package_section() {
        let mut pkg = PackageDefinition::new("net-misc", "curl", "8.5.0");
        pkg.iuse = strings(&["ssl", "zstd"]);

        let mut profile = BuildProfile::default();
        profile.use_flags.global.enable("zstd");
        profile
            .use_flags
            .packages
            .entry("curl".to_string())
            .or_default()
            .enable("ssl")
            .disable("zstd");

        let set = UseResolver::resolve_package(&pkg, &profile);
        assert_eq!(set.canonical(), "ssl");
    }

    #[test]
    fn test_use_environment() {
        let set = EffectiveUseSet::from_flags(["ssl", "zstd"], ["ssl", "zstd", "debug"]);
        let env = set.env();
        assert_eq!(env.get("USE").map(String::as_str), Some("ssl zstd"));
        assert_eq!(env.get("IUSE").map(String::as_str), Some("debug ssl zstd"));
        assert!(set
            .labels()
            .contains(&"buckos:use:ssl".to_string()));
    }

    #[test]
    fn test_validation_warnings() {
        let registry = FlagRegistry::with_defaults();
        let requested = strings(&["ssl", "ssl", "not-a-real-flag", "-bad"]);
        let warnings = use_flags::validate_use_flags(
            requested.iter(),
            &strings(&["ssl"]),
            &registry,
        );

        let flags: Vec<&str> = warnings.iter().map(|w| w.flag.as_str()).collect();
        assert!(!flags.contains(&"ssl"));
        assert!(flags.contains(&"not-a-real-flag"));
        assert!(flags.contains(&"-bad"));
        assert_eq!(flags.len(), 2);
    }
}

mod required_use_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exactly_one() {
        let c = vec![Constraint::ExactlyOne(strings(&["a", "b"]))];

        let result = ConstraintChecker::check(&c, &use_set(&["a"]));
        assert!(result.valid);

        let result = ConstraintChecker::check(&c, &use_set(&["a", "b"]));
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("exactly one"));
        assert!(result.errors[0].contains("found 2"));

        let result = ConstraintChecker::check(&c, &use_set(&[]));
        assert!(!result.valid);
    }

    #[test]
    fn test_at_most_one() {
        let c = vec![Constraint::AtMostOne(strings(&["a", "b"]))];
        assert!(ConstraintChecker::check(&c, &use_set(&[])).valid);
        assert!(ConstraintChecker::check(&c, &use_set(&["b"])).valid);
        assert!(!ConstraintChecker::check(&c, &use_set(&["a", "b"])).valid);
    }

    #[test]
    fn test_any_of() {
        let c = vec![Constraint::AnyOf(strings(&["a", "b"]))];
        assert!(!ConstraintChecker::check(&c, &use_set(&[])).valid);
        assert!(ConstraintChecker::check(&c, &use_set(&["a", "b"])).valid);
    }

    #[test]
    fn test_conditional_only_applies_when_enabled() {
        let c = vec![Constraint::conditional(
            "gui",
            Constraint::ExactlyOne(strings(&["gtk", "qt"])),
        )];

        assert!(ConstraintChecker::check(&c, &use_set(&[])).valid);
        assert!(ConstraintChecker::check(&c, &use_set(&["gui", "qt"])).valid);

        let result = ConstraintChecker::check(&c, &use_set(&["gui"]));
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("gui requires"));
    }

    #[test]
    fn test_all_violations_reported() {
        let c = vec![
            Constraint::AnyOf(strings(&["a", "b"])),
            Constraint::AtMostOne(strings(&["c", "d"])),
        ];
        let result = ConstraintChecker::check(&c, &use_set(&["c", "d"]));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_parse_surface_syntax() {
        let parsed = parse_required_use("^^ ( a b ) gui? ( || ( gtk qt ) )").unwrap();
        assert_eq!(
            parsed,
            vec![
                Constraint::ExactlyOne(strings(&["a", "b"])),
                Constraint::conditional("gui", Constraint::AnyOf(strings(&["gtk", "qt"]))),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bare_flag() {
        let err = parse_required_use("ssl").unwrap_err();
        assert!(err.is_configuration());
    }
}

mod blocker_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn installed(targets: &[&str]) -> BTreeSet<String> {
        targets.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_soft_and_hard_blockers() {
        let blockers = vec![Blocker::soft("old-x"), Blocker::hard("conflict-y")];

        let result = check_blockers(&installed(&["old-x", "conflict-y"]), &blockers);
        assert!(result.blocked);
        assert_eq!(result.hard_blockers, strings(&["conflict-y"]));
        assert_eq!(result.soft_blockers, strings(&["old-x"]));
        assert!(result.has_hard());

        let result = check_blockers(&installed(&["old-x"]), &blockers);
        assert!(result.blocked);
        assert!(result.hard_blockers.is_empty());
        assert!(!result.has_hard());
    }

    #[test]
    fn test_nothing_installed() {
        let blockers = vec![Blocker::hard("conflict-y")];
        let result = check_blockers(&installed(&[]), &blockers);
        assert!(!result.blocked);
    }

    #[test]
    fn test_parse_atoms() {
        assert_eq!(Blocker::parse("!old-x").unwrap(), Blocker::soft("old-x"));
        assert_eq!(Blocker::parse("!!conflict-y").unwrap(), Blocker::hard("conflict-y"));
        assert!(Blocker::parse("conflict-y").is_err());
        assert_eq!(Blocker::hard("conflict-y").to_string(), "!!conflict-y");
    }
}

mod dependency_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_conditional_union() {
        let mut use_deps = BTreeMap::new();
        use_deps.insert("ssl".to_string(), strings(&["//pkg/openssl"]));
        use_deps.insert("http2".to_string(), strings(&["//pkg/nghttp2", "//pkg/openssl"]));
        use_deps.insert("zstd".to_string(), strings(&["//pkg/zstd"]));

        let expanded =
            DependencyResolver::expand_conditional(&use_deps, &use_set(&["ssl", "http2"]));
        assert_eq!(expanded, strings(&["//pkg/nghttp2", "//pkg/openssl"]));

        assert!(DependencyResolver::expand_conditional(&use_deps, &use_set(&[])).is_empty());
    }

    #[test]
    fn test_exec_bdepend_stays_off_target_graph() {
        let mut pkg = PackageDefinition::new("dev-util", "meson-tool", "1.0");
        pkg.dependencies.depend = strings(&["//pkg/zlib"]).into();
        pkg.dependencies.bdepend = strings(&["//pkg/meson"]).into();
        pkg.dependencies.exec_bdepend = strings(&["//pkg/python"]).into();

        let profile = BuildProfile::default();
        let partitioned = DependencyResolver::new(&profile).partition(&pkg, &use_set(&[]));

        assert_eq!(partitioned.host, strings(&["//pkg/python"]));
        let target: Vec<&String> = partitioned.target.build_inputs().collect();
        assert!(!target.iter().any(|t| t.as_str() == "//pkg/python"));
        assert_eq!(partitioned.target.bdepend, strings(&["//pkg/meson"]));
    }

    #[test]
    fn test_exec_bdepend_resolves_for_host_platform() {
        let mut by_platform = BTreeMap::new();
        by_platform.insert("x86_64".to_string(), strings(&["//pkg/nasm"]));
        by_platform.insert("aarch64".to_string(), strings(&["//pkg/arm-asm"]));

        let mut pkg = PackageDefinition::new("media-libs", "codec", "1.0");
        pkg.dependencies.exec_bdepend = DependencySpec::PlatformConditional(by_platform.clone());
        pkg.dependencies.depend = DependencySpec::PlatformConditional(by_platform);

        let mut profile = BuildProfile::default();
        profile.platforms.host = "x86_64".to_string();
        profile.platforms.target = "aarch64".to_string();

        let partitioned = DependencyResolver::new(&profile).partition(&pkg, &use_set(&[]));
        assert_eq!(partitioned.host, strings(&["//pkg/nasm"]));
        assert_eq!(partitioned.target.depend, strings(&["//pkg/arm-asm"]));
    }

    #[test]
    fn test_use_deps_join_depend() {
        let mut pkg = PackageDefinition::new("net-misc", "curl", "8.5.0");
        pkg.iuse = strings(&["ssl"]);
        pkg.dependencies.depend = strings(&["//pkg/openssl"]).into();
        pkg.use_deps.insert("ssl".to_string(), strings(&["//pkg/openssl", "//pkg/ca-certs"]));

        let profile = BuildProfile::default();
        let partitioned = DependencyResolver::new(&profile).partition(&pkg, &use_set(&["ssl"]));

        assert_eq!(partitioned.target.depend, strings(&["//pkg/openssl", "//pkg/ca-certs"]));
        let from_flag: Vec<&DependencyEdge> = partitioned
            .edges
            .iter()
            .filter(|e| e.use_flag.as_deref() == Some("ssl"))
            .collect();
        assert_eq!(from_flag.len(), 1);
        assert_eq!(from_flag[0].target, "//pkg/ca-certs");
    }

    fn catalog_package(name: &str, rdepend: &[&str], bdepend: &[&str]) -> PackageDefinition {
        let mut pkg = PackageDefinition::new("pkg", name, "1.0");
        pkg.target = Some(format!("//pkg/{}", name));
        pkg.dependencies.rdepend = strings(rdepend).into();
        pkg.dependencies.bdepend = strings(bdepend).into();
        pkg
    }

    #[test]
    fn test_transitive_dedup_and_cycles() {
        let catalog: PackageCatalog = vec![
            catalog_package("a", &["//pkg/b", "//pkg/c"], &[]),
            catalog_package("b", &["//pkg/c"], &["//pkg/cmake"]),
            catalog_package("c", &["//pkg/a"], &[]),
        ]
        .into_iter()
        .collect();

        let root = catalog_package("app", &["//pkg/a"], &[]);
        let profile = BuildProfile::default();
        let collected = DependencyResolver::new(&profile).collect_transitive(
            &[&root],
            &[DependencyRole::Depend, DependencyRole::Rdepend, DependencyRole::Pdepend],
            &catalog,
        );

        assert_eq!(collected, strings(&["//pkg/a", "//pkg/b", "//pkg/c"]));
    }

    #[test]
    fn test_transitive_excludes_roots_in_cycle() {
        let catalog: PackageCatalog = vec![
            catalog_package("a", &["//pkg/app"], &[]),
            catalog_package("app", &["//pkg/a"], &[]),
        ]
        .into_iter()
        .collect();

        let root = catalog_package("app", &["//pkg/a"], &[]);
        let lib = catalog_package("lib", &["//pkg/app"], &[]);
        let profile = BuildProfile::default();
        let resolver = DependencyResolver::new(&profile);
        let roles = [DependencyRole::Rdepend];

        assert_eq!(
            resolver.collect_transitive(&[&root], &roles, &catalog),
            strings(&["//pkg/a"])
        );
        // Each root is excluded even when another root depends on it.
        assert_eq!(
            resolver.collect_transitive(&[&root, &lib], &roles, &catalog),
            strings(&["//pkg/a"])
        );
    }

    #[test]
    fn test_transitive_ignores_build_only_roles() {
        let catalog = PackageCatalog::new();
        let root = catalog_package("app", &["//pkg/zlib"], &["//pkg/cmake"]);
        let profile = BuildProfile::default();

        let collected = DependencyResolver::new(&profile).collect_transitive(
            &[&root],
            &[DependencyRole::Rdepend, DependencyRole::Bdepend],
            &catalog,
        );
        assert_eq!(collected, strings(&["//pkg/zlib"]));
    }

    #[test]
    fn test_unknown_mirror_is_configuration_error() {
        let mut pkg = PackageDefinition::new("net-misc", "curl", "8.5.0");
        pkg.src_uri = strings(&["mirror://nowhere/curl-8.5.0.tar.xz"]);

        let profile = BuildProfile::default();
        let err = DependencyResolver::new(&profile)
            .expand_source_uris(&pkg)
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
