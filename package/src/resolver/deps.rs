//! Dependency partitioning and expansion
//!
//! Dependencies are concrete target references; nothing here selects
//! versions. `exec_bdepend` is resolved against the host platform and kept
//! apart from the target graph.

use crate::catalog::PackageCatalog;
use crate::types::{DependencyRole, PackageDefinition, PlatformSide};
use crate::use_flags::{EffectiveUseSet, UseResolver};
use crate::{Error, Result};
use buckos_config::{BuildProfile, MirrorGroups};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// One resolved dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub role: DependencyRole,
    /// USE flag that pulled this edge in, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_flag: Option<String>,
}

/// Target-platform dependencies by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDependencies {
    pub depend: Vec<String>,
    pub rdepend: Vec<String>,
    pub bdepend: Vec<String>,
    pub pdepend: Vec<String>,
}

impl TargetDependencies {
    pub fn get(&self, role: DependencyRole) -> &[String] {
        match role {
            DependencyRole::Depend => &self.depend,
            DependencyRole::Rdepend => &self.rdepend,
            DependencyRole::Bdepend => &self.bdepend,
            DependencyRole::Pdepend => &self.pdepend,
            DependencyRole::ExecBdepend => &[],
        }
    }

    fn get_mut(&mut self, role: DependencyRole) -> Option<&mut Vec<String>> {
        match role {
            DependencyRole::Depend => Some(&mut self.depend),
            DependencyRole::Rdepend => Some(&mut self.rdepend),
            DependencyRole::Bdepend => Some(&mut self.bdepend),
            DependencyRole::Pdepend => Some(&mut self.pdepend),
            DependencyRole::ExecBdepend => None,
        }
    }

    /// Targets that gate the build (everything but `pdepend`)
    pub fn build_inputs(&self) -> impl Iterator<Item = &String> {
        self.depend
            .iter()
            .chain(self.rdepend.iter())
            .chain(self.bdepend.iter())
    }
}

/// Dependencies split by the platform they resolve against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedDependencies {
    pub target: TargetDependencies,
    /// `exec_bdepend`, resolved for the host platform
    pub host: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

/// Resolves declared dependencies under one profile
pub struct DependencyResolver<'a> {
    profile: &'a BuildProfile,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(profile: &'a BuildProfile) -> Self {
        Self { profile }
    }

    /// Union of the dependency lists of every enabled flag, duplicates collapsed
    pub fn expand_conditional(
        use_deps: &BTreeMap<String, Vec<String>>,
        enabled: &EffectiveUseSet,
    ) -> Vec<String> {
        let mut seen = BTreeSet::new();
        use_deps
            .iter()
            .filter(|(flag, _)| enabled.is_enabled(flag))
            .flat_map(|(_, deps)| deps.iter())
            .filter(|dep| seen.insert(dep.as_str()))
            .cloned()
            .collect()
    }

    /// Resolve every role for `pkg` and split target from host dependencies
    ///
    /// USE-conditional dependencies of enabled flags are appended to `depend`.
    pub fn partition(
        &self,
        pkg: &PackageDefinition,
        enabled: &EffectiveUseSet,
    ) -> PartitionedDependencies {
        let source = pkg.target();
        let platforms = &self.profile.platforms;
        let mut partitioned = PartitionedDependencies::default();

        let mut push = |role: DependencyRole, target: &str, use_flag: Option<&str>| {
            let bucket = match partitioned.target.get_mut(role) {
                Some(bucket) => bucket,
                None => &mut partitioned.host,
            };
            if bucket.iter().any(|t| t == target) {
                return;
            }
            bucket.push(target.to_string());
            partitioned.edges.push(DependencyEdge {
                source: source.clone(),
                target: target.to_string(),
                role,
                use_flag: use_flag.map(str::to_string),
            });
        };

        for role in DependencyRole::ALL {
            let platform = match role.platform_side() {
                PlatformSide::Target => platforms.target.as_str(),
                PlatformSide::Host => platforms.host.as_str(),
            };
            for target in pkg.dependencies.get(role).resolve(platform) {
                push(role, target, None);
            }
        }

        for (flag, deps) in &pkg.use_deps {
            if !enabled.is_enabled(flag) {
                continue;
            }
            for target in deps {
                push(DependencyRole::Depend, target, Some(flag.as_str()));
            }
        }

        debug!(
            "{}: {} target deps, {} host deps",
            pkg.identity(),
            partitioned.edges.len() - partitioned.host.len(),
            partitioned.host.len()
        );
        partitioned
    }

    /// Walk runtime dependency edges from `roots`
    ///
    /// Only `depend`, `rdepend` and `pdepend` are followed; other roles in
    /// `role_filter` are ignored. Each target is reported once, in discovery
    /// order. Targets missing from `catalog` are leaves. The roots themselves
    /// are never reported, even when a dependency cycle leads back to them.
    pub fn collect_transitive(
        &self,
        roots: &[&PackageDefinition],
        role_filter: &[DependencyRole],
        catalog: &PackageCatalog,
    ) -> Vec<String> {
        let roles: Vec<DependencyRole> = role_filter
            .iter()
            .copied()
            .filter(DependencyRole::is_transitive)
            .collect();

        let mut visited: BTreeSet<String> = roots.iter().map(|root| root.target()).collect();
        let mut collected = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        let enqueue = |pkg: &PackageDefinition, queue: &mut VecDeque<String>| {
            let enabled = UseResolver::resolve_package(pkg, self.profile);
            let partitioned = self.partition(pkg, &enabled);
            for role in &roles {
                queue.extend(partitioned.target.get(*role).iter().cloned());
            }
        };

        for root in roots {
            enqueue(root, &mut queue);
        }

        while let Some(target) = queue.pop_front() {
            if !visited.insert(target.clone()) {
                continue;
            }
            collected.push(target.clone());
            if let Some(pkg) = catalog.get(&target) {
                enqueue(pkg, &mut queue);
            }
        }

        collected
    }

    /// Expand `mirror://` source URIs through the profile's mirror groups
    pub fn expand_source_uris(&self, pkg: &PackageDefinition) -> Result<Vec<String>> {
        expand_source_uris(&pkg.identity(), &pkg.src_uri, &self.profile.mirrors)
    }
}

/// Expand source URIs; an unknown mirror group is a configuration error
pub fn expand_source_uris(
    package: &str,
    uris: &[String],
    mirrors: &MirrorGroups,
) -> Result<Vec<String>> {
    let mut expanded = Vec::new();
    for uri in uris {
        let urls = mirrors.expand_uri(uri).map_err(|source| Error::Config {
            package: package.to_string(),
            source,
        })?;
        expanded.extend(urls);
    }
    Ok(expanded)
}
