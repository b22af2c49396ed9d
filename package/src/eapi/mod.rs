//! EAPI feature gating
//!
//! Each supported EAPI declares a feature table, deprecated and banned helper
//! functions, and default phase bodies. Tables inherit upward: EAPI N sees
//! everything declared by every supported version at or below N.

use crate::phase::BuildPhase;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Oldest supported EAPI
pub const MIN_EAPI: u32 = 6;
/// Newest supported EAPI
pub const MAX_EAPI: u32 = 8;
/// EAPI assumed when a package does not declare one
pub const DEFAULT_EAPI: u32 = 8;

/// Feature-table keys with this prefix are bookkeeping, not features
pub const INHERIT_MARKER_PREFIX: &str = "inherits-all";

fn feature_table(eapi: u32) -> &'static [(&'static str, bool)] {
    match eapi {
        6 => &[
            ("default_src_prepare", true),
            ("eapply", true),
            ("eapply_user", true),
            ("einstalldocs", true),
            ("in_iuse", true),
            ("get_libdir", true),
            ("bdepend", false),
            ("sysroot", false),
        ],
        7 => &[
            ("inherits-all-from-6", true),
            ("bdepend", true),
            ("sysroot", true),
            ("ver_functions", true),
            ("strict_econf_source", true),
            ("eqawarn", true),
        ],
        8 => &[
            ("inherits-all-from-7", true),
            ("idepend", true),
            ("strict_dosym", true),
            ("usev_two_args", true),
            ("selective_fetch_restrict", true),
            ("econf_disable_static", true),
        ],
        _ => &[],
    }
}

fn deprecated_table(eapi: u32) -> &'static [&'static str] {
    match eapi {
        6 => &["einstall"],
        7 => &["dohtml", "dolib", "libopts"],
        8 => &["hasv", "hasq", "useq"],
        _ => &[],
    }
}

fn banned_table(eapi: u32) -> &'static [&'static str] {
    match eapi {
        7 => &["einstall"],
        8 => &["dohtml", "dolib", "libopts"],
        _ => &[],
    }
}

fn default_phase_table(eapi: u32) -> &'static [(BuildPhase, &'static str)] {
    match eapi {
        6 => &[
            (
                BuildPhase::Unpack,
                r#"for archive in $DISTFILES; do tar -xf "$archive" -C "$WORKDIR"; done"#,
            ),
            (
                BuildPhase::Prepare,
                r#"for patch in $PATCHES; do patch -d "$S" -p1 < "$patch"; done"#,
            ),
            (BuildPhase::PreConfigure, ":"),
            (
                BuildPhase::Configure,
                r#"if [ -x "$S/configure" ]; then cd "$S" && ./configure --prefix=/usr $USE_ARGS; fi"#,
            ),
            (
                BuildPhase::Compile,
                r#"if [ -f "$S/Makefile" ]; then make -C "$S" $MAKEOPTS; fi"#,
            ),
            (
                BuildPhase::Test,
                r#"if [ -f "$S/Makefile" ]; then make -C "$S" check; fi"#,
            ),
            (
                BuildPhase::Install,
                r#"if [ -f "$S/Makefile" ]; then make -C "$S" DESTDIR="$D" install; fi"#,
            ),
        ],
        7 => &[(
            BuildPhase::Configure,
            r#"if [ -x "$S/configure" ]; then cd "$S" && ./configure --prefix=/usr --sysconfdir=/etc --localstatedir=/var $USE_ARGS; fi"#,
        )],
        8 => &[(
            BuildPhase::Install,
            r#"if [ -f "$S/Makefile" ]; then make -C "$S" DESTDIR="$D" install; fi
for doc in README NEWS ChangeLog; do
  if [ -f "$S/$doc" ]; then install -Dm644 "$S/$doc" "$D/usr/share/doc/$PF/$doc"; fi
done"#,
        )],
        _ => &[],
    }
}

/// Supported versions at or below `eapi`, lowest first
fn versions_up_to(eapi: u32) -> std::ops::RangeInclusive<u32> {
    MIN_EAPI..=eapi.min(MAX_EAPI)
}

/// Helper functions found in a phase script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub deprecated: Vec<String>,
    pub banned: Vec<String>,
}

/// Versioned feature gate
pub struct EapiGate;

impl EapiGate {
    pub fn is_supported(eapi: u32) -> bool {
        (MIN_EAPI..=MAX_EAPI).contains(&eapi)
    }

    /// Union of every feature table up to `eapi`; later versions override earlier values
    pub fn features(eapi: u32) -> BTreeMap<String, bool> {
        let mut features = BTreeMap::new();
        for version in versions_up_to(eapi) {
            for (name, enabled) in feature_table(version) {
                if name.starts_with(INHERIT_MARKER_PREFIX) {
                    continue;
                }
                features.insert(name.to_string(), *enabled);
            }
        }
        features
    }

    pub fn has_feature(feature: &str, eapi: u32) -> bool {
        Self::features(eapi).get(feature).copied().unwrap_or(false)
    }

    /// Functions deprecated at or below `eapi`
    pub fn deprecated(eapi: u32) -> BTreeSet<&'static str> {
        versions_up_to(eapi)
            .flat_map(|v| deprecated_table(v).iter().copied())
            .collect()
    }

    /// Functions banned at or below `eapi`
    pub fn banned(eapi: u32) -> BTreeSet<&'static str> {
        versions_up_to(eapi)
            .flat_map(|v| banned_table(v).iter().copied())
            .collect()
    }

    pub fn is_deprecated(function: &str, eapi: u32) -> bool {
        Self::deprecated(eapi).contains(function)
    }

    pub fn is_banned(function: &str, eapi: u32) -> bool {
        Self::banned(eapi).contains(function)
    }

    /// Fail unless `eapi` is supported and at least `min`
    pub fn require(package: &str, eapi: u32, min: u32) -> Result<()> {
        if !Self::is_supported(eapi) {
            return Err(Error::UnsupportedEapi {
                package: package.to_string(),
                eapi,
                min: MIN_EAPI,
                max: MAX_EAPI,
            });
        }
        if eapi < min {
            return Err(Error::EapiTooOld {
                package: package.to_string(),
                eapi,
                required: min,
            });
        }
        Ok(())
    }

    /// Default body for `phase`: the nearest version at or below `eapi` that defines one
    pub fn default_phase(phase: BuildPhase, eapi: u32) -> Option<&'static str> {
        versions_up_to(eapi).rev().find_map(|version| {
            default_phase_table(version)
                .iter()
                .find(|(p, _)| *p == phase)
                .map(|(_, body)| *body)
        })
    }

    /// Find deprecated and banned helpers called by `script`
    pub fn scan_script(script: &str, eapi: u32) -> ScriptReport {
        let deprecated = Self::deprecated(eapi);
        let banned = Self::banned(eapi);
        let mut report = ScriptReport::default();
        let mut seen = BTreeSet::new();

        let words = script
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty());
        for word in words {
            if !seen.insert(word) {
                continue;
            }
            if banned.contains(word) {
                report.banned.push(word.to_string());
            } else if deprecated.contains(word) {
                report.deprecated.push(word.to_string());
            }
        }
        report
    }
}
