//! Global USE flag catalog
//!
//! The registry only feeds validation warnings; it never changes what a
//! package resolves to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A known global USE flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagInfo {
    pub name: String,
    pub description: String,
}

/// Flags every profile knows about
const GLOBAL_FLAGS: &[(&str, &str)] = &[
    ("X", "Add support for X11"),
    ("wayland", "Enable Wayland support"),
    ("systemd", "Enable systemd integration"),
    ("pam", "Add support for PAM"),
    ("pipewire", "Add support for PipeWire"),
    ("pulseaudio", "Add support for PulseAudio"),
    ("alsa", "Add support for ALSA"),
    ("dbus", "Enable D-Bus support"),
    ("gtk", "Add support for GTK+"),
    ("qt5", "Add support for Qt5"),
    ("qt6", "Add support for Qt6"),
    ("gui", "Build graphical frontends"),
    ("ssl", "Add support for SSL/TLS"),
    ("gnutls", "Use GnuTLS instead of OpenSSL"),
    ("libressl", "Use LibreSSL instead of OpenSSL"),
    ("ipv6", "Add support for IPv6"),
    ("zlib", "Enable zlib compression"),
    ("zstd", "Enable zstd compression"),
    ("lz4", "Enable LZ4 compression"),
    ("lzma", "Enable LZMA compression"),
    ("bzip2", "Enable bzip2 compression"),
    ("threads", "Enable threading support"),
    ("unicode", "Enable Unicode support"),
    ("nls", "Add native language support"),
    ("readline", "Enable GNU readline support"),
    ("ncurses", "Add ncurses support"),
    ("python", "Add optional Python bindings"),
    ("perl", "Add optional Perl bindings"),
    ("ruby", "Add optional Ruby bindings"),
    ("lua", "Add optional Lua bindings"),
    ("static", "Build static binaries"),
    ("static-libs", "Build static libraries"),
    ("lto", "Enable link-time optimization"),
    ("pgo", "Enable profile-guided optimization"),
    ("doc", "Build documentation"),
    ("man", "Build and install man pages"),
    ("examples", "Install examples"),
    ("test", "Build and run tests"),
    ("debug", "Enable debug symbols and features"),
    ("selinux", "Enable SELinux support"),
];

/// Catalog of known flags with descriptions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagRegistry {
    flags: BTreeMap<String, String>,
}

impl FlagRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the global flag catalog
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, description) in GLOBAL_FLAGS {
            registry.register(*name, *description);
        }
        registry
    }

    /// Add or replace a flag
    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.flags.insert(name.into(), description.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(|d| d.as_str())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FlagInfo> + '_ {
        self.flags.iter().map(|(name, description)| FlagInfo {
            name: name.clone(),
            description: description.clone(),
        })
    }
}
