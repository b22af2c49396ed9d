//! Tests for loading build profiles from buckconfig files

use buckos_config::{BuildProfile, ConfigError};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn set(flags: &[&str]) -> BTreeSet<String> {
    flags.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_later_files_win() {
    let dir = tempfile::tempdir().unwrap();
    let system = write(
        &dir,
        "system",
        "[use]\n  ssl = true\n  debug = true\n[buckos]\n  target_platform = x86_64\n",
    );
    let user = write(&dir, "user", "[use]\n  debug = false\n");

    let profile = BuildProfile::load(&[system, user], &[]).unwrap();
    let global = profile.global_use();
    assert_eq!(global.enabled, set(&["ssl"]));
    assert_eq!(global.disabled, set(&["debug"]));
    assert_eq!(profile.platforms.target, "x86_64");
}

#[test]
fn test_command_line_overrides_apply_last() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "buckconfig", "[use.openssl]\n  ssl = true\n");

    let profile = BuildProfile::load(
        &[path],
        &[
            "use.openssl.ssl=false".to_string(),
            "buckos.run_tests=yes".to_string(),
        ],
    )
    .unwrap();

    assert_eq!(profile.package_use("openssl").disabled, set(&["ssl"]));
    assert!(profile.package_use("openssl").enabled.is_empty());
    assert!(profile.run_tests);
}

#[test]
fn test_use_expand_and_mirrors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "buckconfig",
        "[use_expand]\n  video_cards = fbdev,vesa\n  input_devices =\n\
         [use]\n  video_cards_vesa = false\n\
         [mirrors]\n  gnu = https://ftp.gnu.org/gnu/ https://mirrors.kernel.org/gnu\n",
    );

    let profile = BuildProfile::load(&[path], &[]).unwrap();
    let global = profile.global_use();
    assert!(global.enabled.contains("video_cards_fbdev"));
    assert!(!global.enabled.contains("video_cards_vesa"));
    assert!(global.disabled.contains("video_cards_vesa"));

    let urls = profile.mirrors.expand_uri("mirror://gnu/make/make-4.4.tar.gz").unwrap();
    assert_eq!(
        urls,
        vec![
            "https://ftp.gnu.org/gnu/make/make-4.4.tar.gz".to_string(),
            "https://mirrors.kernel.org/gnu/make/make-4.4.tar.gz".to_string(),
        ]
    );
}

#[test]
fn test_invalid_boolean_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "buckconfig", "[use]\n  ssl = maybe\n");

    let err = BuildProfile::load(&[path], &[]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BuildProfile::load(&[dir.path().join("absent")], &[]).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
