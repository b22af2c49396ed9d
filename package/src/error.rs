//! Error types for the build engine

use thiserror::Error;

/// Result type alias for build engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of fatal errors
///
/// Every class stops processing for the affected package instance only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Pre-build: bad EAPI, REQUIRED_USE violation, unknown mirror, bad definition
    Configuration,
    /// Pre-build: a hard blocker is installed
    Blocker,
    /// Mid-build: a phase script exited non-zero
    Phase,
    /// Post-build: install succeeded but produced nothing
    EmptyInstall,
    /// Anything else (I/O, executor plumbing)
    Internal,
}

/// Build engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("{package}: unsupported EAPI {eapi} (supported {min}..={max})")]
    UnsupportedEapi {
        package: String,
        eapi: u32,
        min: u32,
        max: u32,
    },

    #[error("{package}: EAPI {eapi} is older than required EAPI {required}")]
    EapiTooOld {
        package: String,
        eapi: u32,
        required: u32,
    },

    #[error("{package}: REQUIRED_USE not satisfied: {}", .errors.join("; "))]
    RequiredUse {
        package: String,
        errors: Vec<String>,
    },

    #[error("{package}: {phase} calls {function}, which is banned in EAPI {eapi}")]
    BannedFunction {
        package: String,
        phase: String,
        function: String,
        eapi: u32,
    },

    #[error("Invalid REQUIRED_USE {input:?}: {message}")]
    InvalidRequiredUse { input: String, message: String },

    #[error("Invalid blocker: {0}")]
    InvalidBlocker(String),

    #[error("{package}: configuration error: {source}")]
    Config {
        package: String,
        #[source]
        source: buckos_config::ConfigError,
    },

    #[error("Invalid package definition: {0}")]
    InvalidPackage(String),

    #[error("{package}: {source}")]
    InPackage {
        package: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{package}: blocked by installed package(s): {}", .targets.join(", "))]
    HardBlocker {
        package: String,
        targets: Vec<String>,
    },

    #[error("{package}: {phase} failed with exit code {exit_code}")]
    PhaseFailed {
        package: String,
        phase: String,
        exit_code: i32,
        log: String,
    },

    #[error("{package}: src_install exited successfully but installed no files into {image_dir}")]
    EmptyInstall { package: String, image_dir: String },

    #[error("{package}: cannot {action} while {state}")]
    InvalidTransition {
        package: String,
        action: &'static str,
        state: &'static str,
    },

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Walk directory error: {0}")]
    WalkDirError(#[from] walkdir::Error),
}

impl Error {
    /// Which failure class this error belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnsupportedEapi { .. }
            | Error::EapiTooOld { .. }
            | Error::RequiredUse { .. }
            | Error::BannedFunction { .. }
            | Error::InvalidRequiredUse { .. }
            | Error::InvalidBlocker(_)
            | Error::Config { .. }
            | Error::InvalidPackage(_)
            | Error::TomlError(_) => ErrorClass::Configuration,
            Error::InPackage { source, .. } => source.class(),
            Error::HardBlocker { .. } => ErrorClass::Blocker,
            Error::PhaseFailed { .. } => ErrorClass::Phase,
            Error::EmptyInstall { .. } => ErrorClass::EmptyInstall,
            Error::InvalidTransition { .. }
            | Error::Executor(_)
            | Error::IoError(_)
            | Error::SerializationError(_)
            | Error::WalkDirError(_) => ErrorClass::Internal,
        }
    }

    /// Attach the failing package's identity
    pub fn in_package(self, package: impl Into<String>) -> Self {
        match self {
            Error::InPackage { .. } => self,
            source => Error::InPackage {
                package: package.into(),
                source: Box::new(source),
            },
        }
    }

    /// Whether this error is a pre-build configuration error
    pub fn is_configuration(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_failure_names_phase() {
        let err = Error::PhaseFailed {
            package: "dev-libs/foo-1.0".to_string(),
            phase: "src_configure".to_string(),
            exit_code: 1,
            log: "configure: error".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Phase);
        assert!(err.to_string().contains("src_configure"));
        assert!(err.to_string().contains("dev-libs/foo-1.0"));
    }

    #[test]
    fn test_required_use_message() {
        let err = Error::RequiredUse {
            package: "net-misc/curl-8.5.0".to_string(),
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "net-misc/curl-8.5.0: REQUIRED_USE not satisfied: a; b");
    }

    #[test]
    fn test_in_package_keeps_class() {
        let err = Error::InvalidBlocker("!".to_string()).in_package("dev-libs/foo-1.0");
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.to_string(), "dev-libs/foo-1.0: Invalid blocker: !");

        let again = err.in_package("other/pkg-2");
        assert_eq!(again.to_string(), "dev-libs/foo-1.0: Invalid blocker: !");
    }
}
