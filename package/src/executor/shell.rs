//! Local shell executor
//!
//! Runs each phase with `bash -e -c`. Phases without a network grant are
//! wrapped in `unshare --net` when unprivileged user namespaces work on this
//! host; otherwise they run unisolated with a warning.

use super::{PhaseExecutor, PhaseOutput, PhaseRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Executes phases as local bash scripts
pub struct ShellExecutor {
    shell: String,
    isolate_network: bool,
    unshare_usable: OnceCell<bool>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
            isolate_network: true,
            unshare_usable: OnceCell::new(),
        }
    }

    /// Never wrap phases in a network namespace
    pub fn without_isolation(mut self) -> Self {
        self.isolate_network = false;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Probe once whether `unshare --net` can run here
    async fn can_unshare(&self) -> bool {
        *self
            .unshare_usable
            .get_or_init(|| async {
                let usable = Command::new("unshare")
                    .args(["--user", "--map-root-user", "--net", "true"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await
                    .map(|status| status.success())
                    .unwrap_or(false);
                debug!("Network isolation via unshare available: {}", usable);
                usable
            })
            .await
    }

    async fn build_command(&self, request: &PhaseRequest) -> Command {
        let isolate = self.isolate_network && !request.context.network;

        let mut cmd = if isolate && self.can_unshare().await {
            let mut cmd = Command::new("unshare");
            cmd.args(["--user", "--map-root-user", "--net", "--"]);
            cmd.arg(&self.shell);
            cmd
        } else {
            if isolate {
                warn!(
                    "{}: cannot isolate {} from the network, running unisolated",
                    request.package, request.phase
                );
            }
            Command::new(&self.shell)
        };

        cmd.arg("-e")
            .arg("-c")
            .arg(&request.script)
            .envs(&request.env)
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl PhaseExecutor for ShellExecutor {
    async fn run_phase(&self, request: &PhaseRequest) -> Result<PhaseOutput> {
        let mut cmd = self.build_command(request).await;

        let output = cmd.output().await.map_err(|e| {
            Error::Executor(format!(
                "{}: failed to spawn {} for {}: {}",
                request.package, self.shell, request.phase, e
            ))
        })?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(PhaseOutput {
            exit_code: output.status.code().unwrap_or(-1),
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionContext;
    use crate::phase::BuildPhase;
    use std::collections::BTreeMap;

    fn request(dir: &std::path::Path, script: &str) -> PhaseRequest {
        let mut env = BTreeMap::new();
        env.insert("D".to_string(), dir.join("image").display().to_string());
        PhaseRequest {
            package: "app-misc/hello-1.0".to_string(),
            phase: BuildPhase::Install,
            script: script.to_string(),
            env,
            workdir: dir.to_path_buf(),
            image_dir: dir.join("image"),
            context: ExecutionContext::default(),
        }
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new().without_isolation();

        let ok = executor
            .run_phase(&request(dir.path(), "echo hello; echo oops >&2"))
            .await
            .unwrap();
        assert!(ok.success());
        assert!(ok.log.contains("hello"));
        assert!(ok.log.contains("oops"));

        let failed = executor
            .run_phase(&request(dir.path(), "false; echo unreachable"))
            .await
            .unwrap();
        assert_eq!(failed.exit_code, 1);
        assert!(!failed.log.contains("unreachable"));
    }

    #[tokio::test]
    async fn test_env_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new().without_isolation();
        let out = executor
            .run_phase(&request(dir.path(), "mkdir -p \"$D\" && touch \"$D/marker\""))
            .await
            .unwrap();
        assert!(out.success());
        assert!(dir.path().join("image/marker").exists());
    }

    #[tokio::test]
    async fn test_missing_shell_is_executor_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new()
            .without_isolation()
            .with_shell("/nonexistent/shell");
        let err = executor
            .run_phase(&request(dir.path(), "true"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Executor(_)));
    }
}
