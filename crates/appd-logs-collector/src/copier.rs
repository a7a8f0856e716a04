use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::pods::PodRef;

/// Longest stderr tail kept in a pod report.
const MAX_STDERR_CHARS: usize = 4096;

/// What happened when logs were copied out of a single pod.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CopyOutcome {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    SpawnFailed {
        reason: String,
    },
    TimedOut {
        after_secs: u64,
    },
}

impl CopyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CopyOutcome::Succeeded)
    }

    pub fn describe(&self) -> String {
        match self {
            CopyOutcome::Succeeded => "copied".to_owned(),
            CopyOutcome::Failed {
                exit_code: Some(code),
                stderr,
            } => format!("exited with status {}: {}", code, stderr),
            CopyOutcome::Failed {
                exit_code: None,
                stderr,
            } => format!("terminated by signal: {}", stderr),
            CopyOutcome::SpawnFailed { reason } => format!("could not be started: {}", reason),
            CopyOutcome::TimedOut { after_secs } => format!("timed out after {}s", after_secs),
        }
    }
}

/// Copies a directory out of a running pod into a local directory.
#[async_trait::async_trait]
pub trait PodCopier: Send + Sync + 'static {
    async fn copy(
        &self,
        pod: &PodRef,
        remote_path: &str,
        local_dir: &Path,
        kubeconfig: &Path,
    ) -> CopyOutcome;
}

/// Runs `<program> cp <namespace>/<pod>:<remote_path> <local_dir>` with `KUBECONFIG` set.
#[derive(Clone, Debug)]
pub struct KubectlCopier {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for KubectlCopier {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlCopier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        KubectlCopier {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(
        &self,
        pod: &PodRef,
        remote_path: &str,
        local_dir: &Path,
        kubeconfig: &Path,
    ) -> Command {
        let mut command = Command::new(&self.program);

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("KUBECONFIG", kubeconfig);

        command.arg("cp");
        command.arg(pod.remote_spec(remote_path));
        command.arg(local_dir);

        command
    }
}

#[async_trait::async_trait]
impl PodCopier for KubectlCopier {
    async fn copy(
        &self,
        pod: &PodRef,
        remote_path: &str,
        local_dir: &Path,
        kubeconfig: &Path,
    ) -> CopyOutcome {
        let mut command = self.command(pod, remote_path, local_dir, kubeconfig);
        tracing::debug!(
            "Running {} cp {} {}",
            self.program.display(),
            pod.remote_spec(remote_path),
            local_dir.display()
        );

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output,
                // The child is killed when the pending future is dropped.
                Err(_) => {
                    return CopyOutcome::TimedOut {
                        after_secs: limit.as_secs(),
                    };
                }
            },
            None => command.output().await,
        };

        match output {
            Ok(output) if output.status.success() => CopyOutcome::Succeeded,
            Ok(output) => CopyOutcome::Failed {
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            },
            Err(e) => CopyOutcome::SpawnFailed {
                reason: e.to_string(),
            },
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();

    let skip = text.chars().count().saturating_sub(MAX_STDERR_CHARS);
    text.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> PodRef {
        PodRef::new("default", "web-0").unwrap()
    }

    #[test]
    fn stderr_is_trimmed_and_capped() {
        assert_eq!(stderr_tail(b"  error: no such pod\n"), "error: no such pod");

        let long = "x".repeat(MAX_STDERR_CHARS + 10);
        assert_eq!(stderr_tail(long.as_bytes()).len(), MAX_STDERR_CHARS);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(CopyOutcome::Failed {
            exit_code: Some(1),
            stderr: "boom".to_owned(),
        })
        .unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["exit_code"], 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_status_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let copier = KubectlCopier::new("true");

        let outcome = copier
            .copy(&pod(), "/logs", dir.path(), &dir.path().join("kubeconfig.yaml"))
            .await;

        assert_eq!(outcome, CopyOutcome::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_status_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let copier = KubectlCopier::new("false");

        let outcome = copier
            .copy(&pod(), "/logs", dir.path(), &dir.path().join("kubeconfig.yaml"))
            .await;

        assert!(matches!(
            outcome,
            CopyOutcome::Failed {
                exit_code: Some(1),
                ..
            }
        ));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let copier = KubectlCopier::new(dir.path().join("no-such-kubectl"));

        let outcome = copier
            .copy(&pod(), "/logs", dir.path(), &dir.path().join("kubeconfig.yaml"))
            .await;

        assert!(matches!(outcome, CopyOutcome::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_copy_times_out() {
        let dir = tempfile::tempdir().unwrap();
        // `yes` never exits on its own.
        let copier = KubectlCopier::new("yes").with_timeout(Some(Duration::from_millis(200)));

        let outcome = copier
            .copy(&pod(), "/logs", dir.path(), &dir.path().join("kubeconfig.yaml"))
            .await;

        assert_eq!(outcome, CopyOutcome::TimedOut { after_secs: 0 });
    }
}
