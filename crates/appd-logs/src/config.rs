use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use appd_logs_collector::collector::DEFAULT_REMOTE_LOG_PATH;
use appd_logs_collector::{CollectorSettings, CopyFailurePolicy, KubectlCopier};
use clap::{Parser, ValueEnum};

use crate::constants::{DEFAULT_MAX_FORM_BYTES, DEFAULT_PORT};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "appd-logs",
    version,
    about = "Web form for downloading AppDynamics agent logs from kubernetes pods"
)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "APPD_LOGS_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "APPD_LOGS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// kubectl executable used to copy logs out of pods
    #[arg(long, env = "APPD_LOGS_KUBECTL", default_value = "kubectl")]
    pub kubectl: PathBuf,

    /// Directory copied out of every pod
    #[arg(long, env = "APPD_LOGS_REMOTE_LOG_PATH", default_value = DEFAULT_REMOTE_LOG_PATH)]
    pub remote_log_path: String,

    /// Where per-request workspaces are created (defaults to the system temp dir)
    #[arg(long, env = "APPD_LOGS_WORK_ROOT")]
    pub work_root: Option<PathBuf>,

    /// Keep workspaces on disk after each request
    #[arg(long, env = "APPD_LOGS_KEEP_WORKSPACES")]
    pub keep_workspaces: bool,

    /// Kill kubectl if a single copy takes longer than this
    #[arg(long, env = "APPD_LOGS_COPY_TIMEOUT_SECS")]
    pub copy_timeout_secs: Option<u64>,

    /// What to do when logs cannot be copied from a pod
    #[arg(
        long,
        env = "APPD_LOGS_ON_COPY_FAILURE",
        value_enum,
        default_value_t = OnCopyFailure::Continue
    )]
    pub on_copy_failure: OnCopyFailure,

    /// Largest accepted form submission in bytes
    #[arg(long, env = "APPD_LOGS_MAX_FORM_BYTES", default_value_t = DEFAULT_MAX_FORM_BYTES)]
    pub max_form_bytes: usize,

    /// Write logs to a file in this directory instead of stdout
    #[arg(long, env = "APPD_LOGS_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCopyFailure {
    Continue,
    Abort,
}

impl From<OnCopyFailure> for CopyFailurePolicy {
    fn from(value: OnCopyFailure) -> Self {
        match value {
            OnCopyFailure::Continue => CopyFailurePolicy::Continue,
            OnCopyFailure::Abort => CopyFailurePolicy::Abort,
        }
    }
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn copier(&self) -> KubectlCopier {
        KubectlCopier::new(&self.kubectl)
            .with_timeout(self.copy_timeout_secs.map(Duration::from_secs))
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        let defaults = CollectorSettings::default();

        CollectorSettings {
            remote_log_path: self.remote_log_path.clone(),
            work_root: self.work_root.clone().unwrap_or(defaults.work_root),
            retain_workspaces: self.keep_workspaces,
            on_copy_failure: self.on_copy_failure.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_localhost_5000() {
        let config = Config::try_parse_from(["appd-logs"]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.kubectl, PathBuf::from("kubectl"));
        assert_eq!(config.copy_timeout_secs, None);

        let settings = config.collector_settings();
        assert_eq!(settings.remote_log_path, DEFAULT_REMOTE_LOG_PATH);
        assert_eq!(settings.on_copy_failure, CopyFailurePolicy::Continue);
        assert!(!settings.retain_workspaces);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "appd-logs",
            "--bind",
            "0.0.0.0",
            "--port",
            "8080",
            "--work-root",
            "/var/tmp/appd",
            "--keep-workspaces",
            "--copy-timeout-secs",
            "30",
            "--on-copy-failure",
            "abort",
            "--remote-log-path",
            "/logs",
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.copy_timeout_secs, Some(30));

        let settings = config.collector_settings();
        assert_eq!(settings.work_root, PathBuf::from("/var/tmp/appd"));
        assert_eq!(settings.remote_log_path, "/logs");
        assert_eq!(settings.on_copy_failure, CopyFailurePolicy::Abort);
        assert!(settings.retain_workspaces);
    }

    #[test]
    fn unknown_failure_policy_is_rejected() {
        assert!(Config::try_parse_from(["appd-logs", "--on-copy-failure", "retry"]).is_err());
    }
}
