use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
    #[error("kubeconfig is empty")]
    EmptyCredentials,
    #[error("kubeconfig could not be parsed - please paste a complete kubeconfig file")]
    InvalidCredentials(#[from] kube::config::KubeconfigError),
    #[error("copying logs from pod '{pod}' failed: {detail}")]
    CopyFailed { pod: String, detail: String },
    #[error("workspace i/o failed while {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to write archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("unable to serialize collection manifest")]
    Manifest(#[from] serde_json::Error),
    #[error("archive task did not complete")]
    Join(#[from] tokio::task::JoinError),
}

impl CollectionError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        CollectionError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// True when the caller supplied bad input, as opposed to a fault on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CollectionError::InvalidName { .. }
                | CollectionError::EmptyCredentials
                | CollectionError::InvalidCredentials(_)
        )
    }
}
