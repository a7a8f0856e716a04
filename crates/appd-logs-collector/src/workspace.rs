use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::error::CollectionError;
use crate::pods::PodRef;

pub const WORKSPACE_PREFIX: &str = "appd-logs-";
pub const CREDENTIALS_FILE: &str = "kubeconfig.yaml";

/// Per-request scratch directory.
///
/// The directory is removed when the workspace is dropped, whichever way the request
/// ends, unless it was created with `retain` set.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl Workspace {
    pub fn create(root: &Path, retain: bool) -> Result<Self, CollectionError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| CollectionError::io("creating workspace in", root, e))?;
        let path = dir.path().to_path_buf();

        Ok(Workspace {
            dir: Some(dir),
            path,
            retain,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.path.join(CREDENTIALS_FILE)
    }

    pub async fn write_credentials(&self, contents: &str) -> Result<PathBuf, CollectionError> {
        let path = self.credentials_path();

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&path)
            .await
            .map_err(|e| CollectionError::io("creating", &path, e))?;

        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| CollectionError::io("writing", &path, e))?;
        file.flush()
            .await
            .map_err(|e| CollectionError::io("flushing", &path, e))?;

        Ok(path)
    }

    pub async fn create_pod_dir(&self, pod: &PodRef) -> Result<PathBuf, CollectionError> {
        let path = self.path.join(pod.local_dir_name());

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| CollectionError::io("creating", &path, e))?;

        Ok(path)
    }

    /// Close the workspace, returning its path when it is kept on disk.
    ///
    /// Removal runs on the blocking pool. A workspace dropped without `finish` is
    /// removed inline by `Drop`.
    pub async fn finish(mut self) -> Option<PathBuf> {
        let dir = self.dir.take()?;
        if self.retain {
            return Some(keep(dir));
        }

        let removed = tokio::task::spawn_blocking(move || dir.close())
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)));
        log_removal(&self.path, removed);
        None
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.retain {
            keep(dir);
        } else {
            log_removal(&self.path, dir.close());
        }
    }
}

fn keep(dir: TempDir) -> PathBuf {
    let kept = dir.keep();
    tracing::info!("Keeping workspace {}", kept.display());
    kept
}

fn log_removal(path: &Path, removed: io::Result<()>) {
    match removed {
        Ok(()) => tracing::debug!("Removed workspace {}", path.display()),
        Err(e) => tracing::warn!("Failed to remove workspace {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn workspace_is_removed_when_finished() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), false).unwrap();
        let path = workspace.path().to_path_buf();

        workspace.write_credentials("kind: Config\n").await.unwrap();
        assert!(path.join(CREDENTIALS_FILE).is_file());

        assert_eq!(workspace.finish().await, None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn finish_removes_populated_pod_directories() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), false).unwrap();
        let pod = PodRef::new("default", "web-0").unwrap();
        let pod_dir = workspace.create_pod_dir(&pod).await.unwrap();
        std::fs::create_dir_all(pod_dir.join("logs/agent")).unwrap();
        for i in 0..20 {
            std::fs::write(pod_dir.join(format!("logs/agent/agent-{i}.log")), "line\n").unwrap();
        }

        assert_eq!(workspace.finish().await, None);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn workspace_is_removed_on_early_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workspace = Workspace::create(root.path(), false).unwrap();
            workspace.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn retained_workspace_survives() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), true).unwrap();
        let pod = PodRef::new("default", "web-0").unwrap();
        let pod_dir = workspace.create_pod_dir(&pod).await.unwrap();

        let kept = workspace.finish().await.unwrap();
        assert!(kept.is_dir());
        assert!(pod_dir.is_dir());
        assert!(
            kept.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(WORKSPACE_PREFIX)
        );
    }

    #[tokio::test]
    async fn workspaces_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path(), false).unwrap();
        let b = Workspace::create(root.path(), false).unwrap();

        assert_ne!(a.path(), b.path());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn credentials_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), false).unwrap();
        let path = workspace.write_credentials("kind: Config\n").await.unwrap();

        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn missing_root_is_an_io_error() {
        let root = tempfile::tempdir().unwrap();
        let err = Workspace::create(&root.path().join("missing"), false).unwrap_err();

        assert!(matches!(err, CollectionError::Io { .. }));
    }
}
