use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::archive::{ARCHIVE_PREFIX, archive_file_name, zip_dir};
use crate::copier::{CopyOutcome, PodCopier};
use crate::error::CollectionError;
use crate::kubeconfig::Credentials;
use crate::pods::{PodRef, pod_refs};
use crate::workspace::Workspace;

pub const DEFAULT_REMOTE_LOG_PATH: &str = "/opt/appdynamics-java/ver24.12.0.36528/logs";
pub const MANIFEST_FILE: &str = "manifest.json";

/// What to do when a pod's logs could not be copied.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CopyFailurePolicy {
    /// Archive whatever was copied and move on to the next pod.
    #[default]
    Continue,
    /// Stop and fail the whole request.
    Abort,
}

#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub remote_log_path: String,
    pub work_root: PathBuf,
    pub retain_workspaces: bool,
    pub on_copy_failure: CopyFailurePolicy,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            remote_log_path: DEFAULT_REMOTE_LOG_PATH.to_owned(),
            work_root: std::env::temp_dir(),
            retain_workspaces: false,
            on_copy_failure: CopyFailurePolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollectionRequest {
    pub credentials: String,
    pub namespace: String,
    pub pods: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PodReport {
    pub pod: String,
    pub directory: String,
    pub archive: String,
    pub outcome: CopyOutcome,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Manifest {
    pub namespace: String,
    pub context: Option<String>,
    pub remote_log_path: String,
    pub created_at: DateTime<Local>,
    pub pods: Vec<PodReport>,
}

/// The final archive, handed off to a temporary file outside the workspace.
///
/// The file is deleted when this value (or the path from `into_temp_path`) is dropped.
#[derive(Debug)]
pub struct CollectedArchive {
    pub file_name: String,
    pub size: u64,
    pub pods: Vec<PodReport>,
    /// Set when the workspace was kept on disk.
    pub workspace: Option<PathBuf>,
    file: TempPath,
}

impl CollectedArchive {
    pub fn missing_logs(&self) -> usize {
        self.pods.iter().filter(|p| !p.outcome.is_success()).count()
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub async fn open(&self) -> Result<tokio::fs::File, CollectionError> {
        tokio::fs::File::open(self.path())
            .await
            .map_err(|e| CollectionError::io("opening", self.path(), e))
    }

    pub fn into_temp_path(self) -> TempPath {
        self.file
    }
}

#[derive(Clone)]
pub struct LogCollector {
    copier: Arc<dyn PodCopier>,
    settings: Arc<CollectorSettings>,
}

impl LogCollector {
    pub fn new(copier: Arc<dyn PodCopier>, settings: CollectorSettings) -> Self {
        Self {
            copier,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub async fn collect(
        &self,
        request: CollectionRequest,
    ) -> Result<CollectedArchive, CollectionError> {
        let pods = pod_refs(&request.namespace, &request.pods)?;
        let credentials = Credentials::parse(&request.credentials)?;
        tracing::info!(
            "Collecting logs from {} pod(s) in namespace '{}' (context: {})",
            pods.len(),
            request.namespace,
            credentials.current_context().unwrap_or("<none>")
        );

        let workspace =
            Workspace::create(&self.settings.work_root, self.settings.retain_workspaces)?;
        let kubeconfig = workspace.write_credentials(credentials.as_str()).await?;

        let mut reports: Vec<PodReport> = Vec::with_capacity(pods.len());
        for pod in &pods {
            let report = self.collect_pod(&workspace, pod, &kubeconfig).await?;
            reports.push(report);
        }

        let manifest = Manifest {
            namespace: request.namespace,
            context: credentials.current_context().map(str::to_owned),
            remote_log_path: self.settings.remote_log_path.clone(),
            created_at: Local::now(),
            pods: reports,
        };
        let manifest_path = workspace.path().join(MANIFEST_FILE);
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(&manifest_path, manifest_json)
            .await
            .map_err(|e| CollectionError::io("writing", &manifest_path, e))?;

        let file_name = archive_file_name(&manifest.created_at);
        let built = workspace.path().join(&file_name);
        let src = workspace.path().to_path_buf();
        let dest = built.clone();
        let entries = tokio::task::spawn_blocking(move || zip_dir(&src, &dest)).await??;

        let file = self.hand_off(&built).await?;
        let size = tokio::fs::metadata(&file)
            .await
            .map_err(|e| CollectionError::io("inspecting", &*file, e))?
            .len();
        tracing::info!("Built {} ({} entries, {} bytes)", file_name, entries, size);

        Ok(CollectedArchive {
            file_name,
            size,
            pods: manifest.pods,
            workspace: workspace.finish().await,
            file,
        })
    }

    // Moves the final archive next to the workspace so it outlives it. Kept
    // workspaces get a copy instead.
    async fn hand_off(&self, built: &Path) -> Result<TempPath, CollectionError> {
        let root = &self.settings.work_root;
        let target = tempfile::Builder::new()
            .prefix(ARCHIVE_PREFIX)
            .suffix(".zip")
            .tempfile_in(root)
            .map_err(|e| CollectionError::io("creating download in", root, e))?
            .into_temp_path();

        let moved = if self.settings.retain_workspaces {
            tokio::fs::copy(built, &target).await.map(drop)
        } else {
            tokio::fs::rename(built, &target).await
        };
        moved.map_err(|e| CollectionError::io("moving", built, e))?;

        Ok(target)
    }

    async fn collect_pod(
        &self,
        workspace: &Workspace,
        pod: &PodRef,
        kubeconfig: &std::path::Path,
    ) -> Result<PodReport, CollectionError> {
        let local_dir = workspace.create_pod_dir(pod).await?;

        let outcome = self
            .copier
            .copy(pod, &self.settings.remote_log_path, &local_dir, kubeconfig)
            .await;

        if outcome.is_success() {
            tracing::info!("Copied logs from {}/{}", pod.namespace, pod.name);
        } else {
            tracing::warn!(
                "Log copy from {}/{} {}",
                pod.namespace,
                pod.name,
                outcome.describe()
            );
            if self.settings.on_copy_failure == CopyFailurePolicy::Abort {
                return Err(CollectionError::CopyFailed {
                    pod: pod.name.clone(),
                    detail: outcome.describe(),
                });
            }
        }

        let archive_path = workspace.path().join(pod.archive_name());
        let dest = archive_path.clone();
        tokio::task::spawn_blocking(move || zip_dir(&local_dir, &dest)).await??;

        Ok(PodReport {
            pod: pod.name.clone(),
            directory: pod.local_dir_name(),
            archive: pod.archive_name(),
            outcome,
        })
    }
}
