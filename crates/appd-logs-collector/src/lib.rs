pub mod archive;
pub mod collector;
pub mod copier;
pub mod error;
pub mod kubeconfig;
pub mod pods;
pub mod workspace;

pub use collector::{
    CollectedArchive, CollectionRequest, CollectorSettings, CopyFailurePolicy, LogCollector,
    Manifest, PodReport,
};
pub use copier::{CopyOutcome, KubectlCopier, PodCopier};
pub use error::CollectionError;
pub use pods::{PodRef, parse_pod_list};
