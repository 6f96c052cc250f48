mod catalog;
mod cluster;
mod discovery;
mod kube_cluster;
pub mod plans;
mod poll;
mod readiness;
mod sequencer;
mod templates;
mod validation;

pub use catalog::{CatalogError, HelmCatalog, PackageCatalog, StaticCatalog, parse_helm_search};
pub use cluster::{
    Cluster, ClusterApply, ClusterInspector, ClusterQuery, StorageClassInfo, split_documents,
};
pub use discovery::{discover, discovery_handle, read_field};
pub use kube_cluster::{KubeCluster, get_api_resource, to_cluster_err};
pub use poll::{Budget, Probe, Waited, poll_until};
pub use readiness::{
    JobState, Observation, ReplicationState, UnitSetState, observe, wait_for_ready,
};
pub use sequencer::{RenderedStep, RunReport, Sequencer, seed_context, validate_and_run};
pub use templates::TemplateStore;
pub use validation::{ParameterValidator, latest_version};
