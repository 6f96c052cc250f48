use async_trait::async_trait;
use rollout_defs::{ClusterError, ResourceHandle};
use serde_json::Value;

/// Read-only status queries against live resources.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// The live object serialized as JSON, `None` when it does not exist (yet).
    async fn get(&self, handle: &ResourceHandle) -> Result<Option<Value>, ClusterError>;
}

/// Applies a resolved manifest. Success or failure is the only observable
/// outcome.
#[async_trait]
pub trait ClusterApply: Send + Sync {
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<(), ClusterError>;
}

/// Everything the sequencer needs from a cluster.
pub trait Cluster: ClusterQuery + ClusterApply {}

impl<T: ClusterQuery + ClusterApply> Cluster for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassInfo {
    pub name: String,
    pub is_default: bool,
}

/// Cluster facts used to validate and auto-detect parameters.
#[async_trait]
pub trait ClusterInspector: Send + Sync {
    async fn storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError>;
    async fn namespaces(&self) -> Result<Vec<String>, ClusterError>;
    /// Internal addresses of the cluster nodes.
    async fn node_addresses(&self) -> Result<Vec<String>, ClusterError>;
}

/// Splits a multi-document YAML manifest on `---` separators, dropping
/// documents that only hold whitespace or comments.
pub fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = vec![];
    let mut current = String::new();
    for line in manifest.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            documents.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
        })
        .collect()
}
