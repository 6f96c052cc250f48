use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{Scope, pinned_kind};
use kube::{Client as KubeClient, ResourceExt};
use log::{debug, info};
use rollout_defs::{ClusterError, ResourceHandle, ResourceKind};
use serde_json::Value;

use crate::cluster::{ClusterApply, ClusterInspector, ClusterQuery, StorageClassInfo, split_documents};

const FIELD_MANAGER: &str = "rollout";
const DEFAULT_CLASS_ANNOTATIONS: [&str; 2] = [
    "storageclass.kubernetes.io/is-default-class",
    "storageclass.beta.kubernetes.io/is-default-class",
];

/// Cluster access over the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: KubeClient,
}

impl KubeCluster {
    /// Connects with the local kubeconfig, or the in-cluster service account.
    pub async fn connect() -> Result<Self, ClusterError> {
        let client = KubeClient::try_default().await.map_err(to_cluster_err)?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: KubeClient) -> Self {
        KubeCluster { client }
    }
}

pub fn get_api_resource(kind: ResourceKind) -> ApiResource {
    ApiResource {
        api_version: kind.api_version(),
        group: kind.group().to_string(),
        version: kind.version().to_string(),
        kind: kind.kind_name().to_string(),
        plural: kind.plural(),
    }
}

pub fn to_cluster_err(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            ClusterError::NotFound(response.message)
        }
        kube::Error::Api(response) => ClusterError::Api {
            code: response.code,
            message: response.message,
        },
        kube::Error::Discovery(e) => ClusterError::UnknownKind(e.to_string()),
        other => ClusterError::Transport(other.to_string()),
    }
}

fn is_default_class(annotations: &BTreeMap<String, String>) -> bool {
    DEFAULT_CLASS_ANNOTATIONS
        .iter()
        .any(|key| annotations.get(*key).map(String::as_str) == Some("true"))
}

fn parse_document(document: &str) -> Result<(DynamicObject, GroupVersionKind), ClusterError> {
    let object: DynamicObject = serde_yaml::from_str(document)
        .map_err(|e| ClusterError::InvalidManifest(e.to_string()))?;
    let types = object
        .types
        .as_ref()
        .ok_or_else(|| ClusterError::InvalidManifest("document without apiVersion/kind".to_string()))?;
    let gvk = GroupVersionKind::try_from(types)
        .map_err(|e| ClusterError::InvalidManifest(e.to_string()))?;
    if object.metadata.name.is_none() {
        return Err(ClusterError::InvalidManifest(format!(
            "{} without metadata.name",
            gvk.kind
        )));
    }
    Ok((object, gvk))
}

#[async_trait]
impl ClusterQuery for KubeCluster {
    async fn get(&self, handle: &ResourceHandle) -> Result<Option<Value>, ClusterError> {
        let resource = get_api_resource(handle.kind);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &handle.namespace, &resource);
        match api.get_opt(&handle.name).await.map_err(to_cluster_err)? {
            Some(object) => serde_json::to_value(object)
                .map(Some)
                .map_err(|e| ClusterError::Transport(e.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClusterApply for KubeCluster {
    /// Server-side applies every document, so re-running over a partial
    /// earlier run converges instead of failing on existing objects.
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<(), ClusterError> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        for document in split_documents(manifest) {
            let (object, gvk) = parse_document(&document)?;
            let (resource, capabilities) = pinned_kind(&self.client, &gvk)
                .await
                .map_err(to_cluster_err)?;

            let api: Api<DynamicObject> = if capabilities.scope == Scope::Cluster {
                Api::all_with(self.client.clone(), &resource)
            } else {
                let target = object.metadata.namespace.as_deref().unwrap_or(namespace);
                Api::namespaced_with(self.client.clone(), target, &resource)
            };

            let name = object.name_any();
            debug!("Applying {} {}", gvk.kind, name);
            api.patch(&name, &params, &Patch::Apply(&object))
                .await
                .map_err(to_cluster_err)?;
            info!("{} {} applied", gvk.kind, name);
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterInspector for KubeCluster {
    async fn storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let classes = api
            .list(&ListParams::default())
            .await
            .map_err(to_cluster_err)?;
        Ok(classes
            .items
            .iter()
            .map(|class| StorageClassInfo {
                name: class.name_any(),
                is_default: is_default_class(class.annotations()),
            })
            .collect())
    }

    async fn namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .map_err(to_cluster_err)?;
        Ok(namespaces.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn node_addresses(&self) -> Result<Vec<String>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(to_cluster_err)?;
        Ok(nodes
            .items
            .iter()
            .filter_map(|node| node.status.as_ref()?.addresses.as_ref())
            .flatten()
            .filter(|address| address.type_ == "InternalIP")
            .map(|address| address.address.clone())
            .collect())
    }
}
