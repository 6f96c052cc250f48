//! In-memory stand-ins for the cluster and the package catalog.
//!
//! `FakeCluster` imitates the operators the templates rely on: Jobs complete,
//! UnitSets gain one ready unit per status query and expose one NodePort
//! Service per unit, topology resources turn ready after a few queries.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;
use rollout_defs::{ClusterError, ResourceHandle, ResourceKind};
use rollout_engine::{
    CatalogError, ClusterApply, ClusterInspector, ClusterQuery, PackageCatalog, StorageClassInfo,
    split_documents,
};
use serde_json::{Value, json};

pub const FIRST_NODE_PORT: u64 = 30100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedObject {
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub body: Value,
}

#[derive(Default)]
struct State {
    applied: Vec<AppliedObject>,
    /// Status queries answered per `kind/name`.
    queries: HashMap<String, u32>,
    ports: HashMap<String, u64>,
    apply_calls: usize,
    get_calls: u32,
}

pub struct FakeCluster {
    state: Mutex<State>,
    /// Queries a Job stays Running for.
    job_running_for: u32,
    /// Queries a per-unit Service exists without a node port.
    port_pending_for: u32,
    /// Queries a topology resource stays not ready for.
    topology_pending_for: u32,
    /// Index of the apply call that fails (0-based), if any.
    fail_apply_at: Option<usize>,
    /// Jobs with this name prefix report Failed.
    failing_job: Option<String>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        FakeCluster {
            state: Mutex::new(State::default()),
            job_running_for: 1,
            port_pending_for: 1,
            topology_pending_for: 2,
            fail_apply_at: None,
            failing_job: None,
        }
    }
}

impl FakeCluster {
    /// Jobs stay Running for `queries` status queries.
    pub fn with_job_running_for(mut self, queries: u32) -> Self {
        self.job_running_for = queries;
        self
    }

    /// Per-unit Services report no node port for `queries` status queries.
    pub fn with_port_pending_for(mut self, queries: u32) -> Self {
        self.port_pending_for = queries;
        self
    }

    pub fn with_topology_pending_for(mut self, queries: u32) -> Self {
        self.topology_pending_for = queries;
        self
    }

    /// The apply call with this 0-based index is rejected.
    pub fn with_fail_apply_at(mut self, call: usize) -> Self {
        self.fail_apply_at = Some(call);
        self
    }

    /// Jobs whose name starts with `prefix` report Failed.
    pub fn with_failing_job(mut self, prefix: &str) -> Self {
        self.failing_job = Some(prefix.to_string());
        self
    }

    pub fn applied(&self) -> Vec<AppliedObject> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn applied_kinds(&self) -> Vec<String> {
        self.applied().into_iter().map(|o| o.kind).collect()
    }

    pub fn find(&self, kind: &str, name: &str) -> Option<AppliedObject> {
        self.applied()
            .into_iter()
            .find(|o| o.kind == kind && o.name == name)
    }

    pub fn apply_calls(&self) -> usize {
        self.state.lock().unwrap().apply_calls
    }

    pub fn get_calls(&self) -> u32 {
        self.state.lock().unwrap().get_calls
    }

    fn bump(state: &mut State, key: &str) -> u32 {
        let count = state.queries.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn job_status(&self, name: &str, seen: u32) -> Value {
        if self
            .failing_job
            .as_deref()
            .is_some_and(|prefix| name.starts_with(prefix))
        {
            return json!({ "conditions": [{
                "type": "Failed", "status": "True",
                "reason": "BackoffLimitExceeded", "message": "Job has reached the specified backoff limit"
            }] });
        }
        if seen > self.job_running_for {
            json!({ "conditions": [{ "type": "Complete", "status": "True" }] })
        } else {
            json!({ "active": 1 })
        }
    }
}

fn object_key(kind: &str, name: &str) -> String {
    format!("{}/{}", kind, name)
}

/// `redis-abc123-2-svc` -> (`redis-abc123`, 2)
fn unit_service(name: &str) -> Option<(&str, u64)> {
    let base = name.strip_suffix("-svc")?;
    let (unit_set, index) = base.rsplit_once('-')?;
    Some((unit_set, index.parse().ok()?))
}

#[async_trait]
impl ClusterApply for FakeCluster {
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        let call = state.apply_calls;
        state.apply_calls += 1;
        if self.fail_apply_at == Some(call) {
            return Err(ClusterError::Api {
                code: 422,
                message: "admission webhook denied the request".to_string(),
            });
        }

        for document in split_documents(manifest) {
            let body: Value = serde_yaml::from_str(&document)
                .map_err(|e| ClusterError::InvalidManifest(e.to_string()))?;
            let kind = body["kind"].as_str().unwrap_or_default().to_string();
            let name = body["metadata"]["name"]
                .as_str()
                .ok_or_else(|| ClusterError::InvalidManifest("missing metadata.name".to_string()))?
                .to_string();
            debug!("fake apply {}/{}", kind, name);
            state.applied.push(AppliedObject {
                namespace: namespace.to_string(),
                kind,
                name,
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterQuery for FakeCluster {
    async fn get(&self, handle: &ResourceHandle) -> Result<Option<Value>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        let kind = handle.kind.kind_name();
        let key = object_key(kind, &handle.name);

        if handle.kind == ResourceKind::Service {
            let Some((unit_set, index)) = unit_service(&handle.name) else {
                return Ok(None);
            };
            let exists = state
                .applied
                .iter()
                .any(|o| o.kind == "UnitSet" && o.name == unit_set);
            if !exists {
                return Ok(None);
            }
            let seen = Self::bump(&mut state, &key);
            if seen <= self.port_pending_for {
                return Ok(Some(json!({ "spec": { "type": "NodePort", "ports": [{ "port": 6379 }] } })));
            }
            let next = FIRST_NODE_PORT + state.ports.len() as u64;
            let port = *state.ports.entry(key).or_insert(next);
            debug!("fake service {} has node port {} (unit {})", handle.name, port, index);
            return Ok(Some(json!({
                "metadata": { "name": handle.name },
                "spec": { "type": "NodePort", "ports": [{ "port": 6379, "nodePort": port }] }
            })));
        }

        let Some(object) = state
            .applied
            .iter()
            .rev()
            .find(|o| o.kind == kind && o.name == handle.name)
            .map(|o| o.body.clone())
        else {
            return Ok(None);
        };
        let seen = Self::bump(&mut state, &key);

        let status = match handle.kind {
            ResourceKind::Job => self.job_status(&handle.name, seen),
            ResourceKind::UnitSet => {
                let units = object["spec"]["units"].as_u64().unwrap_or(0);
                json!({ "readyUnits": units.min(seen as u64 - 1) })
            }
            ResourceKind::Replication(_) => {
                json!({ "ready": seen > self.topology_pending_for })
            }
            ResourceKind::Service => json!({}),
        };
        let mut object = object;
        object["status"] = status;
        Ok(Some(object))
    }
}

/// Cluster facts for parameter validation.
pub struct FakeInspector {
    pub namespaces: Vec<String>,
    pub storage_classes: Vec<StorageClassInfo>,
    pub nodes: Vec<String>,
}

impl Default for FakeInspector {
    fn default() -> Self {
        FakeInspector {
            namespaces: vec!["default".to_string(), "demo".to_string()],
            storage_classes: vec![
                StorageClassInfo {
                    name: "local-path".to_string(),
                    is_default: true,
                },
                StorageClassInfo {
                    name: "nfs-client".to_string(),
                    is_default: false,
                },
            ],
            nodes: vec!["10.0.0.12".to_string()],
        }
    }
}

#[async_trait]
impl ClusterInspector for FakeInspector {
    async fn storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        Ok(self.storage_classes.clone())
    }

    async fn namespaces(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.namespaces.clone())
    }

    async fn node_addresses(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.nodes.clone())
    }
}

/// Catalog that is unreachable, like `helm` without the repository added.
pub struct UnreachableCatalog;

#[async_trait]
impl PackageCatalog for UnreachableCatalog {
    async fn versions(&self) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::Empty("bitnami/redis".to_string()))
    }
}
