use serde::Serialize;
use std::fmt;

/// API group serving the workload set and topology custom resources.
pub const UPM_GROUP: &str = "upm.syntropycloud.io";

/// The closed set of resource kinds the engine knows how to query.
///
/// `Replication` carries the concrete custom resource kind since several
/// products share the same `status.ready` shape (`RedisReplication`,
/// `RedisSentinel`, `RedisCluster`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Job,
    UnitSet,
    Replication(&'static str),
    Service,
}

impl ResourceKind {
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::Job => "batch",
            ResourceKind::UnitSet | ResourceKind::Replication(_) => UPM_GROUP,
            ResourceKind::Service => "",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            ResourceKind::Job | ResourceKind::Service => "v1",
            ResourceKind::UnitSet => "v1alpha2",
            ResourceKind::Replication(_) => "v1alpha1",
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ResourceKind::Job => "Job",
            ResourceKind::UnitSet => "UnitSet",
            ResourceKind::Replication(kind) => *kind,
            ResourceKind::Service => "Service",
        }
    }

    pub fn api_version(&self) -> String {
        if self.group().is_empty() {
            self.version().to_string()
        } else {
            format!("{}/{}", self.group(), self.version())
        }
    }

    pub fn plural(&self) -> String {
        self.kind_name().to_lowercase() + "s"
    }

    /// Whether a readiness state machine exists for this kind.
    pub fn is_waitable(&self) -> bool {
        !matches!(self, ResourceKind::Service)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// Identifies a live resource on the cluster. Only used for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        ResourceHandle {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A runtime fact read from a live resource and merged into the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredValue {
    pub key: String,
    pub handle: ResourceHandle,
    pub value: String,
}
