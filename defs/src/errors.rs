use std::time::Duration;

use thiserror::Error;

use crate::resource::{ResourceHandle, ResourceKind};

/// Failure talking to the cluster.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("kind {0} is not served by the cluster")]
    UnknownKind(String),
}

impl ClusterError {
    /// Errors that a poll loop should treat as "not ready yet".
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::NotFound(_) | ClusterError::Transport(_) => true,
            ClusterError::Api { code, .. } => {
                matches!(code, 404 | 409 | 429) || *code >= 500
            }
            ClusterError::InvalidManifest(_) | ClusterError::UnknownKind(_) => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("context key '{key}' is already set to '{existing}', refusing to overwrite with '{attempted}'")]
    Conflict {
        key: String,
        existing: String,
        attempted: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan '{0}' has no steps")]
    Empty(String),
    #[error("plan '{plan}': step ordinal {ordinal} does not follow {previous}")]
    OrdinalOrder {
        plan: String,
        ordinal: u32,
        previous: u32,
    },
    #[error("plan '{plan}': step {ordinal} waits on {kind}, which has no readiness check")]
    NotWaitable {
        plan: String,
        ordinal: u32,
        kind: String,
    },
    #[error("unknown topology '{given}', available: {}", .available.join(", "))]
    UnknownTopology {
        given: String,
        available: Vec<String>,
    },
}

/// Failure of a single step. Wrapped with the step label by the sequencer.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("template '{name}' is not available: {reason}")]
    Template { name: String, reason: String },
    #[error("apply failed: {0}")]
    Apply(#[source] ClusterError),
    #[error("apply did not finish within {0:?}")]
    ApplyTimeout(Duration),
    #[error("timed out after {timeout:?} waiting for {handle}, last observed status: {last_status}")]
    ReadinessTimeout {
        handle: ResourceHandle,
        timeout: Duration,
        last_status: String,
    },
    #[error("{handle} failed: {reason}")]
    ResourceFailed {
        handle: ResourceHandle,
        reason: String,
    },
    #[error("no value for '{key}' at {field} of {handle} after {attempts} attempts")]
    DiscoveryExhausted {
        key: String,
        handle: ResourceHandle,
        field: String,
        attempts: u32,
    },
    #[error("{what} still contains unresolved placeholders: {}", .tokens.join(", "))]
    Unresolved { what: String, tokens: Vec<String> },
    #[error("{0} has no readiness check")]
    NotWaitable(ResourceKind),
    #[error("status query failed: {0}")]
    Query(#[source] ClusterError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Rejected parameter, detected before any step runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("'{0}' is not a valid namespace name (lowercase alphanumerics and '-', at most 63 characters)")]
    InvalidNamespace(String),
    #[error("namespace '{given}' does not exist, available: {}", .available.join(", "))]
    Namespace {
        given: String,
        available: Vec<String>,
    },
    #[error("storage class '{given}' does not exist, available: {}", .available.join(", "))]
    StorageClass {
        given: String,
        available: Vec<String>,
    },
    #[error("version '{given}' is not available, available: {}", .available.join(", "))]
    Version {
        given: String,
        available: Vec<String>,
    },
    #[error("'{given}' is not a valid node address: {reason}")]
    Address { given: String, reason: String },
    #[error("no value for {0} was given and none could be detected")]
    Missing(&'static str),
    #[error("package catalog unavailable: {0}")]
    Catalog(String),
    #[error("cluster query failed during validation: {0}")]
    Cluster(#[source] ClusterError),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("step {ordinal} ({label}): {source}")]
    Step {
        ordinal: u32,
        label: String,
        source: StepError,
    },
}
