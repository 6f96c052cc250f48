use std::fmt;
use std::time::Duration;

use log::warn;
use rollout_defs::{ResourceHandle, ResourceKind, StepError};
use serde_json::Value;

use crate::cluster::ClusterQuery;
use crate::poll::{Budget, Probe, Waited, poll_until};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Complete,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSetState {
    Provisioning,
    PartiallyReady { desired: i64, ready: i64 },
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationState {
    Pending,
    Ready,
}

/// What a single status query said about a waitable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Job(JobState),
    UnitSet(UnitSetState),
    Replication(ReplicationState),
}

impl Observation {
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            Observation::Job(JobState::Complete)
                | Observation::UnitSet(UnitSetState::Ready)
                | Observation::Replication(ReplicationState::Ready)
        )
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Job(JobState::Running) => write!(f, "Running"),
            Observation::Job(JobState::Complete) => write!(f, "Complete"),
            Observation::Job(JobState::Failed { reason }) => write!(f, "Failed ({})", reason),
            Observation::UnitSet(UnitSetState::Provisioning) => write!(f, "Provisioning"),
            Observation::UnitSet(UnitSetState::PartiallyReady { desired, ready }) => {
                write!(f, "PartiallyReady ({}/{} units ready)", ready, desired)
            }
            Observation::UnitSet(UnitSetState::Ready) => write!(f, "Ready"),
            Observation::Replication(ReplicationState::Pending) => write!(f, "Pending"),
            Observation::Replication(ReplicationState::Ready) => write!(f, "Ready"),
        }
    }
}

/// Maps a live object (or its absence) to the state of its kind.
pub fn observe(kind: ResourceKind, object: Option<&Value>) -> Result<Observation, StepError> {
    match kind {
        ResourceKind::Job => Ok(Observation::Job(
            object.map(job_state).unwrap_or(JobState::Running),
        )),
        ResourceKind::UnitSet => Ok(Observation::UnitSet(
            object
                .map(unit_set_state)
                .unwrap_or(UnitSetState::Provisioning),
        )),
        ResourceKind::Replication(_) => {
            let ready = object
                .and_then(|o| o.pointer("/status/ready"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Observation::Replication(if ready {
                ReplicationState::Ready
            } else {
                ReplicationState::Pending
            }))
        }
        ResourceKind::Service => Err(StepError::NotWaitable(kind)),
    }
}

fn job_state(job: &Value) -> JobState {
    let conditions = job
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let is_true = |condition: &Value, wanted: &str| {
        condition.get("type").and_then(Value::as_str) == Some(wanted)
            && condition.get("status").and_then(Value::as_str) == Some("True")
    };

    // Failed wins when a broken status reports both.
    if let Some(failed) = conditions.iter().find(|c| is_true(c, "Failed")) {
        let reason = failed.get("reason").and_then(Value::as_str);
        let message = failed.get("message").and_then(Value::as_str);
        let reason = match (reason, message) {
            (Some(reason), Some(message)) => format!("{}: {}", reason, message),
            (Some(text), None) | (None, Some(text)) => text.to_string(),
            (None, None) => "job reported a Failed condition".to_string(),
        };
        return JobState::Failed { reason };
    }
    if conditions.iter().any(|c| is_true(c, "Complete")) {
        return JobState::Complete;
    }
    JobState::Running
}

fn unit_set_state(unit_set: &Value) -> UnitSetState {
    let desired = unit_set
        .pointer("/spec/units")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let ready = unit_set
        .pointer("/status/readyUnits")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if desired <= 0 || ready <= 0 {
        UnitSetState::Provisioning
    } else if desired == ready {
        UnitSetState::Ready
    } else {
        UnitSetState::PartiallyReady { desired, ready }
    }
}

async fn probe<Q: ClusterQuery + ?Sized>(
    cluster: &Q,
    handle: &ResourceHandle,
) -> Result<Probe<Observation>, StepError> {
    let object = match cluster.get(handle).await {
        Ok(object) => object,
        Err(e) if e.is_transient() => {
            warn!("{}: {}", handle, e);
            return Ok(Probe::Pending(format!("unavailable ({})", e)));
        }
        Err(e) => return Err(StepError::Query(e)),
    };

    match observe(handle.kind, object.as_ref())? {
        Observation::Job(JobState::Failed { reason }) => Err(StepError::ResourceFailed {
            handle: handle.clone(),
            reason,
        }),
        observation if observation.is_ready() => Ok(Probe::Ready(observation)),
        observation => Ok(Probe::Pending(observation.to_string())),
    }
}

/// Polls `handle` every `interval` until its kind reports ready.
///
/// Missing objects and transient query errors keep the loop going. A failed
/// Job or a non-transient query error aborts at once.
pub async fn wait_for_ready<Q: ClusterQuery + ?Sized>(
    cluster: &Q,
    handle: &ResourceHandle,
    timeout: Duration,
    interval: Duration,
) -> Result<Observation, StepError> {
    if !handle.kind.is_waitable() {
        return Err(StepError::NotWaitable(handle.kind));
    }

    let subject = handle.to_string();
    let waited = poll_until(&subject, interval, Budget::Timeout(timeout), move || {
        probe(cluster, handle)
    })
    .await?;

    match waited {
        Waited::Ready(observation) => Ok(observation),
        Waited::Exhausted { last_status, .. } => Err(StepError::ReadinessTimeout {
            handle: handle.clone(),
            timeout,
            last_status,
        }),
    }
}
