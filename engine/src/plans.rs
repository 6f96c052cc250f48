use std::time::Duration;

use rollout_defs::{DeploymentPlan, Discovery, PlanError, ResourceKind, Step};

pub const REDIS_REPLICATION: &str = "redis-replication";
pub const REDIS_SENTINEL: &str = "redis-sentinel";
pub const REDIS_CLUSTER: &str = "redis-cluster";

/// Context key of the generated suffix shared by every resource name.
pub const SUFFIX_KEY: &str = "suffix";

const JOB_TIMEOUT: Duration = Duration::from_secs(300);
const UNIT_SET_TIMEOUT: Duration = Duration::from_secs(600);
const TOPOLOGY_TIMEOUT: Duration = Duration::from_secs(300);

const REPLICATION_KIND: ResourceKind = ResourceKind::Replication("RedisReplication");
const SENTINEL_KIND: ResourceKind = ResourceKind::Replication("RedisSentinel");
const CLUSTER_KIND: ResourceKind = ResourceKind::Replication("RedisCluster");

pub fn topology_names() -> Vec<&'static str> {
    vec![REDIS_REPLICATION, REDIS_SENTINEL, REDIS_CLUSTER]
}

pub fn plan_for(topology: &str) -> Result<DeploymentPlan, PlanError> {
    match topology {
        REDIS_REPLICATION => redis_replication(),
        REDIS_SENTINEL => redis_sentinel(),
        REDIS_CLUSTER => redis_cluster(),
        other => Err(PlanError::UnknownTopology {
            given: other.to_string(),
            available: topology_names().iter().map(|n| n.to_string()).collect(),
        }),
    }
}

fn credentials_step(ordinal: u32) -> Step {
    Step::new(ordinal, "Create credentials", "credentials-job").wait_for(
        ResourceKind::Job,
        "redis-<suffix>-secret",
        JOB_TIMEOUT,
    )
}

/// UnitSet whose per-unit NodePort services are created by its operator as
/// `<unitset>-<i>-svc`.
fn unit_set_step(
    ordinal: u32,
    label: &str,
    template: &str,
    unit_set: &str,
    units: u32,
    port_prefix: &str,
) -> Step {
    let mut step = Step::new(ordinal, label, template).wait_for(
        ResourceKind::UnitSet,
        unit_set,
        UNIT_SET_TIMEOUT,
    );
    for i in 0..units {
        step = step.discover(Discovery::node_port(
            &format!("{}_{}", port_prefix, i),
            &format!("{}-{}-svc", unit_set, i),
        ));
    }
    step.show_context()
}

fn client_service_step(ordinal: u32) -> Step {
    Step::new(ordinal, "Expose client service", "client-service")
}

fn redis_replication() -> Result<DeploymentPlan, PlanError> {
    let steps = vec![
        credentials_step(1),
        unit_set_step(2, "Create redis units", "redis-unitset", "redis-<suffix>", 3, "redis_port"),
        Step::new(3, "Configure replication", "redis-replication").wait_for(
            REPLICATION_KIND,
            "redis-<suffix>-replication",
            TOPOLOGY_TIMEOUT,
        ),
        client_service_step(4),
    ];
    Ok(DeploymentPlan::new(
        REDIS_REPLICATION,
        "One primary and two replicas",
        steps,
    )?
    .with_generated_key(SUFFIX_KEY)
    .with_value("redis_units", "3"))
}

fn redis_sentinel() -> Result<DeploymentPlan, PlanError> {
    let steps = vec![
        credentials_step(1),
        unit_set_step(2, "Create redis units", "redis-unitset", "redis-<suffix>", 3, "redis_port"),
        Step::new(3, "Configure replication", "redis-replication").wait_for(
            REPLICATION_KIND,
            "redis-<suffix>-replication",
            TOPOLOGY_TIMEOUT,
        ),
        unit_set_step(
            4,
            "Create sentinel units",
            "sentinel-unitset",
            "sentinel-<suffix>",
            3,
            "sentinel_port",
        ),
        Step::new(5, "Configure sentinel", "redis-sentinel").wait_for(
            SENTINEL_KIND,
            "sentinel-<suffix>",
            TOPOLOGY_TIMEOUT,
        ),
        client_service_step(6),
    ];
    Ok(DeploymentPlan::new(
        REDIS_SENTINEL,
        "Replicated redis monitored by three sentinels",
        steps,
    )?
    .with_generated_key(SUFFIX_KEY)
    .with_value("redis_units", "3")
    .with_value("sentinel_units", "3")
    .with_value("master_name", "mymaster")
    .with_value("quorum", "2"))
}

fn redis_cluster() -> Result<DeploymentPlan, PlanError> {
    let steps = vec![
        credentials_step(1),
        unit_set_step(2, "Create redis units", "redis-unitset", "redis-<suffix>", 6, "redis_port"),
        Step::new(3, "Form cluster", "redis-cluster").wait_for(
            CLUSTER_KIND,
            "redis-<suffix>-cluster",
            TOPOLOGY_TIMEOUT,
        ),
        client_service_step(4),
    ];
    Ok(DeploymentPlan::new(
        REDIS_CLUSTER,
        "Three shards with one replica each",
        steps,
    )?
    .with_generated_key(SUFFIX_KEY)
    .with_value("redis_units", "6")
    .with_value("shards", "3")
    .with_value("replicas_per_shard", "1"))
}
