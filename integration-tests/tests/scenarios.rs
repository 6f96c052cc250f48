mod utils;
use utils::{parameters, poll_settings, seeded_ids, test_scaffold, versions};

#[cfg(test)]
mod scenario_tests {
    use super::*;
    use integration_tests::{FIRST_NODE_PORT, FakeCluster, FakeInspector, UnreachableCatalog};
    use pretty_assertions::assert_eq;
    use rollout_defs::{
        DeployError, DeploymentPlan, ResourceHandle, ResourceKind, Step, StepError,
        TemplateContext, ValidationError,
    };
    use rollout_engine::plans::{REDIS_REPLICATION, plan_for};
    use rollout_engine::{
        ClusterApply, ParameterValidator, Sequencer, StaticCatalog, TemplateStore,
        validate_and_run, wait_for_ready,
    };
    use rollout_utils::template::{resolve, unresolved_tokens};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_render_resolves_every_parameter() {
        test_scaffold(|| async move {
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let validator = ParameterValidator::offline(&catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::dry_run(&templates);

            let report =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap();

            assert_eq!(report.rendered.len(), 4);
            let unit_set = &report.rendered[1].manifest;
            assert!(unit_set.contains("namespace: demo"));
            assert!(unit_set.contains("version: \"7.2.4\""));
            assert!(unit_set.contains("units: 3"));
            assert!(unresolved_tokens(unit_set).is_empty());
            // Node ports only exist once the units are up.
            assert_eq!(
                unresolved_tokens(&report.rendered[2].manifest),
                vec!["redis_port_0", "redis_port_1", "redis_port_2"]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_timeout_reports_last_status() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default().with_job_running_for(u32::MAX);
            let templates = TemplateStore::embedded();
            let plan = DeploymentPlan::new(
                "credentials-only",
                "",
                vec![Step::new(1, "Create credentials", "credentials-job").wait_for(
                    ResourceKind::Job,
                    "redis-<suffix>-secret",
                    Duration::from_secs(5),
                )],
            )
            .unwrap();
            let mut ctx =
                TemplateContext::from_pairs([("namespace", "demo"), ("suffix", "k3x9q1")]).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let started = Instant::now();
            let err = sequencer.run(&plan, &mut ctx).await.unwrap_err();
            let elapsed = started.elapsed();

            assert!(elapsed >= Duration::from_secs(5));
            assert!(elapsed < Duration::from_secs(6));
            assert_eq!(
                err.to_string(),
                "step 1 (Create credentials): timed out after 5s waiting for Job/demo/redis-k3x9q1-secret, last observed status: Running"
            );
            assert_eq!(sequencer.completed_steps(), 0);
            assert!(cluster.get_calls() >= 5);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_failure_is_fatal() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default().with_failing_job("redis-");
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let started = Instant::now();
            let err =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap_err();

            assert!(started.elapsed() < Duration::from_secs(1));
            match err {
                DeployError::Step {
                    ordinal,
                    source: StepError::ResourceFailed { reason, .. },
                    ..
                } => {
                    assert_eq!(ordinal, 1);
                    assert!(reason.starts_with("BackoffLimitExceeded"));
                }
                other => panic!("unexpected error: {}", other),
            }
            assert_eq!(cluster.apply_calls(), 1);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unit_set_partially_ready_then_ready() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default();
            let templates = TemplateStore::embedded();
            let ctx = TemplateContext::from_pairs([
                ("namespace", "demo"),
                ("suffix", "k3x9q1"),
                ("version", "7.2.4"),
                ("redis_units", "3"),
                ("storage_class", "local-path"),
            ])
            .unwrap();
            let manifest = resolve(&templates.get("redis-unitset").unwrap(), &ctx);
            cluster.apply("demo", &manifest).await.unwrap();
            let handle = ResourceHandle::new(ResourceKind::UnitSet, "demo", "redis-k3x9q1");

            let err = wait_for_ready(&cluster, &handle, Duration::from_secs(2), Duration::from_secs(1))
                .await
                .unwrap_err();
            match err {
                StepError::ReadinessTimeout { last_status, .. } => {
                    assert_eq!(last_status, "PartiallyReady (2/3 units ready)")
                }
                other => panic!("unexpected error: {}", other),
            }

            let observation =
                wait_for_ready(&cluster, &handle, Duration::from_secs(2), Duration::from_secs(1))
                    .await
                    .unwrap();
            assert_eq!(observation.to_string(), "Ready");
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_node_ports_feed_the_replication_step() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default().with_port_pending_for(3);
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let report =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap();

            let ports: Vec<&str> = report.discovered.iter().map(|d| d.value.as_str()).collect();
            assert_eq!(ports, vec!["30100", "30101", "30102"]);
            assert_eq!(report.discovered[0].key, "redis_port_0");

            let replication = cluster
                .applied()
                .into_iter()
                .find(|o| o.kind == "RedisReplication")
                .unwrap();
            assert_eq!(
                replication.body["spec"]["source"]["port"].as_u64(),
                Some(FIRST_NODE_PORT)
            );
            assert_eq!(
                replication.body["spec"]["replica"][1]["port"].as_u64(),
                Some(FIRST_NODE_PORT + 2)
            );
            assert_eq!(
                replication.body["spec"]["source"]["host"].as_str(),
                Some("10.0.0.12")
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_gives_up() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default().with_port_pending_for(u32::MAX);
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let err =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap_err();

            match err {
                DeployError::Step {
                    ordinal,
                    source: StepError::DiscoveryExhausted { key, attempts, .. },
                    ..
                } => {
                    assert_eq!(ordinal, 2);
                    assert_eq!(key, "redis_port_0");
                    assert_eq!(attempts, 10);
                }
                other => panic!("unexpected error: {}", other),
            }
            assert_eq!(sequencer.completed_steps(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn test_invalid_version_applies_nothing() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default();
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());
            let params = rollout_defs::Parameters {
                version: "9.9.9".to_string(),
                ..parameters()
            };

            let err = validate_and_run(&mut sequencer, &validator, &plan, &params, &mut seeded_ids())
                .await
                .unwrap_err();

            match err {
                DeployError::Validation(ValidationError::Version { given, available }) => {
                    assert_eq!(given, "9.9.9");
                    assert_eq!(available, versions());
                }
                other => panic!("unexpected error: {}", other),
            }
            assert_eq!(cluster.apply_calls(), 0);
            assert_eq!(cluster.get_calls(), 0);
            assert_eq!(sequencer.completed_steps(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_unknown_namespace_applies_nothing() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default();
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());
            let params = rollout_defs::Parameters {
                namespace: "staging".to_string(),
                ..parameters()
            };

            let err = validate_and_run(&mut sequencer, &validator, &plan, &params, &mut seeded_ids())
                .await
                .unwrap_err();

            assert_eq!(
                err.to_string(),
                "validation failed: namespace 'staging' does not exist, available: default, demo"
            );
            assert_eq!(cluster.apply_calls(), 0);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_failure_stops_before_next_step() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default().with_fail_apply_at(1);
            let templates = TemplateStore::embedded();
            let catalog = StaticCatalog::new(versions());
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &catalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let err =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap_err();

            assert_eq!(
                err.to_string(),
                "step 2 (Create redis units): apply failed: api error 422: admission webhook denied the request"
            );
            assert_eq!(sequencer.completed_steps(), 1);
            assert_eq!(cluster.apply_calls(), 2);
            assert_eq!(
                cluster.applied_kinds(),
                vec!["ServiceAccount", "Role", "RoleBinding", "Job"]
            );
        })
        .await;
    }

    #[tokio::test]
    async fn test_unreachable_catalog_applies_nothing() {
        test_scaffold(|| async move {
            let cluster = FakeCluster::default();
            let templates = TemplateStore::embedded();
            let inspector = FakeInspector::default();
            let validator = ParameterValidator::new(&inspector, &UnreachableCatalog);
            let plan = plan_for(REDIS_REPLICATION).unwrap();
            let mut sequencer = Sequencer::new(&cluster, &templates, poll_settings());

            let err =
                validate_and_run(&mut sequencer, &validator, &plan, &parameters(), &mut seeded_ids())
                    .await
                    .unwrap_err();

            assert_eq!(
                err.to_string(),
                "validation failed: package catalog unavailable: no versions of bitnami/redis are available"
            );
            assert_eq!(cluster.apply_calls(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_detects_cluster_defaults() {
        test_scaffold(|| async move {
            let inspector = FakeInspector::default();
            let catalog = StaticCatalog::new(versions());
            let validator = ParameterValidator::new(&inspector, &catalog);

            assert_eq!(
                validator.detect_storage_class().await.unwrap().as_deref(),
                Some("local-path")
            );
            assert_eq!(
                validator.detect_node_address().await.unwrap().as_deref(),
                Some("10.0.0.12")
            );
            assert_eq!(
                validator.latest_version().await.unwrap().as_deref(),
                Some("7.2.4")
            );
        })
        .await;
    }
}
