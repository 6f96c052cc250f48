use std::time::Duration;

use log::{error, info};
use rand::Rng;
use rollout_defs::{
    ContextError, DeployError, DeploymentPlan, DiscoveredValue, KEY_NAMESPACE, Parameters,
    PollSettings, ResourceHandle, Step, StepError, TemplateContext, ValidationError,
};
use rollout_utils::template::{resolve, unresolved_tokens};
use rollout_utils::{IdGenerator, format_key_values};
use serde::Serialize;
use tokio::time::{Instant, timeout};

use crate::cluster::Cluster;
use crate::discovery::discover;
use crate::readiness::wait_for_ready;
use crate::templates::TemplateStore;
use crate::validation::ParameterValidator;

/// A manifest produced by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedStep {
    pub ordinal: u32,
    pub label: String,
    pub manifest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: String,
    pub completed_steps: u32,
    pub discovered: Vec<DiscoveredValue>,
    pub rendered: Vec<RenderedStep>,
    pub elapsed: Duration,
    pub dry_run: bool,
}

enum Mode<'a> {
    Live(&'a dyn Cluster),
    DryRun,
}

/// Replays a plan step by step, stopping at the first failure. Resources
/// created by earlier steps are left in place.
pub struct Sequencer<'a> {
    mode: Mode<'a>,
    templates: &'a TemplateStore,
    settings: PollSettings,
    completed: u32,
}

impl<'a> Sequencer<'a> {
    pub fn new(cluster: &'a dyn Cluster, templates: &'a TemplateStore, settings: PollSettings) -> Self {
        Sequencer {
            mode: Mode::Live(cluster),
            templates,
            settings,
            completed: 0,
        }
    }

    /// Resolves every template without touching a cluster. Discovered values
    /// stay as placeholders in the output.
    pub fn dry_run(templates: &'a TemplateStore) -> Self {
        Sequencer {
            mode: Mode::DryRun,
            templates,
            settings: PollSettings::default(),
            completed: 0,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.mode, Mode::DryRun)
    }

    /// Steps finished by the last (or current) run, also after a failure.
    pub fn completed_steps(&self) -> u32 {
        self.completed
    }

    pub async fn run(
        &mut self,
        plan: &DeploymentPlan,
        ctx: &mut TemplateContext,
    ) -> Result<RunReport, DeployError> {
        let started = Instant::now();
        self.completed = 0;

        let namespace = ctx
            .get(KEY_NAMESPACE)
            .map(str::to_string)
            .ok_or(ValidationError::Missing("namespace"))?;

        let mut report = RunReport {
            plan: plan.name().to_string(),
            completed_steps: 0,
            discovered: vec![],
            rendered: vec![],
            elapsed: Duration::ZERO,
            dry_run: self.is_dry_run(),
        };

        info!(
            "Running plan {} ({} steps) in namespace {}{}",
            plan.name(),
            plan.len(),
            namespace,
            if report.dry_run { ", dry run" } else { "" }
        );

        for step in plan.steps() {
            info!("Step {}/{}: {}", step.ordinal, plan.len(), step.label);
            if let Err(source) = self.run_step(step, &namespace, ctx, &mut report).await {
                error!("Step {} ({}) failed: {}", step.ordinal, step.label, source);
                return Err(DeployError::Step {
                    ordinal: step.ordinal,
                    label: step.label.clone(),
                    source,
                });
            }
            self.completed += 1;
            report.completed_steps = self.completed;
        }

        report.elapsed = started.elapsed();
        info!(
            "Plan {} finished: {} steps in {}s",
            plan.name(),
            report.completed_steps,
            report.elapsed.as_secs()
        );
        Ok(report)
    }

    async fn run_step(
        &self,
        step: &Step,
        namespace: &str,
        ctx: &mut TemplateContext,
        report: &mut RunReport,
    ) -> Result<(), StepError> {
        let template = self.templates.get(&step.template)?;
        let manifest = resolve(&template, ctx);

        let cluster = match self.mode {
            Mode::DryRun => {
                report.rendered.push(RenderedStep {
                    ordinal: step.ordinal,
                    label: step.label.clone(),
                    manifest,
                });
                if step.show_context {
                    log_context(step, ctx);
                }
                return Ok(());
            }
            Mode::Live(cluster) => cluster,
        };

        let tokens = unresolved_tokens(&manifest);
        if !tokens.is_empty() {
            return Err(StepError::Unresolved {
                what: format!("template '{}'", step.template),
                tokens,
            });
        }
        timeout(self.settings.apply_timeout, cluster.apply(namespace, &manifest))
            .await
            .map_err(|_| StepError::ApplyTimeout(self.settings.apply_timeout))?
            .map_err(StepError::Apply)?;

        for discovery in &step.discover {
            let value = discover(cluster, discovery, namespace, ctx, &self.settings).await?;
            report.discovered.push(value);
        }
        if step.show_context {
            log_context(step, ctx);
        }

        if let Some(wait) = &step.wait {
            let name = resolve(&wait.name, ctx);
            let tokens = unresolved_tokens(&name);
            if !tokens.is_empty() {
                return Err(StepError::Unresolved {
                    what: format!("name of {} to wait for", wait.kind),
                    tokens,
                });
            }
            let handle = ResourceHandle::new(wait.kind, namespace, &name);
            info!("Waiting up to {}s for {}", wait.timeout.as_secs(), handle);
            let observation =
                wait_for_ready(cluster, &handle, wait.timeout, self.settings.interval).await?;
            info!("{} is {}", handle, observation);
        }
        Ok(())
    }
}

fn log_context(step: &Step, ctx: &TemplateContext) {
    info!(
        "Context after step {}:\n{}",
        step.ordinal,
        format_key_values(ctx.iter()).trim_end()
    );
}

/// Builds the initial context: validated parameters, the plan's fixed values
/// and one fresh suffix per generated key.
pub fn seed_context<R: Rng>(
    plan: &DeploymentPlan,
    params: &Parameters,
    ids: &mut IdGenerator<R>,
) -> Result<TemplateContext, ContextError> {
    let mut ctx = TemplateContext::new();
    params.seed(&mut ctx)?;
    for (key, value) in plan.values() {
        ctx.insert(key, value)?;
    }
    for key in plan.generated_keys() {
        let suffix = ids.suffix();
        info!("Generated {} = {}", key, suffix);
        ctx.insert(key.as_str(), suffix)?;
    }
    Ok(ctx)
}

/// Validates `params`, seeds the context and runs `plan`. Nothing is applied
/// when validation fails.
pub async fn validate_and_run<R: Rng>(
    sequencer: &mut Sequencer<'_>,
    validator: &ParameterValidator<'_>,
    plan: &DeploymentPlan,
    params: &Parameters,
    ids: &mut IdGenerator<R>,
) -> Result<RunReport, DeployError> {
    validator.validate(params).await?;
    let mut ctx = seed_context(plan, params, ids)?;
    sequencer.run(plan, &mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterApply, ClusterQuery};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rollout_defs::{ClusterError, Discovery, ResourceKind};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Records applies; every object is immediately ready and every Service
    /// has node port 30000 + unit index.
    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<String>>,
        fail_apply_on: Option<usize>,
        stall_apply_on: Option<usize>,
    }

    #[async_trait]
    impl ClusterQuery for Recorder {
        async fn get(&self, handle: &ResourceHandle) -> Result<Option<Value>, ClusterError> {
            Ok(Some(match handle.kind {
                ResourceKind::Job => {
                    json!({ "status": { "conditions": [{ "type": "Complete", "status": "True" }] } })
                }
                ResourceKind::UnitSet => {
                    json!({ "spec": { "units": 1 }, "status": { "readyUnits": 1 } })
                }
                ResourceKind::Replication(_) => json!({ "status": { "ready": true } }),
                ResourceKind::Service => json!({ "spec": { "ports": [{ "nodePort": 30000 }] } }),
            }))
        }
    }

    #[async_trait]
    impl ClusterApply for Recorder {
        async fn apply(&self, _namespace: &str, manifest: &str) -> Result<(), ClusterError> {
            let call = self.applied.lock().unwrap().len();
            if Some(call) == self.fail_apply_on {
                return Err(ClusterError::Api {
                    code: 422,
                    message: "spec.units: Invalid value".to_string(),
                });
            }
            if Some(call) == self.stall_apply_on {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.applied.lock().unwrap().push(manifest.to_string());
            Ok(())
        }
    }

    fn store() -> TemplateStore {
        TemplateStore::from_templates([
            ("job", "kind: Job\nname: secret-<suffix>\n"),
            ("units", "kind: UnitSet\nname: units-<suffix>\nns: <namespace>\n"),
            ("topology", "kind: Topology\nport: <port_0>\n"),
        ])
    }

    fn plan() -> DeploymentPlan {
        DeploymentPlan::new(
            "demo",
            "three steps",
            vec![
                Step::new(1, "Create credentials", "job").wait_for(
                    ResourceKind::Job,
                    "secret-<suffix>",
                    Duration::from_secs(60),
                ),
                Step::new(2, "Create units", "units")
                    .wait_for(ResourceKind::UnitSet, "units-<suffix>", Duration::from_secs(60))
                    .discover(Discovery::node_port("port_0", "units-<suffix>-0-svc"))
                    .show_context(),
                Step::new(3, "Configure", "topology"),
            ],
        )
        .unwrap()
        .with_generated_key("suffix")
    }

    fn context() -> TemplateContext {
        TemplateContext::from_pairs([("namespace", "demo"), ("suffix", "abc123")]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_run_feeds_discoveries_forward() {
        let cluster = Recorder::default();
        let templates = store();
        let mut sequencer = Sequencer::new(&cluster, &templates, PollSettings::default());
        let mut ctx = context();

        let report = sequencer.run(&plan(), &mut ctx).await.unwrap();

        assert_eq!(report.completed_steps, 3);
        assert!(!report.dry_run);
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(
            *cluster.applied.lock().unwrap(),
            vec![
                "kind: Job\nname: secret-abc123\n".to_string(),
                "kind: UnitSet\nname: units-abc123\nns: demo\n".to_string(),
                "kind: Topology\nport: 30000\n".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_the_plan() {
        let cluster = Recorder {
            fail_apply_on: Some(1),
            ..Recorder::default()
        };
        let templates = store();
        let mut sequencer = Sequencer::new(&cluster, &templates, PollSettings::default());
        let mut ctx = context();

        let err = sequencer.run(&plan(), &mut ctx).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "step 2 (Create units): apply failed: api error 422: spec.units: Invalid value"
        );
        assert_eq!(sequencer.completed_steps(), 1);
        assert_eq!(cluster.applied.lock().unwrap().len(), 1);
        assert!(!ctx.contains("port_0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_apply_is_bounded() {
        let cluster = Recorder {
            stall_apply_on: Some(1),
            ..Recorder::default()
        };
        let templates = store();
        let settings = PollSettings {
            apply_timeout: Duration::from_secs(20),
            ..PollSettings::default()
        };
        let mut sequencer = Sequencer::new(&cluster, &templates, settings);
        let mut ctx = context();
        let started = Instant::now();

        let err = sequencer.run(&plan(), &mut ctx).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "step 2 (Create units): apply did not finish within 20s"
        );
        assert_eq!(sequencer.completed_steps(), 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed < Duration::from_secs(21));
    }

    #[tokio::test]
    async fn test_dry_run_renders_without_cluster() {
        let templates = store();
        let mut sequencer = Sequencer::dry_run(&templates);
        let mut ctx = context();

        let report = sequencer.run(&plan(), &mut ctx).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.completed_steps, 3);
        assert!(report.discovered.is_empty());
        let manifests: Vec<&str> = report.rendered.iter().map(|r| r.manifest.as_str()).collect();
        assert_eq!(
            manifests,
            vec![
                "kind: Job\nname: secret-abc123\n",
                "kind: UnitSet\nname: units-abc123\nns: demo\n",
                "kind: Topology\nport: <port_0>\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_live_run_rejects_unresolved_manifest() {
        let cluster = Recorder::default();
        let templates = store();
        let mut sequencer = Sequencer::new(&cluster, &templates, PollSettings::default());
        let mut ctx = TemplateContext::from_pairs([("namespace", "demo")]).unwrap();

        let err = sequencer.run(&plan(), &mut ctx).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Step {
                ordinal: 1,
                source: StepError::Unresolved { .. },
                ..
            }
        ));
        assert!(cluster.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_namespace() {
        let templates = store();
        let mut sequencer = Sequencer::dry_run(&templates);
        let mut ctx = TemplateContext::new();
        assert!(matches!(
            sequencer.run(&plan(), &mut ctx).await,
            Err(DeployError::Validation(ValidationError::Missing("namespace")))
        ));
    }

    #[test]
    fn test_seed_context() {
        let params = Parameters {
            namespace: "demo".to_string(),
            storage_class: "local-path".to_string(),
            version: "7.2.4".to_string(),
            node_address: "10.0.0.12".to_string(),
        };
        let plan = plan().with_value("redis_units", "3");
        let mut ids = IdGenerator::with_rng(StdRng::seed_from_u64(1));

        let ctx = seed_context(&plan, &params, &mut ids).unwrap();

        assert_eq!(ctx.len(), 6);
        assert_eq!(ctx.get("redis_units"), Some("3"));
        let suffix = ctx.get("suffix").unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().next().unwrap().is_ascii_lowercase());
    }
}
