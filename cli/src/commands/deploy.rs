use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use log::info;
use rollout_defs::{DeployError, PollSettings};
use rollout_engine::plans::plan_for;
use rollout_engine::{
    HelmCatalog, KubeCluster, PackageCatalog, ParameterValidator, RunReport, Sequencer,
    StaticCatalog, TemplateStore, validate_and_run,
};
use rollout_utils::IdGenerator;

use crate::output::failure_report;
use crate::params::{ParameterInput, resolve_parameters};

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Topology to deploy, e.g. redis-sentinel (see `rollout plans`)
    pub topology: String,
    /// Namespace to deploy into, must already exist (prompted for if omitted)
    #[arg(short, long, env = "ROLLOUT_NAMESPACE")]
    pub namespace: Option<String>,
    /// Storage class of the unit volumes, e.g. local-path (defaults to the cluster default)
    #[arg(long, env = "ROLLOUT_STORAGE_CLASS")]
    pub storage_class: Option<String>,
    /// Redis version, must be offered by the package catalog (defaults to the latest)
    #[arg(long, env = "ROLLOUT_VERSION")]
    pub version: Option<String>,
    /// Node address clients connect through, e.g. 10.0.0.12 (defaults to the first node InternalIP)
    #[arg(long, env = "ROLLOUT_NODE_IP")]
    pub node_ip: Option<String>,
    /// Chart whose versions are offered, looked up with `helm search repo`
    #[arg(long, env = "ROLLOUT_CHART", default_value = "bitnami/redis")]
    pub chart: String,
    /// Comma separated list of allowed versions, skips the helm lookup
    #[arg(long, value_delimiter = ',')]
    pub versions: Vec<String>,
    /// Directory of <template>.yaml files replacing built-in templates
    #[arg(long)]
    pub template_dir: Option<PathBuf>,
    /// Seconds between readiness checks
    #[arg(long, env = "ROLLOUT_POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval: u64,
    /// Seconds a single apply may take before the step fails
    #[arg(long, env = "ROLLOUT_APPLY_TIMEOUT", default_value_t = 60)]
    pub apply_timeout: u64,
    /// Never prompt, detect missing values instead
    #[arg(long)]
    pub non_interactive: bool,
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    fn parameter_input(&self) -> ParameterInput {
        ParameterInput {
            namespace: self.namespace.clone(),
            storage_class: self.storage_class.clone(),
            version: self.version.clone(),
            node_ip: self.node_ip.clone(),
        }
    }

    fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval.max(1)),
            apply_timeout: Duration::from_secs(self.apply_timeout.max(1)),
            ..PollSettings::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Validate against the cluster and apply.
    Apply,
    /// Validate against the cluster, print manifests instead of applying.
    DryRun,
    /// No cluster access at all.
    Render,
}

pub async fn handle_deploy(args: &DeployArgs, mode: RunMode) -> anyhow::Result<RunReport> {
    let plan = plan_for(&args.topology)?;

    let mut templates = TemplateStore::embedded();
    if let Some(dir) = &args.template_dir {
        templates = templates.with_override_dir(dir)?;
    }

    let catalog: Box<dyn PackageCatalog> = if args.versions.is_empty() {
        Box::new(HelmCatalog::new(&args.chart))
    } else {
        Box::new(StaticCatalog::new(args.versions.clone()))
    };

    let cluster = match mode {
        RunMode::Render => None,
        RunMode::Apply | RunMode::DryRun => Some(
            KubeCluster::connect()
                .await
                .context("failed to connect to the cluster")?,
        ),
    };
    let validator = match &cluster {
        Some(cluster) => ParameterValidator::new(cluster, catalog.as_ref()),
        None => ParameterValidator::offline(catalog.as_ref()),
    };

    let interactive = !args.non_interactive && std::io::stdin().is_terminal();
    let params = resolve_parameters(&args.parameter_input(), &validator, interactive).await?;

    let mut sequencer = match (&cluster, mode) {
        (Some(cluster), RunMode::Apply) => Sequencer::new(cluster, &templates, args.poll_settings()),
        _ => Sequencer::dry_run(&templates),
    };
    info!("Deploying {}: {}", plan.name(), plan.description());

    let mut ids = IdGenerator::new();
    match validate_and_run(&mut sequencer, &validator, &plan, &params, &mut ids).await {
        Ok(report) => Ok(report),
        Err(e) => {
            if let DeployError::Step { .. } = e {
                eprint!("{}", failure_report(&plan, sequencer.completed_steps()));
            }
            Err(e.into())
        }
    }
}
