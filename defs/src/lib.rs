mod context;
mod errors;
mod params;
mod plan;
mod resource;

pub use context::TemplateContext;
pub use errors::{
    ClusterError, ContextError, DeployError, PlanError, StepError, ValidationError,
};
pub use params::{KEY_NAMESPACE, KEY_NODE_IP, KEY_STORAGE_CLASS, KEY_VERSION, Parameters};
pub use plan::{DeploymentPlan, Discovery, PollSettings, Step, WaitTarget};
pub use resource::{DiscoveredValue, ResourceHandle, ResourceKind, UPM_GROUP};
