use std::time::Duration;

use crate::errors::PlanError;
use crate::resource::ResourceKind;

/// Resource a step blocks on after applying its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTarget {
    pub kind: ResourceKind,
    /// May contain placeholders; resolved right before polling starts.
    pub name: String,
    pub timeout: Duration,
}

/// A platform-assigned value to read once the step's resources exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Context key the value is stored under.
    pub key: String,
    pub kind: ResourceKind,
    pub name: String,
    /// JSON pointer into the live object, e.g. `/spec/ports/0/nodePort`.
    pub field: String,
}

impl Discovery {
    pub fn new(key: &str, kind: ResourceKind, name: &str, field: &str) -> Self {
        Discovery {
            key: key.to_string(),
            kind,
            name: name.to_string(),
            field: field.to_string(),
        }
    }

    /// NodePort assigned to the first port of a `Service`.
    pub fn node_port(key: &str, service: &str) -> Self {
        Self::new(key, ResourceKind::Service, service, "/spec/ports/0/nodePort")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub ordinal: u32,
    pub label: String,
    /// Name of the template in the template store.
    pub template: String,
    pub wait: Option<WaitTarget>,
    pub discover: Vec<Discovery>,
    pub show_context: bool,
}

impl Step {
    pub fn new(ordinal: u32, label: &str, template: &str) -> Self {
        Step {
            ordinal,
            label: label.to_string(),
            template: template.to_string(),
            wait: None,
            discover: vec![],
            show_context: false,
        }
    }

    pub fn wait_for(mut self, kind: ResourceKind, name: &str, timeout: Duration) -> Self {
        self.wait = Some(WaitTarget {
            kind,
            name: name.to_string(),
            timeout,
        });
        self
    }

    pub fn discover(mut self, discovery: Discovery) -> Self {
        self.discover.push(discovery);
        self
    }

    pub fn show_context(mut self) -> Self {
        self.show_context = true;
        self
    }
}

/// Ordered, immutable sequence of steps for one topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    name: String,
    description: String,
    generated_keys: Vec<String>,
    values: Vec<(String, String)>,
    steps: Vec<Step>,
}

impl DeploymentPlan {
    pub fn new(name: &str, description: &str, steps: Vec<Step>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty(name.to_string()));
        }
        let mut previous = 0;
        for step in &steps {
            if step.ordinal <= previous {
                return Err(PlanError::OrdinalOrder {
                    plan: name.to_string(),
                    ordinal: step.ordinal,
                    previous,
                });
            }
            previous = step.ordinal;

            if let Some(wait) = &step.wait
                && !wait.kind.is_waitable()
            {
                return Err(PlanError::NotWaitable {
                    plan: name.to_string(),
                    ordinal: step.ordinal,
                    kind: wait.kind.to_string(),
                });
            }
        }

        Ok(DeploymentPlan {
            name: name.to_string(),
            description: description.to_string(),
            generated_keys: vec![],
            values: vec![],
            steps,
        })
    }

    /// Declares a context key that receives a freshly generated name suffix
    /// before the first step runs.
    pub fn with_generated_key(mut self, key: &str) -> Self {
        self.generated_keys.push(key.to_string());
        self
    }

    /// Fixed value the plan's templates rely on, seeded with the parameters.
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.push((key.to_string(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn generated_keys(&self) -> &[String] {
        &self.generated_keys
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Intervals and bounds shared by the poll loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub discovery_interval: Duration,
    pub discovery_attempts: u32,
    /// Upper bound for a single apply call.
    pub apply_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(5),
            discovery_interval: Duration::from_secs(5),
            discovery_attempts: 30,
            apply_timeout: Duration::from_secs(60),
        }
    }
}
