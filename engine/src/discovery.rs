use log::{info, warn};
use rollout_defs::{
    DiscoveredValue, Discovery, PollSettings, ResourceHandle, StepError, TemplateContext,
};
use rollout_utils::template::{resolve, unresolved_tokens};
use serde_json::Value;

use crate::cluster::ClusterQuery;
use crate::poll::{Budget, Probe, Waited, poll_until};

/// Renders a field of a live object as a context value. `None` means the
/// platform has not filled it in yet.
pub fn read_field(object: &Value, pointer: &str) -> Option<String> {
    match object.pointer(pointer)? {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolves the resource name of a discovery against the current context.
pub fn discovery_handle(
    discovery: &Discovery,
    namespace: &str,
    ctx: &TemplateContext,
) -> Result<ResourceHandle, StepError> {
    let name = resolve(&discovery.name, ctx);
    let tokens = unresolved_tokens(&name);
    if !tokens.is_empty() {
        return Err(StepError::Unresolved {
            what: format!("name of {} for '{}'", discovery.kind, discovery.key),
            tokens,
        });
    }
    Ok(ResourceHandle::new(discovery.kind, namespace, &name))
}

async fn probe<Q: ClusterQuery + ?Sized>(
    cluster: &Q,
    handle: &ResourceHandle,
    field: &str,
) -> Result<Probe<String>, StepError> {
    match cluster.get(handle).await {
        Ok(Some(object)) => Ok(match read_field(&object, field) {
            Some(value) => Probe::Ready(value),
            None => Probe::Pending(format!("{} not set", field)),
        }),
        Ok(None) => Ok(Probe::Pending("not found".to_string())),
        Err(e) if e.is_transient() => {
            warn!("{}: {}", handle, e);
            Ok(Probe::Pending(format!("unavailable ({})", e)))
        }
        Err(e) => Err(StepError::Query(e)),
    }
}

/// Waits for a platform-assigned value and merges it into `ctx`.
///
/// A key that is already in the context is returned as is, without touching
/// the cluster, so re-running a step does not query twice.
pub async fn discover<Q: ClusterQuery + ?Sized>(
    cluster: &Q,
    discovery: &Discovery,
    namespace: &str,
    ctx: &mut TemplateContext,
    settings: &PollSettings,
) -> Result<DiscoveredValue, StepError> {
    let handle = discovery_handle(discovery, namespace, ctx)?;

    if let Some(value) = ctx.get(&discovery.key) {
        info!("{} already known: {}", discovery.key, value);
        return Ok(DiscoveredValue {
            key: discovery.key.clone(),
            handle,
            value: value.to_string(),
        });
    }

    let subject = format!("{} ({})", discovery.key, handle);
    let field = discovery.field.as_str();
    let target = &handle;
    let waited = poll_until(
        &subject,
        settings.discovery_interval,
        Budget::Attempts(settings.discovery_attempts.max(1)),
        move || probe(cluster, target, field),
    )
    .await?;

    match waited {
        Waited::Ready(value) => {
            ctx.insert(discovery.key.as_str(), value.as_str())?;
            info!("Discovered {} = {}", discovery.key, value);
            Ok(DiscoveredValue {
                key: discovery.key.clone(),
                handle,
                value,
            })
        }
        Waited::Exhausted { attempts, .. } => Err(StepError::DiscoveryExhausted {
            key: discovery.key.clone(),
            handle,
            field: discovery.field.clone(),
            attempts,
        }),
    }
}
