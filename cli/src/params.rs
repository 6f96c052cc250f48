use inquire::{Select, Text};
use log::info;
use rollout_defs::{Parameters, ValidationError};
use rollout_engine::{ParameterValidator, latest_version};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ParameterInput {
    pub namespace: Option<String>,
    pub storage_class: Option<String>,
    pub version: Option<String>,
    pub node_ip: Option<String>,
}

/// Index of `preferred` in `options`, or the first entry.
pub fn starting_cursor(options: &[String], preferred: Option<&str>) -> usize {
    preferred
        .and_then(|wanted| options.iter().position(|option| option == wanted))
        .unwrap_or(0)
}

fn select(message: &str, options: Vec<String>, preferred: Option<&str>) -> anyhow::Result<String> {
    let cursor = starting_cursor(&options, preferred);
    Ok(Select::new(message, options)
        .with_starting_cursor(cursor)
        .prompt()?)
}

fn text(message: &str, default: Option<&str>) -> anyhow::Result<String> {
    let prompt = Text::new(message);
    let answer = match default {
        Some(default) => prompt.with_default(default).prompt()?,
        None => prompt.prompt()?,
    };
    Ok(answer.trim().to_string())
}

/// Fills in every parameter the user did not pass. Interactive sessions are
/// prompted with the detected value preselected; otherwise the detected value
/// is used as is.
pub async fn resolve_parameters(
    input: &ParameterInput,
    validator: &ParameterValidator<'_>,
    interactive: bool,
) -> anyhow::Result<Parameters> {
    let namespace = match &input.namespace {
        Some(namespace) => namespace.clone(),
        None if interactive => text("Namespace:", Some(DEFAULT_NAMESPACE))?,
        None => DEFAULT_NAMESPACE.to_string(),
    };

    let storage_class = match &input.storage_class {
        Some(class) => class.clone(),
        None => {
            let detected = validator.detect_storage_class().await?;
            let classes = validator.storage_class_names().await?;
            if interactive && !classes.is_empty() {
                select("Storage class:", classes, detected.as_deref())?
            } else {
                let class = detected.ok_or(ValidationError::Missing("storage class"))?;
                info!("Using storage class {}", class);
                class
            }
        }
    };

    let version = match &input.version {
        Some(version) => version.clone(),
        None => {
            let versions = validator.available_versions().await?;
            let latest = latest_version(&versions);
            if interactive && !versions.is_empty() {
                select("Version:", versions, latest.as_deref())?
            } else {
                let version = latest.ok_or(ValidationError::Missing("version"))?;
                info!("Using version {}", version);
                version
            }
        }
    };

    let node_address = match &input.node_ip {
        Some(address) => address.clone(),
        None => {
            let detected = validator.detect_node_address().await?;
            if interactive {
                text("Node address:", detected.as_deref())?
            } else {
                let address = detected.ok_or(ValidationError::Missing("node address"))?;
                info!("Using node address {}", address);
                address
            }
        }
    };

    Ok(Parameters {
        namespace,
        storage_class,
        version,
        node_address,
    })
}
