use log::{info, warn};
use rollout_defs::{Parameters, ValidationError};
use rollout_utils::{is_dns_label, validate_ipv4};
use semver::Version;

use crate::catalog::PackageCatalog;
use crate::cluster::ClusterInspector;

/// Checks user parameters against the cluster and the package catalog
/// before any step runs.
///
/// Without an inspector (offline rendering) the namespace and storage class
/// are only checked for shape.
pub struct ParameterValidator<'a> {
    inspector: Option<&'a dyn ClusterInspector>,
    catalog: &'a dyn PackageCatalog,
}

impl<'a> ParameterValidator<'a> {
    pub fn new(inspector: &'a dyn ClusterInspector, catalog: &'a dyn PackageCatalog) -> Self {
        ParameterValidator {
            inspector: Some(inspector),
            catalog,
        }
    }

    pub fn offline(catalog: &'a dyn PackageCatalog) -> Self {
        ParameterValidator {
            inspector: None,
            catalog,
        }
    }

    pub async fn validate(&self, params: &Parameters) -> Result<(), ValidationError> {
        if !is_dns_label(&params.namespace) {
            return Err(ValidationError::InvalidNamespace(params.namespace.clone()));
        }
        if params.storage_class.trim().is_empty() {
            return Err(ValidationError::Missing("storage class"));
        }

        if let Some(inspector) = self.inspector {
            let namespaces = inspector
                .namespaces()
                .await
                .map_err(ValidationError::Cluster)?;
            if !namespaces.contains(&params.namespace) {
                return Err(ValidationError::Namespace {
                    given: params.namespace.clone(),
                    available: namespaces,
                });
            }

            let classes = self.storage_class_names().await?;
            if !classes.contains(&params.storage_class) {
                return Err(ValidationError::StorageClass {
                    given: params.storage_class.clone(),
                    available: classes,
                });
            }
        }

        let versions = self.available_versions().await?;
        if !versions.contains(&params.version) {
            return Err(ValidationError::Version {
                given: params.version.clone(),
                available: versions,
            });
        }

        validate_ipv4(&params.node_address).map_err(|reason| ValidationError::Address {
            given: params.node_address.clone(),
            reason,
        })?;

        info!(
            "Parameters accepted: namespace={} storage_class={} version={} node_ip={}",
            params.namespace, params.storage_class, params.version, params.node_address
        );
        Ok(())
    }

    pub async fn available_versions(&self) -> Result<Vec<String>, ValidationError> {
        self.catalog
            .versions()
            .await
            .map_err(|e| ValidationError::Catalog(e.to_string()))
    }

    pub async fn storage_class_names(&self) -> Result<Vec<String>, ValidationError> {
        match self.inspector {
            Some(inspector) => Ok(inspector
                .storage_classes()
                .await
                .map_err(ValidationError::Cluster)?
                .into_iter()
                .map(|class| class.name)
                .collect()),
            None => Ok(vec![]),
        }
    }

    /// The class marked as cluster default, or the only class if there is
    /// exactly one.
    pub async fn detect_storage_class(&self) -> Result<Option<String>, ValidationError> {
        let Some(inspector) = self.inspector else {
            return Ok(None);
        };
        let classes = inspector
            .storage_classes()
            .await
            .map_err(ValidationError::Cluster)?;

        let defaults: Vec<&str> = classes
            .iter()
            .filter(|class| class.is_default)
            .map(|class| class.name.as_str())
            .collect();
        if defaults.len() > 1 {
            warn!("Several default storage classes: {}", defaults.join(", "));
        }
        if let Some(name) = defaults.first() {
            return Ok(Some(name.to_string()));
        }
        match classes.as_slice() {
            [only] => Ok(Some(only.name.clone())),
            _ => Ok(None),
        }
    }

    /// First internal node address that is a valid IPv4 address.
    pub async fn detect_node_address(&self) -> Result<Option<String>, ValidationError> {
        let Some(inspector) = self.inspector else {
            return Ok(None);
        };
        let addresses = inspector
            .node_addresses()
            .await
            .map_err(ValidationError::Cluster)?;
        Ok(addresses
            .into_iter()
            .find(|address| validate_ipv4(address).is_ok()))
    }

    /// Highest catalog version by semantic versioning. Entries that are not
    /// valid semver are ignored.
    pub async fn latest_version(&self) -> Result<Option<String>, ValidationError> {
        let versions = self.available_versions().await?;
        Ok(latest_version(&versions))
    }
}

pub fn latest_version(versions: &[String]) -> Option<String> {
    versions
        .iter()
        .filter_map(|raw| {
            Version::parse(raw.trim_start_matches('v'))
                .ok()
                .map(|parsed| (parsed, raw))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone())
}
