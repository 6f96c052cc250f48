use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected catalog output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no versions of {0} are available")]
    Empty(String),
}

/// Source of the product versions a user may deploy.
#[async_trait]
pub trait PackageCatalog: Send + Sync {
    /// Available versions, newest first when the source orders them.
    async fn versions(&self) -> Result<Vec<String>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct ChartEntry {
    version: String,
    #[serde(default)]
    app_version: String,
}

/// Extracts product versions from `helm search repo -o json` output. The
/// application version is preferred over the chart version; duplicates are
/// dropped keeping the first occurrence.
pub fn parse_helm_search(output: &str) -> Result<Vec<String>, CatalogError> {
    let entries: Vec<ChartEntry> = serde_json::from_str(output)?;
    let mut versions: Vec<String> = vec![];
    for entry in entries {
        let version = if entry.app_version.trim().is_empty() {
            entry.version
        } else {
            entry.app_version
        };
        let version = version.trim().to_string();
        if !version.is_empty() && !versions.contains(&version) {
            versions.push(version);
        }
    }
    Ok(versions)
}

/// Queries the local helm repositories for a chart.
#[derive(Debug, Clone)]
pub struct HelmCatalog {
    chart: String,
    program: String,
}

impl HelmCatalog {
    pub fn new(chart: &str) -> Self {
        HelmCatalog {
            chart: chart.to_string(),
            program: "helm".to_string(),
        }
    }

    pub fn chart(&self) -> &str {
        &self.chart
    }
}

#[async_trait]
impl PackageCatalog for HelmCatalog {
    async fn versions(&self) -> Result<Vec<String>, CatalogError> {
        debug!("Listing versions of {} with {}", self.chart, self.program);
        let output = Command::new(&self.program)
            .args(["search", "repo", &self.chart, "--versions", "-o", "json"])
            .output()
            .await
            .map_err(|source| CatalogError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CatalogError::Status {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let versions = parse_helm_search(&String::from_utf8_lossy(&output.stdout))?;
        if versions.is_empty() {
            return Err(CatalogError::Empty(self.chart.clone()));
        }
        Ok(versions)
    }
}

/// Fixed list of versions, for offline rendering and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    versions: Vec<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticCatalog {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PackageCatalog for StaticCatalog {
    async fn versions(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.versions.clone())
    }
}
