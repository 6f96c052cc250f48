use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rollout_defs::StepError;

const EMBEDDED: &[(&str, &str)] = &[
    (
        "credentials-job",
        include_str!("../templates/credentials-job.yaml"),
    ),
    ("redis-unitset", include_str!("../templates/redis-unitset.yaml")),
    (
        "redis-replication",
        include_str!("../templates/redis-replication.yaml"),
    ),
    (
        "sentinel-unitset",
        include_str!("../templates/sentinel-unitset.yaml"),
    ),
    ("redis-sentinel", include_str!("../templates/redis-sentinel.yaml")),
    ("redis-cluster", include_str!("../templates/redis-cluster.yaml")),
    ("client-service", include_str!("../templates/client-service.yaml")),
];

/// Named manifest templates. Built-in templates ship inside the binary; a
/// directory of `<name>.yaml` files can replace any of them.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: BTreeMap<String, String>,
    override_dir: Option<PathBuf>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::embedded()
    }
}

impl TemplateStore {
    pub fn embedded() -> Self {
        TemplateStore {
            templates: EMBEDDED
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
            override_dir: None,
        }
    }

    pub fn from_templates<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        TemplateStore {
            templates: templates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            override_dir: None,
        }
    }

    /// Looks up `<dir>/<name>.yaml` before falling back to the built-in
    /// template. Fails if `dir` is not a directory.
    pub fn with_override_dir(mut self, dir: &Path) -> io::Result<Self> {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("template directory {} does not exist", dir.display()),
            ));
        }
        info!("Templates in {} take precedence", dir.display());
        self.override_dir = Some(dir.to_path_buf());
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<String, StepError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.yaml", name));
            match fs::read_to_string(&path) {
                Ok(body) => {
                    debug!("Using template {}", path.display());
                    return Ok(body);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StepError::Template {
                        name: name.to_string(),
                        reason: format!("failed to read {}: {}", path.display(), e),
                    });
                }
            }
        }

        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| StepError::Template {
                name: name.to_string(),
                reason: "no such template".to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
