//! Controller configuration and manifest loading from YAML

use crate::core::{
    meta::ObjectReference,
    resource::Object,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provisioner used when neither a step nor its Sequence names one
pub fn default_provisioner() -> ObjectReference {
    ObjectReference::new(
        crate::core::meta::API_VERSION,
        "ClusterChannelProvisioner",
        "in-memory-channel",
    )
}

fn default_finalizer_name() -> String {
    "sequence-controller".to_string()
}

/// Top-level controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Finalizer token this controller adds to every provisioned Sequence
    #[serde(default = "default_finalizer_name")]
    pub finalizer_name: String,

    /// Cluster-wide fallback provisioner for step channels
    #[serde(default = "default_provisioner")]
    pub default_provisioner: ObjectReference,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            finalizer_name: default_finalizer_name(),
            default_provisioner: default_provisioner(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ControllerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.finalizer_name.trim().is_empty() {
            anyhow::bail!("finalizerName must not be empty");
        }
        if self.default_provisioner.name.is_empty() {
            anyhow::bail!("defaultProvisioner.name must not be empty");
        }
        Ok(())
    }
}

/// Parse every object in a (possibly multi-document) YAML manifest
pub fn load_manifests(yaml: &str) -> Result<Vec<Object>> {
    let mut objects = Vec::new();
    for (i, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("Invalid YAML in document {}", i + 1))?;
        if value.is_null() {
            continue;
        }
        let object: Object = serde_yaml::from_value(value)
            .with_context(|| format!("Invalid object in document {}", i + 1))?;
        if let Object::Sequence(sequence) = &object {
            sequence
                .validate()
                .with_context(|| format!("Invalid Sequence in document {}", i + 1))?;
        }
        objects.push(object);
    }
    Ok(objects)
}

/// Load a manifest file
pub fn load_manifest_file<P: AsRef<Path>>(path: P) -> Result<Vec<Object>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    load_manifests(&content)
}
