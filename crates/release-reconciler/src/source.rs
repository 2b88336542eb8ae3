// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Desired-state reader.
//!
//! Every tick lists all ConfigMaps of the namespace and keeps the ones whose
//! trigger annotation reads `true` (any casing). Each kept object contributes
//! `(name, data[values_key])` to the desired state. Nothing is cached between
//! ticks, so a missed change is picked up by the next full listing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

/// Errors from listing configuration objects.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Kubernetes API call failed.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be read or resolved.
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// The parts of a ConfigMap the reconciler looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigObject {
    /// Object name, used verbatim as the release name
    pub name: String,
    /// Object annotations
    pub annotations: BTreeMap<String, String>,
    /// Object data fields
    pub data: BTreeMap<String, String>,
}

impl ConfigObject {
    /// Create an object without annotations or data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add a data field.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

impl From<ConfigMap> for ConfigObject {
    fn from(cm: ConfigMap) -> Self {
        Self {
            name: cm.metadata.name.unwrap_or_default(),
            annotations: cm.metadata.annotations.unwrap_or_default(),
            data: cm.data.unwrap_or_default(),
        }
    }
}

/// Lists the configuration objects of a namespace.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Source type identifier (e.g., "kubernetes", "static")
    fn source_type(&self) -> &'static str;

    /// Return every configuration object currently in `namespace`.
    async fn list(&self, namespace: &str) -> Result<Vec<ConfigObject>>;
}

/// [`ConfigSource`] backed by the Kubernetes ConfigMap API.
#[derive(Clone)]
pub struct KubeConfigSource {
    client: Client,
}

impl KubeConfigSource {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an explicit kubeconfig, or infer one
    /// (`KUBECONFIG`, `~/.kube/config`, in-cluster service account).
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ConfigSource for KubeConfigSource {
    fn source_type(&self) -> &'static str {
        "kubernetes"
    }

    async fn list(&self, namespace: &str) -> Result<Vec<ConfigObject>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        debug!(namespace, count = list.items.len(), "Listed ConfigMaps");
        Ok(list.items.into_iter().map(ConfigObject::from).collect())
    }
}

/// Which annotation marks an object and which data key holds its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Trigger marker annotation key
    pub trigger_annotation: String,
    /// Data key carrying the raw payload
    pub values_key: String,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            trigger_annotation: crate::config::DEFAULT_TRIGGER_ANNOTATION.to_string(),
            values_key: crate::config::DEFAULT_VALUES_KEY.to_string(),
        }
    }
}

impl Selector {
    /// Whether the object carries a true trigger marker.
    pub fn is_triggered(&self, object: &ConfigObject) -> bool {
        object
            .annotations
            .get(&self.trigger_annotation)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Build the desired set from one listing.
    ///
    /// A triggered object without the payload key contributes an empty payload.
    pub fn desired_from<I>(&self, objects: I) -> DesiredSet
    where
        I: IntoIterator<Item = ConfigObject>,
    {
        let mut releases = BTreeMap::new();
        for mut object in objects {
            if !self.is_triggered(&object) {
                continue;
            }
            let payload = object.data.remove(&self.values_key).unwrap_or_default();
            releases.insert(object.name, payload);
        }
        DesiredSet { releases }
    }
}

/// Release name to raw payload, as observed in a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSet {
    releases: BTreeMap<String, String>,
}

impl DesiredSet {
    /// Raw payload for a release, if it is desired.
    pub fn get(&self, release: &str) -> Option<&str> {
        self.releases.get(release).map(String::as_str)
    }

    /// Whether the release is desired.
    pub fn contains(&self, release: &str) -> bool {
        self.releases.contains_key(release)
    }

    /// Number of desired releases.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// Whether nothing is desired.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Iterate over `(release, payload)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.releases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DesiredSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            releases: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reads the desired set of one namespace.
pub struct DesiredStateReader {
    source: Arc<dyn ConfigSource>,
    namespace: String,
    selector: Selector,
}

impl DesiredStateReader {
    /// Create a reader over `source` for `namespace`.
    pub fn new(source: Arc<dyn ConfigSource>, namespace: impl Into<String>, selector: Selector) -> Self {
        Self {
            source,
            namespace: namespace.into(),
            selector,
        }
    }

    /// Namespace being read.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// List the namespace and extract the desired set.
    pub async fn read(&self) -> Result<DesiredSet> {
        let objects = self.source.list(&self.namespace).await?;
        Ok(self.selector.desired_from(objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered(name: &str, marker: &str, values: &str) -> ConfigObject {
        ConfigObject::new(name)
            .with_annotation("trigger-install", marker)
            .with_data("values.yaml", values)
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let selector = Selector::default();
        assert!(selector.is_triggered(&triggered("a", "true", "")));
        assert!(selector.is_triggered(&triggered("a", "TRUE", "")));
        assert!(selector.is_triggered(&triggered("a", "True", "")));
        assert!(!selector.is_triggered(&triggered("a", "false", "")));
        assert!(!selector.is_triggered(&triggered("a", "yes", "")));
        assert!(!selector.is_triggered(&triggered("a", " true", "")));
        assert!(!selector.is_triggered(&ConfigObject::new("a")));
    }

    #[test]
    fn test_desired_from_filters_untriggered() {
        let selector = Selector::default();
        let desired = selector.desired_from(vec![
            triggered("web", "true", "replicas: 1"),
            triggered("db", "false", "replicas: 3"),
            ConfigObject::new("kube-root-ca.crt").with_data("ca.crt", "---"),
        ]);

        assert_eq!(desired.len(), 1);
        assert_eq!(desired.get("web"), Some("replicas: 1"));
        assert!(!desired.contains("db"));
    }

    #[test]
    fn test_missing_values_key_is_empty_payload() {
        let selector = Selector::default();
        let desired = selector.desired_from(vec![
            ConfigObject::new("bare").with_annotation("trigger-install", "true"),
        ]);
        assert_eq!(desired.get("bare"), Some(""));
    }

    #[test]
    fn test_custom_selector() {
        let selector = Selector {
            trigger_annotation: "example.com/release".to_string(),
            values_key: "values".to_string(),
        };
        let desired = selector.desired_from(vec![
            ConfigObject::new("api")
                .with_annotation("example.com/release", "true")
                .with_data("values", "image: api:2"),
            triggered("web", "true", "replicas: 1"),
        ]);
        assert_eq!(desired.len(), 1);
        assert_eq!(desired.get("api"), Some("image: api:2"));
    }

    #[test]
    fn test_from_config_map() {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some("web".to_string());
        cm.metadata.annotations = Some(BTreeMap::from([(
            "trigger-install".to_string(),
            "true".to_string(),
        )]));
        cm.data = Some(BTreeMap::from([(
            "values.yaml".to_string(),
            "replicas: 2".to_string(),
        )]));

        let object = ConfigObject::from(cm);
        assert_eq!(object.name, "web");
        assert!(Selector::default().is_triggered(&object));
        assert_eq!(object.data.get("values.yaml").map(String::as_str), Some("replicas: 2"));
    }
}
