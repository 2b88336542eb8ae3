// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for release-reconciler.

use std::path::PathBuf;
use std::time::Duration;

/// Namespace used when `NAMESPACE` is not set.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Annotation that opts a ConfigMap into reconciliation.
pub const DEFAULT_TRIGGER_ANNOTATION: &str = "trigger-install";
/// ConfigMap data key holding the release values.
pub const DEFAULT_VALUES_KEY: &str = "values.yaml";

/// Reconciler configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace whose ConfigMaps are watched and where releases are installed
    pub namespace: String,
    /// Helm storage driver (`secret`, `configmap`, `memory`, ...), helm's default when unset
    pub helm_driver: Option<String>,
    /// Directory of the chart every release is installed from
    pub chart_path: PathBuf,
    /// Explicit kubeconfig path; the client falls back to in-cluster config when unset
    pub kubeconfig: Option<PathBuf>,
    /// Annotation key acting as the trigger marker
    pub trigger_annotation: String,
    /// ConfigMap data key carrying the raw values payload
    pub values_key: String,
    /// Delay between two reconcile ticks
    pub reconcile_interval: Duration,
    /// Deadline for a single install/upgrade/uninstall call
    pub operation_timeout: Duration,
    /// Helm executable
    pub helm_bin: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let namespace = non_empty("NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let chart_path = PathBuf::from(
            non_empty("CHART_PATH").unwrap_or_else(|| "../testchart".to_string()),
        );

        let kubeconfig = non_empty("KUBECONFIG").map(PathBuf::from).or_else(|| {
            non_empty("HOME")
                .map(|home| PathBuf::from(home).join(".kube").join("config"))
                .filter(|path| path.exists())
        });

        let reconcile_interval = Duration::from_secs(parse_secs(
            "RECONCILE_INTERVAL_SECS",
            non_empty("RECONCILE_INTERVAL_SECS"),
            10,
        )?);
        let operation_timeout = Duration::from_secs(parse_secs(
            "OPERATION_TIMEOUT_SECS",
            non_empty("OPERATION_TIMEOUT_SECS"),
            300,
        )?);

        Ok(Self {
            namespace,
            helm_driver: non_empty("HELM_DRIVER"),
            chart_path,
            kubeconfig,
            trigger_annotation: non_empty("TRIGGER_ANNOTATION")
                .unwrap_or_else(|| DEFAULT_TRIGGER_ANNOTATION.to_string()),
            values_key: non_empty("VALUES_KEY").unwrap_or_else(|| DEFAULT_VALUES_KEY.to_string()),
            reconcile_interval,
            operation_timeout,
            helm_bin: non_empty("HELM_BIN").unwrap_or_else(|| "helm".to_string()),
        })
    }
}

fn parse_secs(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidValue { key, value }),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}
