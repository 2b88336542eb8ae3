// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Helm CLI release backend.
//!
//! Drives releases by running `helm install|upgrade|uninstall` against one
//! chart directory. Values are passed as JSON on stdin (`--values -`), which
//! helm reads as YAML. The storage driver is forwarded through `HELM_DRIVER`.
//! Child processes are killed when the call is cancelled or dropped.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::*;

/// Configuration for the helm backend.
#[derive(Debug, Clone)]
pub struct HelmConfig {
    /// Helm executable
    pub helm_bin: String,
    /// Chart directory every release is installed from
    pub chart_path: PathBuf,
    /// Storage driver exported as `HELM_DRIVER`
    pub driver: Option<String>,
    /// Kubeconfig passed with `--kubeconfig`
    pub kubeconfig: Option<PathBuf>,
}

impl HelmConfig {
    /// Build the backend settings from the reconciler configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            helm_bin: config.helm_bin.clone(),
            chart_path: config.chart_path.clone(),
            driver: config.helm_driver.clone(),
            kubeconfig: config.kubeconfig.clone(),
        }
    }
}

/// Release backend that shells out to the helm CLI.
#[derive(Debug, Clone)]
pub struct HelmBackend {
    config: HelmConfig,
}

impl HelmBackend {
    /// Create a helm backend, checking the chart directory up front.
    pub fn new(config: HelmConfig) -> Result<Self> {
        let manifest = config.chart_path.join("Chart.yaml");
        if !manifest.is_file() {
            return Err(ReleaseError::ChartNotFound(
                config.chart_path.display().to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Arguments for one helm invocation.
    fn args(&self, operation: ReleaseOperation, release: &str, namespace: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![operation.as_str().into(), release.into()];
        if operation != ReleaseOperation::Uninstall {
            args.push(self.config.chart_path.clone().into_os_string());
        }
        args.push("--namespace".into());
        args.push(namespace.into());
        if operation != ReleaseOperation::Uninstall {
            args.push("--values".into());
            args.push("-".into());
        }
        if let Some(kubeconfig) = &self.config.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(kubeconfig.clone().into_os_string());
        }
        args
    }

    async fn run(
        &self,
        operation: ReleaseOperation,
        release: &str,
        namespace: &str,
        stdin: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.config.helm_bin);
        cmd.args(self.args(operation, release, namespace));
        if let Some(driver) = &self.config.driver {
            cmd.env("HELM_DRIVER", driver);
        }
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(%operation, release, namespace, "Running helm");
        let mut child = cmd.spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // helm may exit before reading stdin; its exit status tells what happened
            if let Err(e) = pipe.write_all(&input).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(ReleaseError::Io(e));
            }
        }

        let output = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ReleaseError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        if output.status.success() {
            debug!(
                %operation,
                release,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                "Helm finished"
            );
            Ok(())
        } else {
            Err(ReleaseError::CommandFailed {
                operation,
                release: release.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ReleaseBackend for HelmBackend {
    fn backend_type(&self) -> &'static str {
        "helm"
    }

    async fn install(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()> {
        let values = serde_json::to_vec(&request.values)?;
        self.run(
            ReleaseOperation::Install,
            &request.release_name,
            &request.namespace,
            Some(values),
            cancel,
        )
        .await
    }

    async fn upgrade(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()> {
        let values = serde_json::to_vec(&request.values)?;
        self.run(
            ReleaseOperation::Upgrade,
            &request.release_name,
            &request.namespace,
            Some(values),
            cancel,
        )
        .await
    }

    async fn uninstall(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run(
            ReleaseOperation::Uninstall,
            release_name,
            namespace,
            None,
            cancel,
        )
        .await
    }
}
