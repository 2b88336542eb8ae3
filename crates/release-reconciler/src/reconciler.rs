// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The reconcile loop.
//!
//! Each tick takes one snapshot of the desired set and walks it twice:
//!
//! 1. For every desired release, compare the raw payload with the stored
//!    fingerprint and install (untracked), upgrade (unknown or different) or
//!    leave it alone (same payload).
//! 2. For every tracked release missing from the snapshot, uninstall.
//!
//! Failures never abort a tick. The store is left in a state that makes the
//! next tick retry: a failed install is tracked as [`Fingerprint::Unknown`] so
//! it turns into an upgrade, a failed upgrade keeps its old fingerprint, and a
//! failed uninstall keeps the entry. Only a failure to read the desired state
//! stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::payload::{self, Values};
use crate::release::{ReleaseBackend, ReleaseError, ReleaseOperation, ReleaseRequest};
use crate::source::{DesiredSet, DesiredStateReader};
use crate::store::{Fingerprint, FingerprintStore};

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Namespace releases are installed into.
    pub namespace: String,
    /// Delay between two ticks.
    pub interval: Duration,
    /// Deadline for each backend call; expiry counts as a failed call.
    pub operation_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            namespace: crate::config::DEFAULT_NAMESPACE.to_string(),
            interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(300),
        }
    }
}

impl ReconcilerConfig {
    /// Take the loop settings from the process configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            interval: config.reconcile_interval,
            operation_timeout: config.operation_timeout,
        }
    }
}

/// What a desired release needs this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Never seen: install.
    Install,
    /// Tracked with a different or unknown payload: upgrade.
    Upgrade,
    /// Payload already applied.
    Converged,
}

/// Decide what to do with a desired release given its fingerprint.
pub fn decide(fingerprint: &Fingerprint, payload: &str) -> Decision {
    match fingerprint {
        Fingerprint::Untracked => Decision::Install,
        current if current.matches(payload) => Decision::Converged,
        _ => Decision::Upgrade,
    }
}

/// Outcome counters for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Releases in the desired set.
    pub desired: usize,
    /// Successful installs.
    pub installed: usize,
    /// Successful upgrades.
    pub upgraded: usize,
    /// Successful uninstalls.
    pub uninstalled: usize,
    /// Releases already converged.
    pub unchanged: usize,
    /// Releases skipped because their payload did not parse.
    pub invalid: usize,
    /// Failed backend calls.
    pub failed: usize,
}

impl TickReport {
    /// Whether the tick neither changed nor attempted anything.
    pub fn is_noop(&self) -> bool {
        self.installed == 0
            && self.upgraded == 0
            && self.uninstalled == 0
            && self.invalid == 0
            && self.failed == 0
    }
}

/// Polling controller driving releases toward the desired set.
pub struct Reconciler {
    reader: DesiredStateReader,
    backend: Arc<dyn ReleaseBackend>,
    store: Arc<dyn FingerprintStore>,
    config: ReconcilerConfig,
    shutdown: Arc<Notify>,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        reader: DesiredStateReader,
        backend: Arc<dyn ReleaseBackend>,
        store: Arc<dyn FingerprintStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            reader,
            backend,
            store,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the reconcile loop.
    ///
    /// Reconciles immediately, then once per interval. Returns `Ok` when the
    /// shutdown signal is received between ticks, and an error as soon as the
    /// desired state cannot be read.
    pub async fn run(&self) -> crate::error::Result<()> {
        info!(
            namespace = %self.config.namespace,
            source_namespace = %self.reader.namespace(),
            backend = self.backend.backend_type(),
            interval_secs = self.config.interval.as_secs(),
            operation_timeout_secs = self.config.operation_timeout.as_secs(),
            "Reconciler started"
        );

        loop {
            if let Err(e) = self.tick().await {
                error!(error = %e, "Failed to read desired state, stopping reconciler");
                return Err(e);
            }

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Reconciler received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("Reconciler stopped");
        Ok(())
    }

    /// Run a single reconcile tick.
    pub async fn tick(&self) -> crate::error::Result<TickReport> {
        let desired = self.reader.read().await?;
        let mut report = TickReport {
            desired: desired.len(),
            ..Default::default()
        };

        for (release, payload) in desired.iter() {
            self.reconcile_desired(release, payload, &mut report).await;
        }
        self.remove_undesired(&desired, &mut report).await;

        if report.is_noop() {
            debug!(desired = report.desired, "Reconcile tick completed, nothing to do");
        } else {
            info!(
                desired = report.desired,
                installed = report.installed,
                upgraded = report.upgraded,
                uninstalled = report.uninstalled,
                unchanged = report.unchanged,
                invalid = report.invalid,
                failed = report.failed,
                "Reconcile tick completed"
            );
        }
        Ok(report)
    }

    async fn reconcile_desired(&self, release: &str, payload: &str, report: &mut TickReport) {
        let fingerprint = self.store.get(release).await;
        let decision = decide(&fingerprint, payload);
        if decision == Decision::Converged {
            debug!(release, "Release already converged");
            report.unchanged += 1;
            return;
        }

        let values = match payload::parse_values(payload) {
            Ok(values) => values,
            Err(e) => {
                warn!(release, error = %e, "Skipping release with unparseable values");
                debug!(release, payload, "Rejected values payload");
                report.invalid += 1;
                return;
            }
        };
        let digest = payload::digest(payload);

        match decision {
            Decision::Install => {
                info!(release, values_digest = %digest, "Installing untracked release");
                match self.call(ReleaseOperation::Install, release, Some(values)).await {
                    Ok(()) => {
                        self.store.set(release, payload).await;
                        info!(release, values_digest = %digest, "Release installed");
                        report.installed += 1;
                    }
                    Err(e) => {
                        // Most likely the release already exists; upgrade next tick.
                        self.store.mark_unknown(release).await;
                        warn!(release, error = %e, "Install failed, will try upgrade instead");
                        report.failed += 1;
                    }
                }
            }
            Decision::Upgrade => {
                info!(
                    release,
                    values_digest = %digest,
                    previous_unknown = fingerprint == Fingerprint::Unknown,
                    "Upgrading release with changed values"
                );
                match self.call(ReleaseOperation::Upgrade, release, Some(values)).await {
                    Ok(()) => {
                        self.store.set(release, payload).await;
                        info!(release, values_digest = %digest, "Release upgraded");
                        report.upgraded += 1;
                    }
                    Err(e) => {
                        warn!(release, error = %e, "Upgrade failed, will retry next tick");
                        report.failed += 1;
                    }
                }
            }
            Decision::Converged => {}
        }
    }

    async fn remove_undesired(&self, desired: &DesiredSet, report: &mut TickReport) {
        for release in self.store.list().await {
            if desired.contains(&release) {
                continue;
            }

            info!(release = %release, "Release no longer desired, uninstalling");
            match self.call(ReleaseOperation::Uninstall, &release, None).await {
                Ok(()) => {
                    self.store.delete(&release).await;
                    info!(release = %release, "Release uninstalled");
                    report.uninstalled += 1;
                }
                Err(e) => {
                    warn!(release = %release, error = %e, "Uninstall failed, will retry next tick");
                    report.failed += 1;
                }
            }
        }
    }

    /// Invoke one backend operation under the per-call deadline.
    async fn call(
        &self,
        operation: ReleaseOperation,
        release: &str,
        values: Option<Values>,
    ) -> Result<(), ReleaseError> {
        let cancel = CancellationToken::new();
        let namespace = self.config.namespace.as_str();

        let pending = async {
            match (operation, values) {
                (ReleaseOperation::Uninstall, _) => {
                    self.backend.uninstall(release, namespace, &cancel).await
                }
                (operation, values) => {
                    let request = ReleaseRequest {
                        release_name: release.to_string(),
                        namespace: namespace.to_string(),
                        values: values.unwrap_or_default(),
                    };
                    if operation == ReleaseOperation::Install {
                        self.backend.install(&request, &cancel).await
                    } else {
                        self.backend.upgrade(&request, &cancel).await
                    }
                }
            }
        };

        match tokio::time::timeout(self.config.operation_timeout, pending).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ReleaseError::Timeout(self.config.operation_timeout))
            }
        }
    }
}
