// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release Reconciler - ConfigMap-driven Helm releases
//!
//! A level-triggered controller that keeps one Helm release per annotated
//! ConfigMap. It polls instead of watching: every tick lists the namespace,
//! diffs the result against what it applied before, and installs, upgrades
//! or uninstalls releases until both sides agree.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐  list   ┌─────────────────────┐
//!   │  Kubernetes  │◄────────│ DesiredStateReader  │
//!   │  ConfigMaps  │         └──────────┬──────────┘
//!   └──────────────┘                    │ DesiredSet
//!                                       ▼
//!   ┌──────────────────┐  get/set ┌────────────┐  install/upgrade/uninstall ┌────────────────┐
//!   │ FingerprintStore │◄────────►│ Reconciler │───────────────────────────►│ ReleaseBackend │
//!   └──────────────────┘          └────────────┘                            └────────────────┘
//! ```
//!
//! # Fingerprint States
//!
//! | State | Meaning | Next tick with payload P |
//! |-------|---------|--------------------------|
//! | `Untracked` | never seen, or uninstalled | install P |
//! | `Unknown` | install failed, release may exist | upgrade to P |
//! | `Applied(Q)` | Q applied successfully | nothing if P == Q, else upgrade |
//!
//! A tracked release missing from the desired set is uninstalled; the entry
//! is dropped only once the uninstall succeeds.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NAMESPACE` | `default` | Namespace to watch and install into |
//! | `HELM_DRIVER` | - | Helm storage driver |
//! | `CHART_PATH` | `../testchart` | Chart directory |
//! | `KUBECONFIG` | `~/.kube/config` if present | Cluster credentials |
//! | `TRIGGER_ANNOTATION` | `trigger-install` | Trigger marker annotation |
//! | `VALUES_KEY` | `values.yaml` | Data key holding the values |
//! | `RECONCILE_INTERVAL_SECS` | `10` | Tick interval |
//! | `OPERATION_TIMEOUT_SECS` | `300` | Deadline per helm call |
//! | `HELM_BIN` | `helm` | Helm executable |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`payload`]: Values parsing
//! - [`reconciler`]: The reconcile loop
//! - [`release`]: Release backends (helm, mock)
//! - [`source`]: Desired-state reader
//! - [`store`]: Fingerprint store

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for the reconciler.
pub mod error;

/// Values payload parsing.
pub mod payload;

/// The reconcile loop.
pub mod reconciler;

/// Release backends (helm CLI, mock).
pub mod release;

/// Desired-state reader over Kubernetes ConfigMaps.
pub mod source;

/// In-memory record of applied payloads.
pub mod store;

pub use config::Config;
pub use error::Error;
pub use reconciler::{Reconciler, ReconcilerConfig, TickReport};
