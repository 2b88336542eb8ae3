// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release backend trait definitions.
//!
//! Defines the abstract interface for release backends.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::payload::Values;

/// The three operations a backend performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseOperation {
    /// Create a new release.
    Install,
    /// Apply new values to an existing release.
    Upgrade,
    /// Remove a release.
    Uninstall,
}

impl ReleaseOperation {
    /// Lowercase name, matching the helm subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseOperation::Install => "install",
            ReleaseOperation::Upgrade => "upgrade",
            ReleaseOperation::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for ReleaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from release operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// Chart directory is missing or has no `Chart.yaml`.
    #[error("Chart not found: {0}")]
    ChartNotFound(String),

    /// Operation did not finish before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Backend rejected the operation.
    #[error("{operation} of {release} failed: {message}")]
    Rejected {
        /// Operation that failed.
        operation: ReleaseOperation,
        /// Release name.
        release: String,
        /// Backend message.
        message: String,
    },

    /// Backend command exited unsuccessfully.
    #[error("{operation} of {release} exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        /// Operation that failed.
        operation: ReleaseOperation,
        /// Release name.
        release: String,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Standard error output.
        stderr: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Target of an install or upgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    /// Release name
    pub release_name: String,
    /// Namespace the release lives in
    pub namespace: String,
    /// Parsed values for the chart
    pub values: Values,
}

/// Trait for release backends.
///
/// Every backend deploys one fixed chart, loaded when the backend is built.
/// Operations take a cancellation token; a cancelled operation should stop
/// promptly and return [`ReleaseError::Cancelled`]. Backends keep no record of
/// what the reconciler has applied.
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    /// Backend type identifier (e.g., "helm", "mock")
    fn backend_type(&self) -> &'static str;

    /// Install a new release. Fails if a release with that name already exists.
    async fn install(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()>;

    /// Upgrade an existing release to new values.
    async fn upgrade(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()>;

    /// Uninstall a release. Fails if no such release exists.
    async fn uninstall(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
