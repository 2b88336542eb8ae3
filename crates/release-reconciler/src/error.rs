// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for release-reconciler.

use thiserror::Error;

/// Reconciler errors.
///
/// Only errors that stop the control loop surface here. Per-release failures
/// (bad payloads, failed helm calls) are logged and retried on the next tick.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Listing configuration objects failed.
    #[error("Desired state unavailable: {0}")]
    Source(#[from] crate::source::SourceError),
}

/// Result type using the reconciler Error.
pub type Result<T> = std::result::Result<T, Error>;
