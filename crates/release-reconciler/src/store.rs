// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fingerprint store.
//!
//! Records, per release, the raw payload last applied successfully. This is
//! the only memory the reconciler has of what it already did; it lives in the
//! process and starts empty on every restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// What the reconciler knows about a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Not tracked: never seen, or uninstalled since.
    Untracked,
    /// Tracked, but the applied payload is not known (install failed).
    /// Never equal to any payload, so the next tick upgrades.
    Unknown,
    /// Tracked with this raw payload applied.
    Applied(String),
}

impl Fingerprint {
    /// Whether `payload` is already applied.
    pub fn matches(&self, payload: &str) -> bool {
        matches!(self, Fingerprint::Applied(applied) if applied == payload)
    }
}

/// Storage for release fingerprints.
///
/// Only one reconcile tick touches the store at a time.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Current fingerprint for a release.
    async fn get(&self, release: &str) -> Fingerprint;

    /// Record `payload` as applied.
    async fn set(&self, release: &str, payload: &str);

    /// Track the release with an unknown applied payload.
    async fn mark_unknown(&self, release: &str);

    /// Stop tracking the release.
    async fn delete(&self, release: &str);

    /// Every tracked release name.
    async fn list(&self) -> Vec<String>;
}

/// Process-local [`FingerprintStore`].
#[derive(Debug, Default)]
pub struct InMemoryFingerprintStore {
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl InMemoryFingerprintStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    async fn get(&self, release: &str) -> Fingerprint {
        match self.entries.lock().await.get(release) {
            None => Fingerprint::Untracked,
            Some(None) => Fingerprint::Unknown,
            Some(Some(payload)) => Fingerprint::Applied(payload.clone()),
        }
    }

    async fn set(&self, release: &str, payload: &str) {
        self.entries
            .lock()
            .await
            .insert(release.to_string(), Some(payload.to_string()));
    }

    async fn mark_unknown(&self, release: &str) {
        self.entries.lock().await.insert(release.to_string(), None);
    }

    async fn delete(&self, release: &str) {
        self.entries.lock().await.remove(release);
    }

    async fn list(&self) -> Vec<String> {
        let mut releases: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        releases.sort();
        releases
    }
}
