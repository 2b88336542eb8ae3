// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock release backend for testing.
//!
//! Keeps releases in memory and behaves like helm with respect to existence:
//! install fails on an existing release, upgrade and uninstall fail on a
//! missing one. Every call is recorded, and failures can be injected per
//! operation and release.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::traits::*;
use crate::payload::Values;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseCall {
    /// Operation invoked
    pub operation: ReleaseOperation,
    /// Release name
    pub release_name: String,
    /// Namespace
    pub namespace: String,
    /// Values passed to install/upgrade
    pub values: Option<Values>,
}

#[derive(Debug, Default)]
struct MockState {
    releases: HashMap<String, Values>,
    calls: Vec<ReleaseCall>,
    failing: HashSet<(ReleaseOperation, String)>,
    failing_all: HashSet<ReleaseOperation>,
    hanging: HashSet<ReleaseOperation>,
}

/// Mock release backend for testing.
#[derive(Debug, Default)]
pub struct MockReleaseBackend {
    state: Mutex<MockState>,
}

impl MockReleaseBackend {
    /// Create a mock backend with no releases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a release was installed out-of-band.
    pub async fn add_existing(&self, release: &str, values: Values) {
        self.state
            .lock()
            .await
            .releases
            .insert(release.to_string(), values);
    }

    /// Make `operation` fail for `release` until cleared.
    pub async fn fail(&self, operation: ReleaseOperation, release: &str) {
        self.state
            .lock()
            .await
            .failing
            .insert((operation, release.to_string()));
    }

    /// Make `operation` fail for every release until cleared.
    pub async fn fail_all(&self, operation: ReleaseOperation) {
        self.state.lock().await.failing_all.insert(operation);
    }

    /// Make `operation` block until its cancellation token fires.
    pub async fn hang(&self, operation: ReleaseOperation) {
        self.state.lock().await.hanging.insert(operation);
    }

    /// Remove all injected failures and hangs.
    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.failing.clear();
        state.failing_all.clear();
        state.hanging.clear();
    }

    /// All calls received so far.
    pub async fn calls(&self) -> Vec<ReleaseCall> {
        self.state.lock().await.calls.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Values of a release, if it exists.
    pub async fn release(&self, release: &str) -> Option<Values> {
        self.state.lock().await.releases.get(release).cloned()
    }

    /// Names of existing releases, sorted.
    pub async fn release_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().await.releases.keys().cloned().collect();
        names.sort();
        names
    }

    /// Record the call and decide whether it proceeds.
    async fn enter(
        &self,
        operation: ReleaseOperation,
        release_name: &str,
        namespace: &str,
        values: Option<&Values>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let hang = {
            let mut state = self.state.lock().await;
            state.calls.push(ReleaseCall {
                operation,
                release_name: release_name.to_string(),
                namespace: namespace.to_string(),
                values: values.cloned(),
            });

            if state.failing_all.contains(&operation)
                || state
                    .failing
                    .contains(&(operation, release_name.to_string()))
            {
                return Err(ReleaseError::Rejected {
                    operation,
                    release: release_name.to_string(),
                    message: "Mock failure".to_string(),
                });
            }
            state.hanging.contains(&operation)
        };

        if hang {
            cancel.cancelled().await;
        }
        if cancel.is_cancelled() {
            return Err(ReleaseError::Cancelled);
        }
        Ok(())
    }
}

fn rejected(operation: ReleaseOperation, release: &str, message: &str) -> ReleaseError {
    ReleaseError::Rejected {
        operation,
        release: release.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl ReleaseBackend for MockReleaseBackend {
    fn backend_type(&self) -> &'static str {
        "mock"
    }

    async fn install(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()> {
        let operation = ReleaseOperation::Install;
        self.enter(
            operation,
            &request.release_name,
            &request.namespace,
            Some(&request.values),
            cancel,
        )
        .await?;

        let mut state = self.state.lock().await;
        if state.releases.contains_key(&request.release_name) {
            return Err(rejected(
                operation,
                &request.release_name,
                "cannot re-use a name that is still in use",
            ));
        }
        state
            .releases
            .insert(request.release_name.clone(), request.values.clone());
        Ok(())
    }

    async fn upgrade(&self, request: &ReleaseRequest, cancel: &CancellationToken) -> Result<()> {
        let operation = ReleaseOperation::Upgrade;
        self.enter(
            operation,
            &request.release_name,
            &request.namespace,
            Some(&request.values),
            cancel,
        )
        .await?;

        let mut state = self.state.lock().await;
        match state.releases.get_mut(&request.release_name) {
            Some(values) => {
                *values = request.values.clone();
                Ok(())
            }
            None => Err(rejected(
                operation,
                &request.release_name,
                "has no deployed releases",
            )),
        }
    }

    async fn uninstall(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let operation = ReleaseOperation::Uninstall;
        self.enter(operation, release_name, namespace, None, cancel)
            .await?;

        let mut state = self.state.lock().await;
        match state.releases.remove(release_name) {
            Some(_) => Ok(()),
            None => Err(rejected(operation, release_name, "release: not found")),
        }
    }
}
