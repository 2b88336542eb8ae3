// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test fixtures: an in-memory ConfigMap source and a reconciler harness.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use release_reconciler::reconciler::{Reconciler, ReconcilerConfig};
use release_reconciler::release::MockReleaseBackend;
use release_reconciler::source::{
    ConfigObject, ConfigSource, DesiredStateReader, Selector, SourceError,
};
use release_reconciler::store::InMemoryFingerprintStore;

pub const NAMESPACE: &str = "apps";

/// ConfigMap source whose contents tests replace between ticks.
#[derive(Default)]
pub struct StaticConfigSource {
    objects: Mutex<Vec<ConfigObject>>,
    unavailable: AtomicBool,
    lists: AtomicUsize,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_objects(&self, objects: Vec<ConfigObject>) {
        *self.objects.lock().unwrap() = objects;
    }

    /// Replace the namespace with one triggered ConfigMap per `(name, values)`.
    pub fn set_desired(&self, releases: &[(&str, &str)]) {
        self.set_objects(releases.iter().map(|(n, v)| triggered(n, v)).collect());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    fn source_type(&self) -> &'static str {
        "static"
    }

    async fn list(&self, namespace: &str) -> Result<Vec<ConfigObject>, SourceError> {
        assert_eq!(namespace, NAMESPACE);
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Other("connection refused".to_string()));
        }
        Ok(self.objects.lock().unwrap().clone())
    }
}

/// A triggered ConfigMap carrying `values`.
pub fn triggered(name: &str, values: &str) -> ConfigObject {
    ConfigObject::new(name)
        .with_annotation("trigger-install", "true")
        .with_data("values.yaml", values)
}

pub struct Harness {
    pub source: Arc<StaticConfigSource>,
    pub backend: Arc<MockReleaseBackend>,
    pub store: Arc<InMemoryFingerprintStore>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig {
            namespace: NAMESPACE.to_string(),
            interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let source = Arc::new(StaticConfigSource::new());
        let backend = Arc::new(MockReleaseBackend::new());
        let store = Arc::new(InMemoryFingerprintStore::new());
        let reader = DesiredStateReader::new(source.clone(), NAMESPACE, Selector::default());
        let reconciler = Reconciler::new(reader, backend.clone(), store.clone(), config);
        Self {
            source,
            backend,
            store,
            reconciler,
        }
    }

    /// Start over with an empty store, as after a controller restart.
    pub fn restart(&mut self) {
        self.store = Arc::new(InMemoryFingerprintStore::new());
        let reader = DesiredStateReader::new(self.source.clone(), NAMESPACE, Selector::default());
        self.reconciler = Reconciler::new(
            reader,
            self.backend.clone(),
            self.store.clone(),
            ReconcilerConfig {
                namespace: NAMESPACE.to_string(),
                interval: Duration::from_secs(10),
                operation_timeout: Duration::from_secs(5),
            },
        );
    }
}
