// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release Reconciler
//!
//! Keeps one Helm release per ConfigMap annotated with `trigger-install: "true"`
//! in sync with the ConfigMap's `values.yaml`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use release_reconciler::config::Config;
use release_reconciler::reconciler::{Reconciler, ReconcilerConfig};
use release_reconciler::release::{HelmBackend, HelmConfig, ReleaseBackend};
use release_reconciler::source::{DesiredStateReader, KubeConfigSource, Selector};
use release_reconciler::store::InMemoryFingerprintStore;

#[derive(Debug, Parser)]
#[command(name = "release-reconciler", version, about)]
struct Args {
    /// Absolute path to the kubeconfig file
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Chart directory to install releases from
    #[arg(long, env = "CHART_PATH")]
    chart: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "release_reconciler=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let args = Args::parse();

    // Load configuration, flags win over the environment
    let mut config = Config::from_env()?;
    if let Some(kubeconfig) = args.kubeconfig {
        config.kubeconfig = Some(kubeconfig);
    }
    if let Some(chart) = args.chart {
        config.chart_path = chart;
    }

    info!(
        namespace = %config.namespace,
        chart = %config.chart_path.display(),
        helm_driver = config.helm_driver.as_deref().unwrap_or("default"),
        "Starting Release Reconciler"
    );

    let source = Arc::new(KubeConfigSource::connect(config.kubeconfig.as_deref()).await?);
    info!("Connected to Kubernetes");

    let backend = Arc::new(HelmBackend::new(HelmConfig::from_config(&config))?);
    info!(backend_type = backend.backend_type(), "Release backend initialized");

    let reader = DesiredStateReader::new(
        source,
        config.namespace.clone(),
        Selector {
            trigger_annotation: config.trigger_annotation.clone(),
            values_key: config.values_key.clone(),
        },
    );
    let reconciler = Reconciler::new(
        reader,
        backend,
        Arc::new(InMemoryFingerprintStore::new()),
        ReconcilerConfig::from_config(&config),
    );

    let shutdown = reconciler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.notify_one();
        }
    });

    reconciler.run().await?;

    info!("Release Reconciler shut down");

    Ok(())
}
