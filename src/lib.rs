pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod postgres;
pub mod report;
pub mod resources;

pub use config::UpgradeConfig;
pub use controller::{
    BackoffConfig, Error, Result, UpgradeContext, reconcile_upgrade, upgrade_error_policy,
};
pub use crd::{PgCluster, PgUpgrade};
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Run the upgrade controller (cluster-wide).
///
/// If health_state is provided, metrics will be recorded for reconciliations.
pub async fn run_upgrade_controller(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    config: Arc<UpgradeConfig>,
) {
    run_upgrade_controller_scoped(client, health_state, config, None).await
}

/// Run the upgrade controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
///
/// Use the scoped version for integration tests to enable parallel test execution.
pub async fn run_upgrade_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    config: Arc<UpgradeConfig>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for PgUpgrade resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(UpgradeContext::new(client.clone(), health_state, config));

    let upgrades: Api<PgUpgrade> = scoped_api(client.clone(), namespace);
    let jobs: Api<Job> = scoped_api(client.clone(), namespace);

    let watcher_config = WatcherConfig::default().any_semantic();

    // Conversion jobs are owned by their intent, so a finished job
    // triggers the reconcile that finalizes the upgrade
    Controller::new(upgrades, watcher_config.clone())
        .owns(jobs, watcher_config)
        .run(reconcile_upgrade, upgrade_error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled upgrade: {}", obj.name);
                }
                Err(e) => {
                    // ObjectNotFound/NotFound errors are expected after an intent is
                    // deleted while its job is still being cleaned up
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!("Upgrade object no longer exists: {:?}", e);
                    } else {
                        tracing::error!("Upgrade reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("Upgrade controller stream ended unexpectedly");
}
