//! Ordered teardown of a cluster's compute workloads
//!
//! Used by both upgrade strategies. Every step is best-effort: failures are
//! logged and the sequence moves on, so running it against a cluster that is
//! already down completes normally.

use std::time::Duration;

use tracing::{error, info, instrument};

use crate::client::WorkloadClient;
use crate::resources::{cluster_selector, replica_deployment_name};

/// How long to wait for each deployment to disappear
pub const DELETE_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which teardown steps succeeded
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub replica_deleted: bool,
    pub replica_gone: bool,
    pub master_deleted: bool,
    pub master_gone: bool,
    /// Replica set removed by the sweep, if one was found and deleted
    pub replica_set_deleted: Option<String>,
}

impl ShutdownReport {
    /// Whether both deployments are confirmed absent
    pub fn is_clean(&self) -> bool {
        self.replica_gone && self.master_gone
    }
}

/// Delete the replica and master deployments and the cluster's replica set
#[instrument(skip(workloads))]
pub async fn shutdown_cluster<W: WorkloadClient>(
    workloads: &W,
    cluster_name: &str,
) -> ShutdownReport {
    shutdown_cluster_with_timeout(workloads, cluster_name, DELETE_WAIT_TIMEOUT).await
}

/// `shutdown_cluster` with an explicit per-deployment wait
pub async fn shutdown_cluster_with_timeout<W: WorkloadClient>(
    workloads: &W,
    cluster_name: &str,
    wait_timeout: Duration,
) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    let replica_name = replica_deployment_name(cluster_name);

    match workloads.delete_deployment(&replica_name).await {
        Ok(()) => report.replica_deleted = true,
        Err(e) => error!("error deleting replica Deployment {}: {}", replica_name, e),
    }
    match workloads
        .wait_for_deployment_deleted(&replica_name, wait_timeout)
        .await
    {
        Ok(()) => report.replica_gone = true,
        Err(e) => error!(
            "error waiting for replica Deployment {} deletion: {}",
            replica_name, e
        ),
    }

    match workloads.delete_deployment(cluster_name).await {
        Ok(()) => report.master_deleted = true,
        Err(e) => error!("error deleting master Deployment {}: {}", cluster_name, e),
    }
    match workloads
        .wait_for_deployment_deleted(cluster_name, wait_timeout)
        .await
    {
        Ok(()) => report.master_gone = true,
        Err(e) => error!(
            "error waiting for master Deployment {} deletion: {}",
            cluster_name, e
        ),
    }

    match workloads
        .list_replica_sets(&cluster_selector(cluster_name))
        .await
    {
        Ok(sets) => {
            if let Some(first) = sets.first() {
                match workloads.delete_replica_set(first).await {
                    Ok(()) => report.replica_set_deleted = Some(first.clone()),
                    Err(e) => error!("error deleting cluster replicaset {}: {}", first, e),
                }
            }
        }
        Err(e) => error!("error getting cluster replicaset name: {}", e),
    }

    info!(
        clean = report.is_clean(),
        "shutdown of cluster {} finished", cluster_name
    );
    report
}
