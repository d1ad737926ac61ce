//! Major upgrade: convert on-disk data with a job, then bring the cluster
//! back on the converted volume.
//!
//! The upgrade runs in two phases. `submit_major_upgrade` tears the cluster
//! down and starts the conversion job; the controller watches the job and
//! calls `finalize_major_upgrade` once it succeeds.

use kube::ResourceExt;
use tracing::{info, instrument};

use crate::client::WorkloadClient;
use crate::controller::Result;
use crate::controller::shutdown::shutdown_cluster;
use crate::crd::{PgCluster, PgUpgrade};
use crate::resources::{
    DeploymentFields, JobFields, generate_conversion_job, generate_deployment, generate_pvc,
};

/// Result of a finalize call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Deployments were recreated on the converted volume
    Finalized,
    /// The intent is no longer pending; nothing was touched
    AlreadyFinalized,
}

/// Phase 1: shut the cluster down, provision the target volume and start the conversion job
///
/// Returns as soon as the job is created. The intent's status is not changed.
#[instrument(skip_all, fields(cluster = %cluster.spec.name, tag = %upgrade.spec.ccp_image_tag))]
pub async fn submit_major_upgrade<W: WorkloadClient>(
    workloads: &W,
    cluster: &PgCluster,
    upgrade: &PgUpgrade,
    image_prefix: &str,
) -> Result<()> {
    let namespace = upgrade.namespace();
    info!(
        "major cluster upgrade in namespace {}",
        namespace.clone().unwrap_or_default()
    );

    shutdown_cluster(workloads, &cluster.spec.name).await;

    let spec = &upgrade.spec;
    if spec.needs_new_volume() {
        if workloads.pvc_exists(&spec.new_pvc_name).await? {
            info!(
                "pvc {} already exists, will not create",
                spec.new_pvc_name
            );
        } else {
            info!("creating pvc {}", spec.new_pvc_name);
            let pvc = generate_pvc(&spec.new_pvc_name, namespace, &spec.storage_spec)?;
            workloads.create_pvc(&pvc).await?;
            info!("created PVC {}", spec.new_pvc_name);
        }
    }

    let job = generate_conversion_job(&JobFields::from_upgrade(upgrade, image_prefix), upgrade)?;
    let created = workloads.create_job(&job).await?;
    info!("created Job {}", created.name_any());

    Ok(())
}

/// Phase 2: recreate the deployments after a successful conversion
///
/// The master runs on the new volume with the new data directory; the replica
/// keeps the cluster's original volume. No shutdown is performed and the
/// intent's status is not changed.
#[instrument(skip_all, fields(cluster = %cluster.spec.name))]
pub async fn finalize_major_upgrade<W: WorkloadClient>(
    workloads: &W,
    cluster: &PgCluster,
    upgrade: &PgUpgrade,
    image_prefix: &str,
) -> Result<FinalizeOutcome> {
    if upgrade.spec.upgrade_status.is_terminal() {
        info!(
            status = %upgrade.spec.upgrade_status,
            "upgrade {} already finalized", upgrade.spec.name
        );
        return Ok(FinalizeOutcome::AlreadyFinalized);
    }

    info!(
        "major cluster upgrade finalize in namespace {}",
        upgrade.namespace().unwrap_or_default()
    );

    let spec = &upgrade.spec;
    let master = generate_deployment(&DeploymentFields::master(
        cluster,
        image_prefix,
        &spec.ccp_image_tag,
        &spec.new_pvc_name,
        &spec.new_database_name,
    ))?;
    let created = workloads.create_deployment(&master).await?;
    info!("created master Deployment {}", created.name_any());

    let replica = generate_deployment(&DeploymentFields::replica(
        cluster,
        image_prefix,
        &spec.ccp_image_tag,
        &cluster.spec.primary_storage.name,
    ))?;
    let created = workloads.create_deployment(&replica).await?;
    info!("created replica Deployment {}", created.name_any());

    Ok(FinalizeOutcome::Finalized)
}
