//! Minor upgrade: recreate the cluster's deployments with a newer image
//!
//! Data stays on the existing volume. The intent is marked `completed` once
//! both deployments are created.

use kube::ResourceExt;
use tracing::{info, instrument};

use crate::client::{IntentStore, WorkloadClient};
use crate::controller::Result;
use crate::controller::shutdown::shutdown_cluster;
use crate::crd::{PgCluster, PgUpgrade, UpgradeStatus};
use crate::resources::{DeploymentFields, generate_deployment};

/// Run a minor upgrade of `cluster` to the image tag recorded on `upgrade`
///
/// A build or create failure aborts immediately and leaves the intent's
/// status untouched.
#[instrument(skip_all, fields(cluster = %cluster.spec.name, tag = %upgrade.spec.ccp_image_tag))]
pub async fn run_minor_upgrade<W, S>(
    workloads: &W,
    intents: &S,
    cluster: &PgCluster,
    upgrade: &PgUpgrade,
    image_prefix: &str,
) -> Result<()>
where
    W: WorkloadClient,
    S: IntentStore,
{
    info!(
        "minor cluster upgrade in namespace {}",
        cluster.namespace().unwrap_or_default()
    );

    shutdown_cluster(workloads, &cluster.spec.name).await;

    let pvc_name = &cluster.spec.primary_storage.name;
    let tag = &upgrade.spec.ccp_image_tag;

    let master = generate_deployment(&DeploymentFields::master(
        cluster,
        image_prefix,
        tag,
        pvc_name,
        &cluster.spec.name,
    ))?;
    let created = workloads.create_deployment(&master).await?;
    info!("created master Deployment {}", created.name_any());

    let replica = generate_deployment(&DeploymentFields::replica(
        cluster,
        image_prefix,
        tag,
        pvc_name,
    ))?;
    let created = workloads.create_deployment(&replica).await?;
    info!("created replica Deployment {}", created.name_any());

    intents
        .patch_status(&upgrade.spec.name, UpgradeStatus::Completed)
        .await?;
    Ok(())
}
