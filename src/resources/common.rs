//! Common utilities for Kubernetes resource generation
//!
//! Label keys here are shared with the workloads that cluster creation
//! produces, so selectors built from them match pre-existing objects.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, PodSecurityContext};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::PgUpgrade;

/// API version for the PgUpgrade CRD
pub const API_VERSION: &str = "crunchydata.com/v1";

/// Kind for the PgUpgrade CRD
pub const KIND: &str = "PgUpgrade";

/// Operator field manager name
pub const FIELD_MANAGER: &str = "pgupgrade-operator";

/// Suffix appended to the cluster name for the replica deployment
pub const REPLICA_SUFFIX: &str = "-replica";

/// Suffix appended to the cluster name, data directory and PVC name for upgrade artifacts
pub const UPGRADE_SUFFIX: &str = "-upgrade";

/// Label identifying every object belonging to a cluster
pub const LABEL_PG_CLUSTER: &str = "pg-cluster";

/// Label carrying the deployment name on pods
pub const LABEL_NAME: &str = "name";

/// Label marking replica pods
pub const LABEL_REPLICA: &str = "replica";

/// Label carrying the upgraded cluster name on conversion job pods
pub const LABEL_PG_DATABASE: &str = "pg-database";

/// Label marking conversion job pods
pub const LABEL_PGUPGRADE: &str = "pgupgrade";

/// Generate an owner reference for a PgUpgrade
///
/// Conversion jobs are owned by their intent so that job status changes
/// trigger reconciliation and the job is garbage collected with the intent.
pub fn owner_reference(upgrade: &PgUpgrade) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: upgrade.name_any(),
        uid: upgrade.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Generate standard labels for all resources belonging to a cluster
pub fn standard_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            cluster_name.to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "postgresql".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (LABEL_PG_CLUSTER.to_string(), cluster_name.to_string()),
    ])
}

/// Label selector matching every replica set of a cluster
pub fn cluster_selector(cluster_name: &str) -> String {
    format!("{LABEL_PG_CLUSTER}={cluster_name}")
}

/// Label selector matching the conversion job pods of an upgrade
pub fn upgrade_pod_selector(upgrade_name: &str) -> String {
    format!("{LABEL_PG_DATABASE}={upgrade_name},{LABEL_PGUPGRADE}=true")
}

/// Pod security context from a cluster's fsGroup and supplemental groups
///
/// Returns `None` when neither is set so the pod inherits the platform default.
pub fn security_context(
    fs_group: Option<i64>,
    supplemental_groups: &[i64],
) -> Option<PodSecurityContext> {
    if fs_group.is_none() && supplemental_groups.is_empty() {
        return None;
    }

    Some(PodSecurityContext {
        fs_group,
        supplemental_groups: (!supplemental_groups.is_empty())
            .then(|| supplemental_groups.to_vec()),
        ..Default::default()
    })
}

/// Plain name/value environment variable
pub fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Full container image reference
pub fn image_ref(prefix: &str, image: &str, tag: &str) -> String {
    format!("{prefix}/{image}:{tag}")
}
