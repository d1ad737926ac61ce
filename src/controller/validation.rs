//! Validation of upgrade requests against a cluster's current state
//!
//! `validate_upgrade_request` is pure: it consults only its arguments and
//! returns either a fully populated intent draft or the reason the request
//! cannot proceed. The checks run in this order:
//! - Storage eligibility (`emptydir` clusters cannot be upgraded)
//! - Requested tag differs from the running tag
//! - Version direction (major must move forward, minor must not cross a major version)

use kube::core::ObjectMeta;
use tracing::debug;

use crate::config::UpgradeConfig;
use crate::controller::error::{Error, Result};
use crate::crd::{
    PgCluster, PgUpgrade, PgUpgradeSpec, RESOURCE_TYPE_CLUSTER, UpgradeStatus, UpgradeType,
};
use crate::postgres::ImageTag;
use crate::resources::common::UPGRADE_SUFFIX;

/// An operator's request to upgrade one cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub cluster_name: String,
    pub upgrade_type: UpgradeType,
    /// Explicit target tag; the configured default is used when absent
    pub image_tag: Option<String>,
}

impl UpgradeRequest {
    pub fn new(cluster_name: &str, upgrade_type: UpgradeType, image_tag: Option<String>) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            upgrade_type,
            image_tag: image_tag.filter(|t| !t.is_empty()),
        }
    }

    /// Target tag after applying the configured default
    pub fn target_tag<'a>(&'a self, config: &'a UpgradeConfig) -> &'a str {
        self.image_tag
            .as_deref()
            .unwrap_or_else(|| config.default_image_tag())
    }
}

/// Validate an upgrade request and build the intent to persist
pub fn validate_upgrade_request(
    request: &UpgradeRequest,
    config: &UpgradeConfig,
    cluster: &PgCluster,
) -> Result<PgUpgrade> {
    let name = &request.cluster_name;
    let current_tag = cluster.spec.ccp_image_tag.as_str();
    let requested_tag = request.target_tag(config);

    validate_storage(name, cluster)?;

    if requested_tag.is_empty() {
        return Err(Error::ValidationError(format!(
            "no image tag given for {name} and no default CCPImageTag configured"
        )));
    }
    if requested_tag == current_tag {
        return Err(Error::ValidationError(format!(
            "can't upgrade {name} to the same image version {requested_tag}"
        )));
    }

    let current = ImageTag::parse(current_tag)?;
    let requested = ImageTag::parse(requested_tag)?;
    validate_version_direction(request.upgrade_type, &current, &requested)?;

    Ok(build_intent(request, config, cluster, requested_tag, &current, &requested))
}

fn validate_storage(name: &str, cluster: &PgCluster) -> Result<()> {
    if cluster.spec.primary_storage.is_emptydir() {
        return Err(Error::IneligibleStorage(name.to_string()));
    }
    Ok(())
}

/// Check that the requested version moves in the direction the upgrade type allows
pub fn validate_version_direction(
    upgrade_type: UpgradeType,
    current: &ImageTag,
    requested: &ImageTag,
) -> Result<()> {
    let existing_major = current.numeric_version()?;
    let requested_major = requested.numeric_version()?;
    debug!(
        existing_major,
        requested_major,
        upgrade_type = %upgrade_type,
        "comparing major versions"
    );

    match upgrade_type {
        UpgradeType::Major if requested_major == existing_major => Err(Error::ValidationError(
            "requested upgrade major version can not equal existing upgrade major version"
                .to_string(),
        )),
        UpgradeType::Major if requested_major < existing_major => Err(Error::ValidationError(
            "requested upgrade major version can not be older than existing upgrade major version"
                .to_string(),
        )),
        UpgradeType::Minor if requested_major > existing_major => Err(Error::ValidationError(
            "requested minor upgrade to major version is not allowed".to_string(),
        )),
        _ => Ok(()),
    }
}

fn build_intent(
    request: &UpgradeRequest,
    config: &UpgradeConfig,
    cluster: &PgCluster,
    requested_tag: &str,
    current: &ImageTag,
    requested: &ImageTag,
) -> PgUpgrade {
    let name = request.cluster_name.clone();
    let old_pvc_name = cluster.spec.primary_storage.name.clone();
    let new_pvc_name = match request.upgrade_type {
        UpgradeType::Major => format!("{old_pvc_name}{UPGRADE_SUFFIX}"),
        UpgradeType::Minor => old_pvc_name.clone(),
    };

    PgUpgrade {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: cluster.metadata.namespace.clone(),
            ..Default::default()
        },
        spec: PgUpgradeSpec {
            name: name.clone(),
            resource_type: RESOURCE_TYPE_CLUSTER.to_string(),
            upgrade_type: request.upgrade_type,
            ccp_image_tag: requested_tag.to_string(),
            old_database_name: name.clone(),
            new_database_name: format!("{name}{UPGRADE_SUFFIX}"),
            old_version: current.version_label(),
            new_version: requested.version_label(),
            old_pvc_name,
            new_pvc_name,
            backup_pvc_name: cluster.spec.backup_pvc_name.clone(),
            storage_spec: config.storage_spec(),
            upgrade_status: UpgradeStatus::Pending,
        },
    }
}
