//! Conversion Job generation for major upgrades
//!
//! The job mounts the old and the new data volumes and converts the old data
//! directory into the new one. Its pods carry `pg-database=<name>` and
//! `pgupgrade=true` so they can be listed per upgrade.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::controller::{Error, Result};
use crate::crd::PgUpgrade;
use crate::resources::common::{
    LABEL_PG_DATABASE, LABEL_PGUPGRADE, UPGRADE_SUFFIX, env_var, image_ref, owner_reference,
    standard_labels,
};

/// Conversion image name
pub const UPGRADE_IMAGE: &str = "crunchy-upgrade";

const OLD_DATA_VOLUME: &str = "pgolddata";
const NEW_DATA_VOLUME: &str = "pgnewdata";

/// Values a conversion job is built from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobFields {
    /// Upgrade name, equal to the cluster name
    pub name: String,
    pub namespace: Option<String>,
    pub old_pvc_name: String,
    pub new_pvc_name: String,
    pub image_prefix: String,
    pub ccp_image_tag: String,
    pub old_database_name: String,
    pub new_database_name: String,
    pub old_version: String,
    pub new_version: String,
}

impl JobFields {
    /// Fields for the conversion job of an upgrade intent
    pub fn from_upgrade(upgrade: &PgUpgrade, image_prefix: &str) -> Self {
        let spec = &upgrade.spec;
        Self {
            name: spec.name.clone(),
            namespace: upgrade.namespace(),
            old_pvc_name: spec.old_pvc_name.clone(),
            new_pvc_name: spec.new_pvc_name.clone(),
            image_prefix: image_prefix.to_string(),
            ccp_image_tag: spec.ccp_image_tag.clone(),
            old_database_name: spec.old_database_name.clone(),
            new_database_name: spec.new_database_name.clone(),
            old_version: spec.old_version.clone(),
            new_version: spec.new_version.clone(),
        }
    }
}

/// Name of the conversion job for an upgrade
pub fn conversion_job_name(upgrade_name: &str) -> String {
    format!("{upgrade_name}{UPGRADE_SUFFIX}")
}

/// Whether `job` was created for this intent rather than an earlier one of the same name
pub fn is_owned_by(job: &Job, upgrade: &PgUpgrade) -> bool {
    let Some(uid) = upgrade.metadata.uid.as_deref().filter(|u| !u.is_empty()) else {
        return false;
    };
    job.owner_references()
        .iter()
        .any(|owner| owner.controller == Some(true) && owner.uid == uid)
}

fn job_labels(upgrade_name: &str) -> BTreeMap<String, String> {
    let mut labels = standard_labels(upgrade_name);
    labels.insert(LABEL_PG_DATABASE.to_string(), upgrade_name.to_string());
    labels.insert(LABEL_PGUPGRADE.to_string(), "true".to_string());
    labels
}

fn claim_volume(name: &str, claim_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.to_string(),
            read_only: Some(false),
        }),
        ..Default::default()
    }
}

/// Generate the conversion Job, owned by `upgrade`
pub fn generate_conversion_job(fields: &JobFields, upgrade: &PgUpgrade) -> Result<Job> {
    if fields.name.is_empty() {
        return Err(Error::MissingObjectKey("metadata.name"));
    }
    if fields.old_pvc_name.is_empty() || fields.new_pvc_name.is_empty() {
        return Err(Error::ValidationError(format!(
            "conversion job for {} needs both an old and a new PVC",
            fields.name
        )));
    }
    if fields.ccp_image_tag.is_empty() {
        return Err(Error::ValidationError(format!(
            "conversion job for {} has no image tag",
            fields.name
        )));
    }

    let labels = job_labels(&fields.name);

    let container = Container {
        name: "upgrade".to_string(),
        image: Some(image_ref(
            &fields.image_prefix,
            UPGRADE_IMAGE,
            &fields.ccp_image_tag,
        )),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(vec![
            env_var("OLD_DATABASE_NAME", fields.old_database_name.clone()),
            env_var("NEW_DATABASE_NAME", fields.new_database_name.clone()),
            env_var("OLD_VERSION", fields.old_version.clone()),
            env_var("NEW_VERSION", fields.new_version.clone()),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: OLD_DATA_VOLUME.to_string(),
                mount_path: format!("/{OLD_DATA_VOLUME}"),
                ..Default::default()
            },
            VolumeMount {
                name: NEW_DATA_VOLUME.to_string(),
                mount_path: format!("/{NEW_DATA_VOLUME}"),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(conversion_job_name(&fields.name)),
            namespace: fields.namespace.clone(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner_reference(upgrade)]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            // A failed conversion leaves the old data untouched; do not retry it blindly
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![
                        claim_volume(OLD_DATA_VOLUME, &fields.old_pvc_name),
                        claim_volume(NEW_DATA_VOLUME, &fields.new_pvc_name),
                    ]),
                    restart_policy: Some("Never".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Terminal state of a conversion job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Running,
    Succeeded,
    Failed,
}

/// Read the terminal state from the job's conditions, falling back to pod counts
pub fn job_outcome(job: &Job) -> JobOutcome {
    let Some(status) = job.status.as_ref() else {
        return JobOutcome::Running;
    };

    if let Some(conditions) = status.conditions.as_ref() {
        for condition in conditions.iter().filter(|c| c.status == "True") {
            match condition.type_.as_str() {
                "Complete" => return JobOutcome::Succeeded,
                "Failed" => return JobOutcome::Failed,
                _ => {}
            }
        }
    }

    if status.succeeded.unwrap_or(0) > 0 {
        JobOutcome::Succeeded
    } else if status.failed.unwrap_or(0) > 0 {
        JobOutcome::Failed
    } else {
        JobOutcome::Running
    }
}
