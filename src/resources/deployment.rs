//! Master and replica Deployment generation
//!
//! `DeploymentFields` is the stable set of values a cluster deployment is
//! built from. Strategies fill it from the cluster record and the upgrade
//! intent, then `generate_deployment` produces the typed object.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource, PodSpec,
    PodSecurityContext, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::core::ObjectMeta;
use std::collections::BTreeMap;

use crate::controller::{Error, Result};
use crate::crd::PgCluster;
use crate::resources::common::{
    LABEL_NAME, LABEL_PG_CLUSTER, LABEL_REPLICA, REPLICA_SUFFIX, env_var, image_ref,
    security_context, standard_labels,
};

/// Database server image name
pub const POSTGRES_IMAGE: &str = "crunchy-postgres";

/// Mount path of the data volume
pub const PGDATA_MOUNT_PATH: &str = "/pgdata";

const PGDATA_VOLUME: &str = "pgdata";

/// Role a deployment plays in the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentRole {
    Master,
    Replica,
}

impl DeploymentRole {
    fn pg_mode(&self) -> &'static str {
        match self {
            DeploymentRole::Master => "master",
            DeploymentRole::Replica => "slave",
        }
    }
}

/// Values a cluster deployment is built from
#[derive(Clone, Debug, PartialEq)]
pub struct DeploymentFields {
    pub role: DeploymentRole,
    pub name: String,
    pub cluster_name: String,
    pub namespace: Option<String>,
    pub port: String,
    pub image_prefix: String,
    pub ccp_image_tag: String,
    /// PVC holding the data; an empty name falls back to pod scratch space
    pub pvc_name: String,
    pub pg_master_host: String,
    pub pg_master_user: String,
    pub pg_master_password: String,
    /// Data directory name under the data volume
    pub pgdata_path_override: Option<String>,
    pub pg_user: String,
    pub pg_password: String,
    pub pg_database: String,
    pub pg_root_password: String,
    pub replicas: i32,
    pub security_context: Option<PodSecurityContext>,
}

impl DeploymentFields {
    /// Fields for the master deployment of `cluster`
    pub fn master(
        cluster: &PgCluster,
        image_prefix: &str,
        ccp_image_tag: &str,
        pvc_name: &str,
        pgdata_path_override: &str,
    ) -> Self {
        let spec = &cluster.spec;
        Self {
            role: DeploymentRole::Master,
            name: spec.name.clone(),
            cluster_name: spec.name.clone(),
            namespace: cluster.metadata.namespace.clone(),
            port: spec.port.clone(),
            image_prefix: image_prefix.to_string(),
            ccp_image_tag: ccp_image_tag.to_string(),
            pvc_name: pvc_name.to_string(),
            pg_master_host: String::new(),
            pg_master_user: spec.pg_master_user.clone(),
            pg_master_password: spec.pg_master_password.clone(),
            pgdata_path_override: Some(pgdata_path_override.to_string()),
            pg_user: spec.pg_user.clone(),
            pg_password: spec.pg_password.clone(),
            pg_database: spec.pg_database.clone(),
            pg_root_password: spec.pg_root_password.clone(),
            replicas: 1,
            security_context: security_context(spec.fs_group, &spec.supplemental_groups),
        }
    }

    /// Fields for the replica deployment of `cluster`
    pub fn replica(
        cluster: &PgCluster,
        image_prefix: &str,
        ccp_image_tag: &str,
        pvc_name: &str,
    ) -> Self {
        let spec = &cluster.spec;
        Self {
            role: DeploymentRole::Replica,
            name: replica_deployment_name(&spec.name),
            cluster_name: spec.name.clone(),
            namespace: cluster.metadata.namespace.clone(),
            port: spec.port.clone(),
            image_prefix: image_prefix.to_string(),
            ccp_image_tag: ccp_image_tag.to_string(),
            pvc_name: pvc_name.to_string(),
            pg_master_host: spec.pg_master_host.clone(),
            pg_master_user: spec.pg_master_user.clone(),
            pg_master_password: spec.pg_master_password.clone(),
            pgdata_path_override: None,
            pg_user: spec.pg_user.clone(),
            pg_password: spec.pg_password.clone(),
            pg_database: spec.pg_database.clone(),
            pg_root_password: spec.pg_root_password.clone(),
            replicas: spec.replicas,
            security_context: security_context(spec.fs_group, &spec.supplemental_groups),
        }
    }
}

/// Name of the replica deployment for a cluster
pub fn replica_deployment_name(cluster_name: &str) -> String {
    format!("{cluster_name}{REPLICA_SUFFIX}")
}

fn deployment_labels(fields: &DeploymentFields) -> BTreeMap<String, String> {
    let mut labels = standard_labels(&fields.cluster_name);
    labels.insert(LABEL_NAME.to_string(), fields.name.clone());
    labels.insert(
        LABEL_REPLICA.to_string(),
        (fields.role == DeploymentRole::Replica).to_string(),
    );
    labels
}

/// Generate a cluster Deployment from its fields
pub fn generate_deployment(fields: &DeploymentFields) -> Result<Deployment> {
    if fields.name.is_empty() {
        return Err(Error::MissingObjectKey("metadata.name"));
    }
    if fields.ccp_image_tag.is_empty() {
        return Err(Error::ValidationError(format!(
            "deployment {} has no image tag",
            fields.name
        )));
    }
    let port: i32 = fields.port.parse().map_err(|_| {
        Error::ValidationError(format!(
            "deployment {} has invalid port '{}'",
            fields.name, fields.port
        ))
    })?;

    let labels = deployment_labels(fields);
    let match_labels = BTreeMap::from([
        (LABEL_NAME.to_string(), fields.name.clone()),
        (LABEL_PG_CLUSTER.to_string(), fields.cluster_name.clone()),
    ]);

    let mut env = vec![
        env_var("PG_MODE", fields.role.pg_mode()),
        env_var("PG_MASTER_PORT", fields.port.clone()),
        env_var("PG_MASTER_USER", fields.pg_master_user.clone()),
        env_var("PG_MASTER_PASSWORD", fields.pg_master_password.clone()),
        env_var("PG_USER", fields.pg_user.clone()),
        env_var("PG_PASSWORD", fields.pg_password.clone()),
        env_var("PG_DATABASE", fields.pg_database.clone()),
        env_var("PG_ROOT_PASSWORD", fields.pg_root_password.clone()),
        env_var("PGHOST", "/tmp"),
    ];
    if !fields.pg_master_host.is_empty() {
        env.push(env_var("PG_MASTER_HOST", fields.pg_master_host.clone()));
    }
    if let Some(ref path) = fields.pgdata_path_override {
        env.push(env_var("PGDATA_PATH_OVERRIDE", path.clone()));
    }

    let data_volume = if fields.pvc_name.is_empty() {
        Volume {
            name: PGDATA_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    } else {
        Volume {
            name: PGDATA_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: fields.pvc_name.clone(),
                read_only: Some(false),
            }),
            ..Default::default()
        }
    };

    let container = Container {
        name: "database".to_string(),
        image: Some(image_ref(
            &fields.image_prefix,
            POSTGRES_IMAGE,
            &fields.ccp_image_tag,
        )),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            container_port: port,
            name: Some("postgres".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env),
        volume_mounts: Some(vec![VolumeMount {
            name: PGDATA_VOLUME.to_string(),
            mount_path: PGDATA_MOUNT_PATH.to_string(),
            read_only: Some(false),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(fields.name.clone()),
            namespace: fields.namespace.clone(),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(fields.replicas),
            selector: LabelSelector {
                match_labels: Some(match_labels),
                ..Default::default()
            },
            // Two pods must never share the data volume
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![data_volume]),
                    security_context: fields.security_context.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
