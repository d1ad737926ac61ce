use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage type that keeps data in the pod's scratch space
pub const STORAGE_TYPE_EMPTYDIR: &str = "emptydir";

/// PgCluster is the record of a managed PostgreSQL cluster.
///
/// The upgrade path only reads it; cluster creation and reconfiguration are
/// handled elsewhere.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "crunchydata.com",
    version = "v1",
    kind = "PgCluster",
    plural = "pgclusters",
    namespaced,
    printcolumn = r#"{"name":"Tag", "type":"string", "jsonPath":".spec.ccpImageTag"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PgClusterSpec {
    /// Cluster name, also the name of the master deployment
    pub name: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: String,

    /// Image tag the cluster currently runs (e.g., "centos7-9.6.5-1.6.0")
    pub ccp_image_tag: String,

    /// Primary storage; its name is the PVC holding the master's data
    pub primary_storage: PgStorageSpec,

    /// PVC used for backups
    #[serde(default, rename = "backupPVCName")]
    pub backup_pvc_name: String,

    /// Service name replicas use to reach the master
    #[serde(default)]
    pub pg_master_host: String,

    #[serde(default)]
    pub pg_master_user: String,

    #[serde(default)]
    pub pg_master_password: String,

    #[serde(default)]
    pub pg_user: String,

    #[serde(default)]
    pub pg_password: String,

    #[serde(default)]
    pub pg_database: String,

    #[serde(default)]
    pub pg_root_password: String,

    /// Number of replica pods
    #[serde(default)]
    pub replicas: i32,

    /// Pod fsGroup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,

    /// Pod supplementalGroups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplemental_groups: Vec<i64>,
}

fn default_port() -> String {
    "5432".to_string()
}

/// Storage parameters for a data volume
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PgStorageSpec {
    /// PVC name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Access mode (e.g., "ReadWriteOnce", "ReadWriteMany")
    #[serde(default)]
    pub access_mode: String,

    /// Size of the volume (e.g., "1Gi", "100M")
    #[serde(default)]
    pub size: String,

    /// How the volume is provisioned ("create", "existing", "emptydir")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_type: String,

    /// Storage class name (uses default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl PgStorageSpec {
    /// Whether the data lives in pod scratch space rather than a volume
    pub fn is_emptydir(&self) -> bool {
        self.storage_type == STORAGE_TYPE_EMPTYDIR
    }
}
