//! PgUpgrade CRD: the durable record of a requested in-place cluster upgrade.
//!
//! One record exists per cluster while an upgrade is outstanding. After it is
//! created the only field that changes is `upgradestatus`, which moves from
//! `pending` to either `completed` or `failed`.

use std::fmt;
use std::str::FromStr;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::PgStorageSpec;

/// Resource type for cluster upgrades, the only kind in scope
pub const RESOURCE_TYPE_CLUSTER: &str = "cluster";

/// PgUpgrade describes one upgrade of one cluster and its outcome.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "crunchydata.com",
    version = "v1",
    kind = "PgUpgrade",
    plural = "pgupgrades",
    shortname = "pgu",
    namespaced,
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.upgradeType"}"#,
    printcolumn = r#"{"name":"Tag", "type":"string", "jsonPath":".spec.ccpImageTag"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".spec.upgradestatus"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PgUpgradeSpec {
    /// Name of the cluster being upgraded
    pub name: String,

    /// Kind of entity being upgraded
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    pub upgrade_type: UpgradeType,

    /// Target image tag
    pub ccp_image_tag: String,

    /// Data directory name before the upgrade
    pub old_database_name: String,

    /// Data directory name after the upgrade
    pub new_database_name: String,

    /// Informational version label of the current image (e.g., "9.5")
    #[serde(default)]
    pub old_version: String,

    /// Informational version label of the target image (e.g., "9.6")
    #[serde(default)]
    pub new_version: String,

    #[serde(rename = "oldPVCName")]
    pub old_pvc_name: String,

    /// Equal to `old_pvc_name` for minor upgrades
    #[serde(rename = "newPVCName")]
    pub new_pvc_name: String,

    #[serde(default, rename = "backupPVCName")]
    pub backup_pvc_name: String,

    /// Parameters used when a new volume has to be provisioned
    #[serde(default)]
    pub storage_spec: PgStorageSpec,

    #[serde(default, rename = "upgradestatus")]
    pub upgrade_status: UpgradeStatus,
}

fn default_resource_type() -> String {
    RESOURCE_TYPE_CLUSTER.to_string()
}

impl PgUpgradeSpec {
    /// Whether the conversion writes into a volume other than the current one
    pub fn needs_new_volume(&self) -> bool {
        self.new_pvc_name != self.old_pvc_name
    }
}

/// Upgrade strategy requested for a cluster
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeType {
    /// Recreate workloads with a newer image of the same major version
    #[default]
    Minor,
    /// Convert on-disk data with a job, then recreate workloads on the converted volume
    Major,
}

impl UpgradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeType::Minor => "minor",
            UpgradeType::Major => "major",
        }
    }
}

impl fmt::Display for UpgradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpgradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(UpgradeType::Minor),
            "major" => Ok(UpgradeType::Major),
            _ => Err(
                "upgrade-type requires either a value of major or minor, if not specified, minor is the default value"
                    .to_string(),
            ),
        }
    }
}

/// Outcome of an upgrade as recorded on the intent
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl UpgradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeStatus::Pending => "pending",
            UpgradeStatus::Completed => "completed",
            UpgradeStatus::Failed => "failed",
        }
    }

    /// Whether no further work will happen for this intent
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpgradeStatus::Pending)
    }
}

impl fmt::Display for UpgradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
