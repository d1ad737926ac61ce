//! Tree rendering of upgrade intents for `pgupgrade show`

use std::fmt::Write;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

use crate::crd::PgUpgrade;

/// Prefix for an inner tree entry
pub const TREE_BRANCH: &str = "\t├── ";
/// Prefix for the last tree entry
pub const TREE_TRUNK: &str = "\t└── ";

/// Render an intent and its conversion job pods
pub fn format_intent(upgrade: &PgUpgrade, pods: &[Pod]) -> String {
    let spec = &upgrade.spec;
    let mut out = String::new();

    let fields = [
        ("upgrade_status", spec.upgrade_status.as_str()),
        ("resource_type", spec.resource_type.as_str()),
        ("upgrade_type", spec.upgrade_type.as_str()),
        ("pvc_access_mode", spec.storage_spec.access_mode.as_str()),
        ("pvc_size", spec.storage_spec.size.as_str()),
        ("ccp_image_tag", spec.ccp_image_tag.as_str()),
        ("old_database_name", spec.old_database_name.as_str()),
        ("new_database_name", spec.new_database_name.as_str()),
        ("old_version", spec.old_version.as_str()),
        ("new_version", spec.new_version.as_str()),
        ("old_pvc_name", spec.old_pvc_name.as_str()),
        ("new_pvc_name", spec.new_pvc_name.as_str()),
    ];

    // Writes to a String cannot fail
    let _ = writeln!(out);
    let _ = writeln!(out, "pgupgrade : {}", spec.name);
    let last = fields.len() - 1;
    for (i, (key, value)) in fields.iter().enumerate() {
        let prefix = if i == last { TREE_TRUNK } else { TREE_BRANCH };
        let _ = writeln!(out, "{prefix}{key} : {value}");
    }

    if pods.is_empty() {
        let _ = writeln!(out, "\nno upgrade job pods for {} were found", spec.name);
    } else {
        let _ = writeln!(out, "\nupgrade job pods for {}...", spec.name);
        for pod in pods {
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .unwrap_or_default();
            let _ = writeln!(out, "{TREE_TRUNK} pod : {} ({})", pod.name_any(), phase);
        }
    }

    out
}
