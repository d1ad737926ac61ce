//! PersistentVolumeClaim generation for converted data

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::core::ObjectMeta;

use crate::controller::{Error, Result};
use crate::crd::PgStorageSpec;
use crate::resources::common::FIELD_MANAGER;

/// Generate a PVC named `name` with the given storage parameters
pub fn generate_pvc(
    name: &str,
    namespace: Option<String>,
    storage: &PgStorageSpec,
) -> Result<PersistentVolumeClaim> {
    if name.is_empty() {
        return Err(Error::MissingObjectKey("metadata.name"));
    }
    if storage.size.is_empty() || storage.access_mode.is_empty() {
        return Err(Error::ValidationError(format!(
            "pvc {name} needs an access mode and a size"
        )));
    }

    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace,
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                FIELD_MANAGER.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![storage.access_mode.clone()]),
            storage_class_name: storage.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}
