//! Unit tests for workload generators
//!
//! Deployments, the conversion Job and the converted-data PVC.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use pgupgrade_operator::controller::Error;
use pgupgrade_operator::resources::{
    DeploymentFields, JobFields, generate_conversion_job, generate_deployment, generate_pvc,
    is_owned_by,
};

use crate::common::*;

fn pod_spec(deployment: &Deployment) -> &PodSpec {
    deployment
        .spec
        .as_ref()
        .unwrap()
        .template
        .spec
        .as_ref()
        .unwrap()
}

fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
    container
        .env
        .as_ref()?
        .iter()
        .find(|e| e.name == name)
        .and_then(|e| e.value.as_deref())
}

mod deployment_tests {
    use super::*;

    #[test]
    fn test_master_deployment() {
        let cluster = create_test_cluster("db", "default", CURRENT_TAG);
        let fields = DeploymentFields::master(&cluster, "crunchydata", MINOR_TAG, "db-pvc", "db");
        let deployment = generate_deployment(&fields).unwrap();

        assert_eq!(deployment.metadata.name, Some("db".to_string()));
        assert_eq!(deployment.metadata.namespace, Some("default".to_string()));
        assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(1));

        let spec = pod_spec(&deployment);
        let container = &spec.containers[0];
        assert_eq!(
            container.image.as_deref(),
            Some(format!("crunchydata/crunchy-postgres:{MINOR_TAG}").as_str())
        );
        assert_eq!(env_value(container, "PG_MODE"), Some("master"));
        assert_eq!(env_value(container, "PGDATA_PATH_OVERRIDE"), Some("db"));
        assert_eq!(env_value(container, "PG_MASTER_HOST"), None);

        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().unwrap().claim_name,
            "db-pvc"
        );
        assert_eq!(
            spec.security_context.as_ref().unwrap().fs_group,
            Some(26)
        );
    }

    #[test]
    fn test_replica_deployment() {
        let cluster = PgClusterBuilder::new("db", "default").with_replicas(3).build();
        let fields = DeploymentFields::replica(&cluster, "crunchydata", MINOR_TAG, "db-pvc");
        let deployment = generate_deployment(&fields).unwrap();

        assert_eq!(deployment.metadata.name, Some("db-replica".to_string()));
        assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(3));

        let labels = deployment.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get("pg-cluster"), Some(&"db".to_string()));
        assert_eq!(labels.get("replica"), Some(&"true".to_string()));

        let container = &pod_spec(&deployment).containers[0];
        assert_eq!(env_value(container, "PG_MODE"), Some("slave"));
        assert_eq!(env_value(container, "PG_MASTER_HOST"), Some("db"));
        assert_eq!(env_value(container, "PGDATA_PATH_OVERRIDE"), None);
    }

    #[test]
    fn test_recreate_strategy() {
        let cluster = create_test_cluster("db", "default", CURRENT_TAG);
        let fields = DeploymentFields::master(&cluster, "crunchydata", MINOR_TAG, "db-pvc", "db");
        let deployment = generate_deployment(&fields).unwrap();
        let strategy = deployment.spec.unwrap().strategy.unwrap();
        assert_eq!(strategy.type_.as_deref(), Some("Recreate"));
    }

    #[test]
    fn test_empty_pvc_uses_scratch_space() {
        let cluster = create_test_cluster("db", "default", CURRENT_TAG);
        let fields = DeploymentFields::master(&cluster, "crunchydata", MINOR_TAG, "", "db");
        let deployment = generate_deployment(&fields).unwrap();
        let volume = &pod_spec(&deployment).volumes.as_ref().unwrap()[0];
        assert!(volume.empty_dir.is_some());
        assert!(volume.persistent_volume_claim.is_none());
    }

    #[test]
    fn test_missing_name_rejected() {
        let cluster = create_test_cluster("db", "default", CURRENT_TAG);
        let mut fields =
            DeploymentFields::master(&cluster, "crunchydata", MINOR_TAG, "db-pvc", "db");
        fields.name = String::new();
        assert!(matches!(
            generate_deployment(&fields),
            Err(Error::MissingObjectKey(_))
        ));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let cluster = create_test_cluster("db", "default", CURRENT_TAG);
        let mut fields =
            DeploymentFields::master(&cluster, "crunchydata", MINOR_TAG, "db-pvc", "db");
        fields.port = "postgres".to_string();
        assert!(matches!(
            generate_deployment(&fields),
            Err(Error::ValidationError(_))
        ));
    }
}

mod job_tests {
    use super::*;

    #[test]
    fn test_conversion_job() {
        let upgrade = PgUpgradeBuilder::major("db", "default", MAJOR_TAG).build();
        let fields = JobFields::from_upgrade(&upgrade, "crunchydata");
        let job = generate_conversion_job(&fields, &upgrade).unwrap();

        assert_eq!(job.metadata.name, Some("db-upgrade".to_string()));
        let owner = &job.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "PgUpgrade");
        assert_eq!(owner.name, "db");
        assert_eq!(owner.uid, "test-upgrade-uid");

        let spec = job.spec.as_ref().unwrap();
        assert_eq!(spec.backoff_limit, Some(0));
        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));

        let claims: Vec<&str> = pod
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.as_str())
            .collect();
        assert_eq!(claims, vec!["db-pvc", "db-pvc-upgrade"]);

        let container = &pod.containers[0];
        assert_eq!(env_value(container, "OLD_DATABASE_NAME"), Some("db"));
        assert_eq!(env_value(container, "NEW_DATABASE_NAME"), Some("db-upgrade"));
        assert_eq!(env_value(container, "OLD_VERSION"), Some("9.6"));
        assert_eq!(env_value(container, "NEW_VERSION"), Some("10"));
    }

    #[test]
    fn test_pod_labels_select_job_pods() {
        let upgrade = PgUpgradeBuilder::major("db", "default", MAJOR_TAG).build();
        let job =
            generate_conversion_job(&JobFields::from_upgrade(&upgrade, "crunchydata"), &upgrade)
                .unwrap();
        let labels = job
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();
        assert!(selector_matches("pg-database=db,pgupgrade=true", &labels));
    }

    #[test]
    fn test_job_ownership_follows_intent_uid() {
        let upgrade = PgUpgradeBuilder::major("db", "default", MAJOR_TAG).build();
        let job =
            generate_conversion_job(&JobFields::from_upgrade(&upgrade, "crunchydata"), &upgrade)
                .unwrap();
        assert!(is_owned_by(&job, &upgrade));

        let recreated = PgUpgradeBuilder::major("db", "default", MAJOR_TAG)
            .with_uid("recreated-upgrade-uid")
            .build();
        assert!(!is_owned_by(&job, &recreated));
        assert!(!is_owned_by(&finished_job("db-upgrade", "Complete"), &upgrade));
    }
}

mod pvc_tests {
    use super::*;
    use pgupgrade_operator::crd::PgStorageSpec;

    #[test]
    fn test_pvc_from_storage_spec() {
        let storage = PgStorageSpec {
            access_mode: "ReadWriteMany".to_string(),
            size: "100M".to_string(),
            storage_class: Some("standard".to_string()),
            ..Default::default()
        };
        let pvc = generate_pvc("db-pvc-upgrade", Some("default".into()), &storage).unwrap();
        let spec = pvc.spec.unwrap();

        assert_eq!(pvc.metadata.name, Some("db-pvc-upgrade".to_string()));
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteMany".to_string()]));
        assert_eq!(spec.storage_class_name, Some("standard".to_string()));
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"].0, "100M");
    }

    #[test]
    fn test_pvc_needs_size() {
        let storage = PgStorageSpec {
            access_mode: "ReadWriteOnce".to_string(),
            ..Default::default()
        };
        assert!(generate_pvc("db-pvc-upgrade", None, &storage).is_err());
    }
}
