//! Intent store and CLI request flows against a live API server

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::PostParams;
use kube::{Api, Client};
use pgupgrade_operator::client::{IntentStore, KubeClusters, KubeIntentStore, KubeWorkloads};
use pgupgrade_operator::config::UpgradeConfig;
use pgupgrade_operator::controller::{
    CreateOutcome, DeleteOutcome, Error, TargetQuery, UpgradeRequest, create_intents,
    delete_intents, resolve_targets, show_intents, validate_upgrade_request,
};
use pgupgrade_operator::crd::{PgCluster, UpgradeStatus, UpgradeType};
use pgupgrade_operator::run_upgrade_controller_scoped;

use crate::common::{CURRENT_TAG, MAJOR_TAG, MINOR_TAG, PgClusterBuilder};
use crate::{TestNamespace, install_crds};

async fn setup(prefix: &str) -> (Client, TestNamespace) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,kube=warn")
        .with_test_writer()
        .try_init();

    let client = Client::try_default()
        .await
        .expect("kubeconfig should point at a test cluster");
    install_crds(client.clone())
        .await
        .expect("CRDs should install");
    let ns = TestNamespace::create(client.clone(), prefix)
        .await
        .expect("namespace should be created");
    (client, ns)
}

async fn seed_cluster(client: Client, namespace: &str, name: &str) -> PgCluster {
    let cluster = PgClusterBuilder::new(name, namespace)
        .with_tag(CURRENT_TAG)
        .with_label("project", "it")
        .build();
    let api: Api<PgCluster> = Api::namespaced(client, namespace);
    api.create(&PostParams::default(), &cluster)
        .await
        .expect("cluster record should be created")
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_intent_lifecycle() {
    let (client, ns) = setup("pgupgrade-intent").await;
    let cluster = seed_cluster(client.clone(), &ns.name, "db").await;
    let store = KubeIntentStore::new(client.clone(), &ns.name);

    let request = UpgradeRequest::new("db", UpgradeType::Minor, Some(MINOR_TAG.to_string()));
    let draft = validate_upgrade_request(&request, &UpgradeConfig::default(), &cluster).unwrap();

    let created = store.create(&draft).await.unwrap();
    assert_eq!(created.spec.upgrade_status, UpgradeStatus::Pending);
    assert_eq!(created.spec.ccp_image_tag, MINOR_TAG);

    let err = store.create(&draft).await.unwrap_err();
    assert!(matches!(err, Error::IntentExists(ref name) if name == "db"));

    store
        .patch_status("db", UpgradeStatus::Completed)
        .await
        .unwrap();
    let stored = store.get("db").await.unwrap().unwrap();
    assert_eq!(stored.spec.upgrade_status, UpgradeStatus::Completed);
    assert_eq!(stored.spec.ccp_image_tag, MINOR_TAG);

    assert!(store.delete("db").await.unwrap());
    assert!(!store.delete("db").await.unwrap());
    assert!(store.get("db").await.unwrap().is_none());

    ns.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_create_show_delete_by_selector() {
    let (client, ns) = setup("pgupgrade-cli").await;
    seed_cluster(client.clone(), &ns.name, "alpha").await;
    seed_cluster(client.clone(), &ns.name, "beta").await;

    let clusters = KubeClusters::new(client.clone(), &ns.name);
    let store = KubeIntentStore::new(client.clone(), &ns.name);
    let workloads = KubeWorkloads::new(client.clone(), &ns.name);

    let matched = resolve_targets(
        &clusters,
        &store,
        TargetQuery::Clusters {
            names: &[],
            selector: Some("project=it"),
        },
    )
    .await
    .unwrap();
    assert_eq!(matched, names(&["alpha", "beta"]));

    let outcomes = create_intents(
        &clusters,
        &store,
        &UpgradeConfig::default(),
        &matched,
        UpgradeType::Major,
        Some(MAJOR_TAG.to_string()),
    )
    .await
    .unwrap();
    assert_eq!(
        outcomes,
        vec![
            CreateOutcome::Created("alpha".to_string()),
            CreateOutcome::Created("beta".to_string()),
        ]
    );

    let (found, missing) = show_intents(&store, &workloads, &names(&["all"]))
        .await
        .unwrap();
    assert!(missing.is_empty());
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|view| view.pods.is_empty()));

    let deleted = delete_intents(&store, &names(&["all"])).await.unwrap();
    assert_eq!(
        deleted,
        vec![
            DeleteOutcome::Deleted("alpha".to_string()),
            DeleteOutcome::Deleted("beta".to_string()),
        ]
    );
    assert!(store.list().await.unwrap().is_empty());

    ns.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_controller_completes_minor_upgrade() {
    let (client, ns) = setup("pgupgrade-minor").await;
    let cluster = seed_cluster(client.clone(), &ns.name, "db").await;
    let store = KubeIntentStore::new(client.clone(), &ns.name);

    let request = UpgradeRequest::new("db", UpgradeType::Minor, Some(MINOR_TAG.to_string()));
    let draft = validate_upgrade_request(&request, &UpgradeConfig::default(), &cluster).unwrap();
    store.create(&draft).await.unwrap();

    let operator_client = client.clone();
    let namespace = ns.name.clone();
    let operator = tokio::spawn(async move {
        run_upgrade_controller_scoped(
            operator_client,
            None,
            Arc::new(UpgradeConfig::default()),
            Some(&namespace),
        )
        .await
    });

    let mut status = UpgradeStatus::Pending;
    for _ in 0..120 {
        status = store.get("db").await.unwrap().unwrap().spec.upgrade_status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    operator.abort();
    assert_eq!(status, UpgradeStatus::Completed);

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &ns.name);
    for name in ["db", "db-replica"] {
        let deployment = deployments.get(name).await.unwrap();
        let image = deployment.spec.unwrap().template.spec.unwrap().containers[0]
            .image
            .clone()
            .unwrap();
        assert!(image.ends_with(MINOR_TAG), "{name} runs {image}");
    }

    ns.cleanup().await.unwrap();
}
