//! Platform calls on a cluster's compute and storage objects
//!
//! Every call is a single unit of work against the API server; nothing is
//! cached between calls.

use std::time::Duration;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::controller::{Error, Result};
use crate::resources::FIELD_MANAGER;

/// Workload operations used by the upgrade strategies, scoped to one namespace.
pub trait WorkloadClient {
    /// Delete a deployment by name.
    fn delete_deployment(&self, name: &str)
    -> impl std::future::Future<Output = Result<()>> + Send;

    /// Wait until a deployment no longer exists, failing with
    /// `Error::Timeout` after `timeout`.
    fn wait_for_deployment_deleted(
        &self,
        name: &str,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Names of the replica sets matching a label selector.
    fn list_replica_sets(
        &self,
        selector: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Delete a replica set by name.
    fn delete_replica_set(&self, name: &str)
    -> impl std::future::Future<Output = Result<()>> + Send;

    /// Create a deployment.
    fn create_deployment(
        &self,
        deployment: &Deployment,
    ) -> impl std::future::Future<Output = Result<Deployment>> + Send;

    /// Whether a PVC with this name exists.
    fn pvc_exists(&self, name: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Create a PVC.
    fn create_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> impl std::future::Future<Output = Result<PersistentVolumeClaim>> + Send;

    /// Create a job.
    fn create_job(&self, job: &Job) -> impl std::future::Future<Output = Result<Job>> + Send;

    /// Fetch a job by name.
    fn get_job(&self, name: &str) -> impl std::future::Future<Output = Result<Option<Job>>> + Send;

    /// Pods matching a label selector.
    fn list_pods(
        &self,
        selector: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Pod>>> + Send;
}

/// `WorkloadClient` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeWorkloads {
    client: Client,
    namespace: String,
}

impl KubeWorkloads {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

impl WorkloadClient for KubeWorkloads {
    async fn delete_deployment(&self, name: &str) -> Result<()> {
        self.api::<Deployment>()
            .delete(name, &DeleteParams::default())
            .await?;
        info!(
            "deleted Deployment {} in namespace {}",
            name, self.namespace
        );
        Ok(())
    }

    async fn wait_for_deployment_deleted(&self, name: &str, timeout: Duration) -> Result<()> {
        let api = self.api::<Deployment>();
        let Some(existing) = api.get_opt(name).await? else {
            debug!("Deployment {} already gone", name);
            return Ok(());
        };
        let uid = existing.uid().unwrap_or_default();

        tokio::time::timeout(
            timeout,
            await_condition(api, name, conditions::is_deleted(&uid)),
        )
        .await
        .map_err(|_| Error::Timeout(format!("deletion of Deployment {name}")))??;
        Ok(())
    }

    async fn list_replica_sets(&self, selector: &str) -> Result<Vec<String>> {
        let params = ListParams::default().labels(selector);
        let sets = self.api::<ReplicaSet>().list(&params).await?;
        Ok(sets.items.iter().map(|rs| rs.name_any()).collect())
    }

    async fn delete_replica_set(&self, name: &str) -> Result<()> {
        self.api::<ReplicaSet>()
            .delete(name, &DeleteParams::default())
            .await?;
        info!(
            "deleted ReplicaSet {} in namespace {}",
            name, self.namespace
        );
        Ok(())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        Ok(self
            .api::<Deployment>()
            .create(&Self::post_params(), deployment)
            .await?)
    }

    async fn pvc_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .api::<PersistentVolumeClaim>()
            .get_opt(name)
            .await?
            .is_some())
    }

    async fn create_pvc(&self, pvc: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim> {
        Ok(self
            .api::<PersistentVolumeClaim>()
            .create(&Self::post_params(), pvc)
            .await?)
    }

    async fn create_job(&self, job: &Job) -> Result<Job> {
        Ok(self.api::<Job>().create(&Self::post_params(), job).await?)
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>> {
        Ok(self.api::<Job>().get_opt(name).await?)
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(selector);
        Ok(self.api::<Pod>().list(&params).await?.items)
    }
}
