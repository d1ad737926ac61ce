//! Read access to cluster records

use kube::api::ListParams;
use kube::{Api, Client};

use crate::controller::Result;
use crate::crd::PgCluster;

/// Read-only view of the cluster records in one namespace.
pub trait ClusterSource {
    /// Fetch a cluster record by name.
    fn get(&self, name: &str)
    -> impl std::future::Future<Output = Result<Option<PgCluster>>> + Send;

    /// List cluster records matching a label selector.
    fn list(
        &self,
        selector: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PgCluster>>> + Send;
}

/// `ClusterSource` backed by the `PgCluster` custom resource
#[derive(Clone)]
pub struct KubeClusters {
    api: Api<PgCluster>,
}

impl KubeClusters {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

impl ClusterSource for KubeClusters {
    async fn get(&self, name: &str) -> Result<Option<PgCluster>> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn list(&self, selector: &str) -> Result<Vec<PgCluster>> {
        let params = ListParams::default().labels(selector);
        Ok(self.api.list(&params).await?.items)
    }
}
