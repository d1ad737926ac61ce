use std::sync::Arc;

use kube::Client;

use crate::client::{KubeIntentStore, KubeWorkloads};
use crate::config::UpgradeConfig;
use crate::controller::error::BackoffConfig;
use crate::health::HealthState;

/// Shared context for the upgrade controller
#[derive(Clone)]
pub struct UpgradeContext {
    /// Kubernetes client
    pub client: Client,
    /// Metrics sink; absent in integration tests
    pub health_state: Option<Arc<HealthState>>,
    /// Image prefix and default storage used when building workloads
    pub config: Arc<UpgradeConfig>,
    pub backoff: BackoffConfig,
}

impl UpgradeContext {
    pub fn new(
        client: Client,
        health_state: Option<Arc<HealthState>>,
        config: Arc<UpgradeConfig>,
    ) -> Self {
        Self {
            client,
            health_state,
            config,
            backoff: BackoffConfig::default(),
        }
    }

    /// Workload access scoped to `namespace`
    pub fn workloads(&self, namespace: &str) -> KubeWorkloads {
        KubeWorkloads::new(self.client.clone(), namespace)
    }

    /// Intent store scoped to `namespace`
    pub fn intents(&self, namespace: &str) -> KubeIntentStore {
        KubeIntentStore::new(self.client.clone(), namespace)
    }

    pub fn image_prefix(&self) -> &str {
        &self.config.cluster.ccp_image_prefix
    }
}
