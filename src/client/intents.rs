//! Durable storage of upgrade intents
//!
//! An intent is created once, then only its `upgradestatus` field changes
//! until it is explicitly deleted.

use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::controller::{Error, Result};
use crate::crd::{PgUpgrade, UpgradeStatus};
use crate::resources::FIELD_MANAGER;

/// Storage for upgrade intents within one namespace.
pub trait IntentStore {
    /// Persist a new intent. Fails with `Error::IntentExists` if one already
    /// exists under the same name.
    fn create(
        &self,
        upgrade: &PgUpgrade,
    ) -> impl std::future::Future<Output = Result<PgUpgrade>> + Send;

    /// Fetch an intent by name.
    fn get(&self, name: &str)
    -> impl std::future::Future<Output = Result<Option<PgUpgrade>>> + Send;

    /// List every intent in the namespace.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<PgUpgrade>>> + Send;

    /// Remove an intent record. Returns `false` when it did not exist.
    fn delete(&self, name: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Update only the `upgradestatus` field of an intent.
    fn patch_status(
        &self,
        name: &str,
        status: UpgradeStatus,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Merge patch body touching nothing but the status field
pub fn status_patch(status: UpgradeStatus) -> serde_json::Value {
    json!({ "spec": { "upgradestatus": status } })
}

/// `IntentStore` backed by the `PgUpgrade` custom resource
#[derive(Clone)]
pub struct KubeIntentStore {
    api: Api<PgUpgrade>,
}

impl KubeIntentStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

impl IntentStore for KubeIntentStore {
    #[instrument(skip(self, upgrade), fields(name = %upgrade.name_any()))]
    async fn create(&self, upgrade: &PgUpgrade) -> Result<PgUpgrade> {
        let name = upgrade.name_any();
        if self.api.get_opt(&name).await?.is_some() {
            return Err(Error::IntentExists(name));
        }

        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match self.api.create(&params, upgrade).await {
            Ok(created) => {
                info!("created pgupgrade {}", name);
                Ok(created)
            }
            Err(kube::Error::Api(resp)) if resp.code == 409 => Err(Error::IntentExists(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str) -> Result<Option<PgUpgrade>> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn list(&self) -> Result<Vec<PgUpgrade>> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<bool> {
        match self.api.delete(name, &DeleteParams::background()).await {
            Ok(_) => {
                info!("deleted pgupgrade {}", name);
                Ok(true)
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!("pgupgrade {} not found", name);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn patch_status(&self, name: &str, status: UpgradeStatus) -> Result<()> {
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api
            .patch(name, &params, &Patch::Merge(status_patch(status)))
            .await?;
        info!(status = %status, "patched pgupgrade {} status", name);
        Ok(())
    }
}
