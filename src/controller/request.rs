//! Request handling behind the `pgupgrade` CLI
//!
//! Resolves command arguments to clusters or intents and applies
//! create/delete/show against the intent store. Per-target failures are
//! reported as outcomes so one bad cluster does not stop the rest; a fatal
//! version error aborts the whole request.

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, warn};

use crate::client::{ClusterSource, IntentStore, WorkloadClient};
use crate::config::UpgradeConfig;
use crate::controller::error::{Error, Result};
use crate::controller::validation::{UpgradeRequest, validate_upgrade_request};
use crate::crd::{PgUpgrade, UpgradeType};
use crate::resources::upgrade_pod_selector;

/// Argument that expands to every intent in the namespace
pub const ALL_KEYWORD: &str = "all";

/// How command arguments map to targets
#[derive(Clone, Copy, Debug)]
pub enum TargetQuery<'a> {
    /// Cluster names, replaced by every cluster matching `selector` when one is given
    Clusters {
        names: &'a [String],
        selector: Option<&'a str>,
    },
    /// Intent names; `all` expands to every intent
    Intents { names: &'a [String] },
}

/// Resolve command arguments to a list of names
///
/// A selector that matches no clusters leaves the explicit names in place.
pub async fn resolve_targets<C, S>(
    clusters: &C,
    intents: &S,
    query: TargetQuery<'_>,
) -> Result<Vec<String>>
where
    C: ClusterSource,
    S: IntentStore,
{
    match query {
        TargetQuery::Clusters { names, selector } => {
            if let Some(selector) = selector.filter(|s| !s.is_empty()) {
                let matched = clusters.list(selector).await?;
                if matched.is_empty() {
                    debug!("no clusters found for selector {}", selector);
                } else {
                    return Ok(matched.into_iter().map(|c| c.spec.name).collect());
                }
            }
            Ok(names.to_vec())
        }
        TargetQuery::Intents { names } => {
            if names.iter().any(|n| n == ALL_KEYWORD) {
                let all = intents.list().await?;
                return Ok(all.into_iter().map(|u| u.spec.name).collect());
            }
            Ok(names.to_vec())
        }
    }
}

/// Result of a create request for one cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    ClusterNotFound(String),
    /// Cluster storage cannot be upgraded; carries the user-facing message
    Ineligible(String),
    /// Validation rejected the request
    Rejected { name: String, reason: String },
}

impl std::fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateOutcome::Created(name) => write!(f, "created Pgupgrade {name}"),
            CreateOutcome::ClusterNotFound(name) => write!(f, "cluster {name} not found"),
            CreateOutcome::Ineligible(message) => write!(f, "{message}"),
            CreateOutcome::Rejected { name, reason } => {
                write!(f, "upgrade of {name} rejected: {reason}")
            }
        }
    }
}

/// Create upgrade intents for the named clusters
///
/// A previous intent for the same cluster is removed first, before the
/// cluster is looked up or the request validated, so a rejected request
/// still clears it. Returns an error only for fatal version errors and
/// platform failures.
pub async fn create_intents<C, S>(
    clusters: &C,
    intents: &S,
    config: &UpgradeConfig,
    names: &[String],
    upgrade_type: UpgradeType,
    image_tag: Option<String>,
) -> Result<Vec<CreateOutcome>>
where
    C: ClusterSource,
    S: IntentStore,
{
    let mut outcomes = Vec::with_capacity(names.len());

    for name in names {
        if intents.get(name).await?.is_some() {
            warn!("previous pgupgrade {} was found so we will remove it.", name);
            intents.delete(name).await?;
        }

        let Some(cluster) = clusters.get(name).await? else {
            outcomes.push(CreateOutcome::ClusterNotFound(name.clone()));
            continue;
        };

        let request = UpgradeRequest::new(name, upgrade_type, image_tag.clone());
        let draft = match validate_upgrade_request(&request, config, &cluster) {
            Ok(draft) => draft,
            Err(e @ Error::IneligibleStorage(_)) => {
                outcomes.push(CreateOutcome::Ineligible(e.to_string()));
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                outcomes.push(CreateOutcome::Rejected {
                    name: name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        intents.create(&draft).await?;
        outcomes.push(CreateOutcome::Created(name.clone()));
    }

    Ok(outcomes)
}

/// Result of a delete request for one name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(String),
    NotFound(String),
}

impl std::fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteOutcome::Deleted(name) => write!(f, "deleted pgupgrade {name}"),
            DeleteOutcome::NotFound(name) => write!(f, "upgrade {name} not found"),
        }
    }
}

/// Delete intents by name; `all` deletes every intent in the namespace
pub async fn delete_intents<S: IntentStore>(
    intents: &S,
    names: &[String],
) -> Result<Vec<DeleteOutcome>> {
    let mut outcomes = Vec::new();

    for arg in names {
        if arg == ALL_KEYWORD {
            for upgrade in intents.list().await? {
                let name = upgrade.spec.name;
                if intents.delete(&name).await? {
                    outcomes.push(DeleteOutcome::Deleted(name));
                }
            }
            continue;
        }

        if intents.delete(arg).await? {
            outcomes.push(DeleteOutcome::Deleted(arg.clone()));
        } else {
            outcomes.push(DeleteOutcome::NotFound(arg.clone()));
        }
    }

    Ok(outcomes)
}

/// An intent together with its conversion job pods
#[derive(Clone, Debug)]
pub struct IntentView {
    pub upgrade: PgUpgrade,
    pub pods: Vec<Pod>,
}

/// Look up intents for `show`; names that do not exist are returned separately
pub async fn show_intents<S, W>(
    intents: &S,
    workloads: &W,
    names: &[String],
) -> Result<(Vec<IntentView>, Vec<String>)>
where
    S: IntentStore,
    W: WorkloadClient,
{
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for arg in names {
        let upgrades = if arg == ALL_KEYWORD {
            intents.list().await?
        } else {
            match intents.get(arg).await? {
                Some(upgrade) => vec![upgrade],
                None => {
                    missing.push(arg.clone());
                    continue;
                }
            }
        };

        for upgrade in upgrades {
            let pods = workloads
                .list_pods(&upgrade_pod_selector(&upgrade.spec.name))
                .await?;
            found.push(IntentView { upgrade, pods });
        }
    }

    Ok((found, missing))
}
