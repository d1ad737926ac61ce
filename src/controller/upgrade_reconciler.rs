//! Reconciler for PgUpgrade resources
//!
//! Each reconcile derives the workflow phase from the intent's persisted
//! status and the presence of its conversion job, runs at most one strategy
//! step, feeds the resulting event through the state machine and persists
//! the status the event implies.
//!
//! - Minor: one step recreates the deployments and the intent completes.
//! - Major: the first step submits the conversion job. The controller owns
//!   the job, so its completion triggers the reconcile that finalizes the
//!   cluster or records the failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{ClusterSource, IntentStore, KubeClusters, WorkloadClient};
use crate::controller::context::UpgradeContext;
use crate::controller::error::{Error, Result};
use crate::controller::major::{FinalizeOutcome, finalize_major_upgrade, submit_major_upgrade};
use crate::controller::minor::run_minor_upgrade;
use crate::controller::upgrade_state_machine::{
    UpgradeEvent, UpgradePhase, UpgradeStateMachine, UpgradeTransitionContext,
    UpgradeTransitionResult, determine_job_event,
};
use crate::crd::{PgCluster, PgUpgrade, UpgradeType};
use crate::resources::{conversion_job_name, is_owned_by, job_outcome};

/// Requeue interval while a conversion job runs
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// What a single reconcile step did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeStep {
    pub from: UpgradePhase,
    pub to: UpgradePhase,
    /// Event applied in this step; `None` when waiting on the conversion job
    pub event: Option<UpgradeEvent>,
}

impl UpgradeStep {
    fn idle(phase: UpgradePhase) -> Self {
        Self {
            from: phase,
            to: phase,
            event: None,
        }
    }

    /// Controller action following this step
    pub fn action(&self) -> Action {
        match self.to {
            UpgradePhase::Completed | UpgradePhase::Failed => Action::await_change(),
            UpgradePhase::Pending | UpgradePhase::JobSubmitted => {
                Action::requeue(JOB_POLL_INTERVAL)
            }
        }
    }
}

/// Main reconciliation function for PgUpgrade
#[instrument(skip(upgrade, ctx), fields(name = %upgrade.name_any(), namespace = upgrade.namespace().unwrap_or_default()))]
pub async fn reconcile_upgrade(upgrade: Arc<PgUpgrade>, ctx: Arc<UpgradeContext>) -> Result<Action> {
    let start_time = Instant::now();
    let ns = upgrade.namespace().unwrap_or_default();
    let name = upgrade.name_any();

    if upgrade.spec.upgrade_status.is_terminal() {
        debug!(status = %upgrade.spec.upgrade_status, "Upgrade already finished");
        return Ok(Action::await_change());
    }

    info!("Reconciling PgUpgrade");

    let clusters = KubeClusters::new(ctx.client.clone(), &ns);
    let cluster = clusters.get(&upgrade.spec.name).await?;

    let result = advance_upgrade(
        &ctx.workloads(&ns),
        &ctx.intents(&ns),
        cluster.as_ref(),
        &upgrade,
        ctx.image_prefix(),
    )
    .await;

    if let Some(ref state) = ctx.health_state {
        state
            .metrics
            .record_reconcile(&ns, &name, start_time.elapsed().as_secs_f64());
        match &result {
            Ok(step) if step.to.is_terminal() => {
                let outcome = if step.to == UpgradePhase::Completed {
                    "completed"
                } else {
                    "failed"
                };
                state
                    .metrics
                    .record_upgrade(upgrade.spec.upgrade_type.as_str(), outcome);
            }
            Ok(_) => {}
            Err(_) => state.metrics.record_error(&ns, &name),
        }
    }

    let step = result?;
    Ok(step.action())
}

/// Run one workflow step for an intent
///
/// `cluster` is the intent's target cluster, or `None` when it no longer
/// exists. Strategy failures are not returned: they fail the intent.
/// Errors are returned only when the resulting status cannot be persisted or
/// the conversion job cannot be read.
pub async fn advance_upgrade<W, S>(
    workloads: &W,
    intents: &S,
    cluster: Option<&PgCluster>,
    upgrade: &PgUpgrade,
    image_prefix: &str,
) -> Result<UpgradeStep>
where
    W: WorkloadClient,
    S: IntentStore,
{
    let spec = &upgrade.spec;
    // Minor upgrades never submit a job, so a job under this name belongs to someone else
    let existing_job = match spec.upgrade_type {
        UpgradeType::Major => workloads.get_job(&conversion_job_name(&spec.name)).await?,
        UpgradeType::Minor => None,
    };
    let (job, stale_job) = match existing_job {
        Some(job) if is_owned_by(&job, upgrade) => (Some(job), false),
        Some(_) => (None, true),
        None => (None, false),
    };
    let phase = UpgradePhase::derive(spec.upgrade_status, job.is_some());
    let ctx = UpgradeTransitionContext::new(spec.upgrade_type, job.as_ref().map(job_outcome));

    if phase.is_terminal() {
        return Ok(UpgradeStep::idle(phase));
    }

    let Some(cluster) = cluster else {
        let err = Error::ClusterNotFound(spec.name.clone());
        error!("Cannot upgrade: {}", err);
        return apply_event(intents, upgrade, phase, UpgradeEvent::ErrorOccurred, &ctx).await;
    };

    let event = match phase {
        UpgradePhase::Pending => match spec.upgrade_type {
            UpgradeType::Minor => {
                match run_minor_upgrade(workloads, intents, cluster, upgrade, image_prefix).await {
                    Ok(()) => UpgradeEvent::MinorUpgradeApplied,
                    Err(e) => {
                        error!("Minor upgrade of {} failed: {}", spec.name, e);
                        UpgradeEvent::ErrorOccurred
                    }
                }
            }
            UpgradeType::Major if stale_job => {
                info!(
                    "Conversion job {} belongs to an earlier upgrade, waiting for its removal",
                    conversion_job_name(&spec.name)
                );
                return Ok(UpgradeStep::idle(phase));
            }
            UpgradeType::Major => {
                match submit_major_upgrade(workloads, cluster, upgrade, image_prefix).await {
                    Ok(()) => UpgradeEvent::ConversionSubmitted,
                    Err(e) => {
                        error!("Major upgrade submission for {} failed: {}", spec.name, e);
                        UpgradeEvent::ErrorOccurred
                    }
                }
            }
        },
        UpgradePhase::JobSubmitted => match determine_job_event(&ctx) {
            None => {
                debug!("Conversion job for {} still running", spec.name);
                return Ok(UpgradeStep::idle(phase));
            }
            Some(UpgradeEvent::ConversionSucceeded) => {
                match finalize_major_upgrade(workloads, cluster, upgrade, image_prefix).await {
                    Ok(FinalizeOutcome::Finalized) => UpgradeEvent::ConversionSucceeded,
                    Ok(FinalizeOutcome::AlreadyFinalized) => {
                        return Ok(UpgradeStep::idle(phase));
                    }
                    Err(e) => {
                        error!("Finalize of {} failed: {}", spec.name, e);
                        UpgradeEvent::ErrorOccurred
                    }
                }
            }
            Some(event) => event,
        },
        UpgradePhase::Completed | UpgradePhase::Failed => return Ok(UpgradeStep::idle(phase)),
    };

    apply_event(intents, upgrade, phase, event, &ctx).await
}

async fn apply_event<S: IntentStore>(
    intents: &S,
    upgrade: &PgUpgrade,
    phase: UpgradePhase,
    event: UpgradeEvent,
    ctx: &UpgradeTransitionContext,
) -> Result<UpgradeStep> {
    let state_machine = UpgradeStateMachine::new();

    match state_machine.transition(&phase, event, ctx) {
        UpgradeTransitionResult::Success {
            from,
            to,
            event,
            description,
        } => {
            info!(%from, %to, %event, "{}", description);
            if let Some(status) = event.status_to_persist() {
                intents.patch_status(&upgrade.spec.name, status).await?;
            }
            Ok(UpgradeStep {
                from,
                to,
                event: Some(event),
            })
        }
        UpgradeTransitionResult::GuardFailed { from, event, reason, .. } => {
            warn!(%from, %event, "Transition blocked: {}", reason);
            Ok(UpgradeStep::idle(phase))
        }
        UpgradeTransitionResult::InvalidTransition { current, event } => {
            let valid = state_machine.valid_events(&current);
            warn!(%current, %event, ?valid, "Invalid transition");
            Ok(UpgradeStep::idle(phase))
        }
    }
}

/// Error policy for the upgrade controller with exponential backoff
pub fn upgrade_error_policy(
    upgrade: Arc<PgUpgrade>,
    error: &Error,
    ctx: Arc<UpgradeContext>,
) -> Action {
    let name = upgrade.name_any();
    let retry_count = 0u32;
    let delay = ctx.backoff.delay_for_error(error, retry_count);

    if error.is_permanent() {
        error!(
            "Permanent error for upgrade {}: {}, requeuing in {:?}",
            name, error, delay
        );
    } else {
        warn!(
            "Retryable error for upgrade {}: {}, requeuing in {:?}",
            name, error, delay
        );
    }

    Action::requeue(delay)
}
