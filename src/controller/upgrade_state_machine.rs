//! Finite state machine for the PgUpgrade workflow
//!
//! Only `pending`, `completed` and `failed` are persisted on the intent.
//! `JobSubmitted` is derived on every reconcile from the existence of the
//! intent's conversion job, so a restarted controller picks up exactly
//! where it left off.
//!
//! ## Phase Flow
//!
//! ```text
//! Pending ──MinorUpgradeApplied──────────────────────────→ Completed
//!    │
//!    └──ConversionSubmitted──→ JobSubmitted ──ConversionSucceeded──→ Completed
//!                                   └────────ConversionFailed─────→ Failed
//!                 (Pending | JobSubmitted) ──ErrorOccurred──→ Failed
//! ```

use std::fmt;

use crate::crd::{UpgradeStatus, UpgradeType};
use crate::resources::JobOutcome;

/// Workflow phase of an upgrade intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradePhase {
    /// Intent accepted, nothing applied yet
    Pending,
    /// Conversion job exists and the cluster is down
    JobSubmitted,
    /// Workloads are running the requested tag
    Completed,
    /// Upgrade aborted
    Failed,
}

impl UpgradePhase {
    /// Derive the phase from the persisted status and whether this intent's conversion job exists
    pub fn derive(status: UpgradeStatus, job_exists: bool) -> Self {
        match status {
            UpgradeStatus::Completed => UpgradePhase::Completed,
            UpgradeStatus::Failed => UpgradePhase::Failed,
            UpgradeStatus::Pending if job_exists => UpgradePhase::JobSubmitted,
            UpgradeStatus::Pending => UpgradePhase::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UpgradePhase::Completed | UpgradePhase::Failed)
    }
}

impl fmt::Display for UpgradePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradePhase::Pending => write!(f, "Pending"),
            UpgradePhase::JobSubmitted => write!(f, "JobSubmitted"),
            UpgradePhase::Completed => write!(f, "Completed"),
            UpgradePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Events that trigger state transitions in the upgrade workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradeEvent {
    /// Minor strategy recreated the deployments
    MinorUpgradeApplied,
    /// Major strategy created the conversion job
    ConversionSubmitted,
    /// Conversion job finished and the cluster was finalized
    ConversionSucceeded,
    /// Conversion job reported failure
    ConversionFailed,
    /// A strategy or the finalizer returned an error
    ErrorOccurred,
}

impl UpgradeEvent {
    /// Status the controller must persist after this event, if any
    ///
    /// `MinorUpgradeApplied` is absent because the minor strategy patches
    /// `completed` itself.
    pub fn status_to_persist(&self) -> Option<UpgradeStatus> {
        match self {
            UpgradeEvent::ConversionSucceeded => Some(UpgradeStatus::Completed),
            UpgradeEvent::ConversionFailed | UpgradeEvent::ErrorOccurred => {
                Some(UpgradeStatus::Failed)
            }
            UpgradeEvent::MinorUpgradeApplied | UpgradeEvent::ConversionSubmitted => None,
        }
    }
}

impl fmt::Display for UpgradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeEvent::MinorUpgradeApplied => write!(f, "MinorUpgradeApplied"),
            UpgradeEvent::ConversionSubmitted => write!(f, "ConversionSubmitted"),
            UpgradeEvent::ConversionSucceeded => write!(f, "ConversionSucceeded"),
            UpgradeEvent::ConversionFailed => write!(f, "ConversionFailed"),
            UpgradeEvent::ErrorOccurred => write!(f, "ErrorOccurred"),
        }
    }
}

/// Context information available during upgrade state transitions
#[derive(Debug, Clone, Default)]
pub struct UpgradeTransitionContext {
    pub upgrade_type: UpgradeType,
    /// Observed outcome of the conversion job, if one exists
    pub job_outcome: Option<JobOutcome>,
}

impl UpgradeTransitionContext {
    pub fn new(upgrade_type: UpgradeType, job_outcome: Option<JobOutcome>) -> Self {
        Self {
            upgrade_type,
            job_outcome,
        }
    }
}

/// A state transition definition for upgrade phases
#[derive(Debug)]
pub struct UpgradeTransition {
    pub from: UpgradePhase,
    pub to: UpgradePhase,
    pub event: UpgradeEvent,
    pub description: &'static str,
}

impl UpgradeTransition {
    const fn new(
        from: UpgradePhase,
        to: UpgradePhase,
        event: UpgradeEvent,
        description: &'static str,
    ) -> Self {
        Self {
            from,
            to,
            event,
            description,
        }
    }
}

/// Result of attempting an upgrade state transition
#[derive(Debug)]
pub enum UpgradeTransitionResult {
    /// Transition was successful
    Success {
        from: UpgradePhase,
        to: UpgradePhase,
        event: UpgradeEvent,
        description: &'static str,
    },
    /// Transition was not valid for current phase
    InvalidTransition {
        current: UpgradePhase,
        event: UpgradeEvent,
    },
    /// Guard condition prevented the transition
    GuardFailed {
        from: UpgradePhase,
        to: UpgradePhase,
        event: UpgradeEvent,
        reason: String,
    },
}

impl UpgradeTransitionResult {
    /// Target phase when the transition succeeded
    pub fn target(&self) -> Option<UpgradePhase> {
        match self {
            UpgradeTransitionResult::Success { to, .. } => Some(*to),
            _ => None,
        }
    }
}

/// State machine for the PgUpgrade workflow
pub struct UpgradeStateMachine {
    transitions: Vec<UpgradeTransition>,
}

impl Default for UpgradeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgradeStateMachine {
    pub fn new() -> Self {
        Self {
            transitions: vec![
                // === Pending state transitions ===
                UpgradeTransition::new(
                    UpgradePhase::Pending,
                    UpgradePhase::Completed,
                    UpgradeEvent::MinorUpgradeApplied,
                    "Deployments recreated with the new image",
                ),
                UpgradeTransition::new(
                    UpgradePhase::Pending,
                    UpgradePhase::JobSubmitted,
                    UpgradeEvent::ConversionSubmitted,
                    "Cluster shut down, conversion job created",
                ),
                UpgradeTransition::new(
                    UpgradePhase::Pending,
                    UpgradePhase::Failed,
                    UpgradeEvent::ErrorOccurred,
                    "Upgrade strategy failed",
                ),
                // === JobSubmitted state transitions ===
                UpgradeTransition::new(
                    UpgradePhase::JobSubmitted,
                    UpgradePhase::Completed,
                    UpgradeEvent::ConversionSucceeded,
                    "Conversion succeeded, cluster finalized",
                ),
                UpgradeTransition::new(
                    UpgradePhase::JobSubmitted,
                    UpgradePhase::Failed,
                    UpgradeEvent::ConversionFailed,
                    "Conversion job failed",
                ),
                UpgradeTransition::new(
                    UpgradePhase::JobSubmitted,
                    UpgradePhase::Failed,
                    UpgradeEvent::ErrorOccurred,
                    "Finalize failed",
                ),
                // Completed and Failed are terminal
            ],
        }
    }

    /// Attempt to transition to a new phase based on an event
    pub fn transition(
        &self,
        current: &UpgradePhase,
        event: UpgradeEvent,
        ctx: &UpgradeTransitionContext,
    ) -> UpgradeTransitionResult {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.from == *current && t.event == event);

        match transition {
            Some(t) => {
                if let Some(reason) = self.check_guard(t, ctx) {
                    UpgradeTransitionResult::GuardFailed {
                        from: t.from,
                        to: t.to,
                        event,
                        reason,
                    }
                } else {
                    UpgradeTransitionResult::Success {
                        from: t.from,
                        to: t.to,
                        event,
                        description: t.description,
                    }
                }
            }
            None => UpgradeTransitionResult::InvalidTransition {
                current: *current,
                event,
            },
        }
    }

    /// Get all valid events for a given phase
    pub fn valid_events(&self, phase: &UpgradePhase) -> Vec<&UpgradeEvent> {
        self.transitions
            .iter()
            .filter(|t| t.from == *phase)
            .map(|t| &t.event)
            .collect()
    }

    fn check_guard(
        &self,
        transition: &UpgradeTransition,
        ctx: &UpgradeTransitionContext,
    ) -> Option<String> {
        match transition.event {
            UpgradeEvent::MinorUpgradeApplied if ctx.upgrade_type != UpgradeType::Minor => {
                Some(format!("upgrade type is {}, not minor", ctx.upgrade_type))
            }
            UpgradeEvent::ConversionSubmitted if ctx.upgrade_type != UpgradeType::Major => {
                Some(format!("upgrade type is {}, not major", ctx.upgrade_type))
            }
            UpgradeEvent::ConversionSucceeded
                if ctx.job_outcome != Some(JobOutcome::Succeeded) =>
            {
                Some("Conversion job has not succeeded".to_string())
            }
            UpgradeEvent::ConversionFailed if ctx.job_outcome != Some(JobOutcome::Failed) => {
                Some("Conversion job has not failed".to_string())
            }
            _ => None,
        }
    }
}

/// Event implied by the conversion job's state while in `JobSubmitted`
///
/// Returns `None` while the job is still running.
pub fn determine_job_event(ctx: &UpgradeTransitionContext) -> Option<UpgradeEvent> {
    match ctx.job_outcome {
        Some(JobOutcome::Succeeded) => Some(UpgradeEvent::ConversionSucceeded),
        Some(JobOutcome::Failed) => Some(UpgradeEvent::ConversionFailed),
        Some(JobOutcome::Running) | None => None,
    }
}
