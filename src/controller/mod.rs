pub mod context;
pub mod error;
pub mod major;
pub mod minor;
pub mod request;
pub mod shutdown;
pub mod upgrade_reconciler;
pub mod upgrade_state_machine;
pub mod validation;

pub use context::UpgradeContext;
pub use error::{BackoffConfig, Error, Result};
pub use major::{FinalizeOutcome, finalize_major_upgrade, submit_major_upgrade};
pub use minor::run_minor_upgrade;
pub use request::{
    ALL_KEYWORD, CreateOutcome, DeleteOutcome, IntentView, TargetQuery, create_intents,
    delete_intents, resolve_targets, show_intents,
};
pub use shutdown::{DELETE_WAIT_TIMEOUT, ShutdownReport, shutdown_cluster};
pub use upgrade_reconciler::{
    JOB_POLL_INTERVAL, UpgradeStep, advance_upgrade, reconcile_upgrade, upgrade_error_policy,
};
pub use upgrade_state_machine::{
    UpgradeEvent, UpgradePhase, UpgradeStateMachine, UpgradeTransitionContext,
    UpgradeTransitionResult,
};
pub use validation::{UpgradeRequest, validate_upgrade_request, validate_version_direction};
