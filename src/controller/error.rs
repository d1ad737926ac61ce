//! Error types for the upgrade controller and the upgrade request path
//!
//! Errors are classified into three categories:
//! - **Permanent**: the request is invalid for the cluster and will not succeed without user intervention
//! - **Transient**: temporary platform errors that may succeed later
//! - **Fatal**: an image tag could not be parsed; the CLI exits with status 2

use std::time::Duration;

use thiserror::Error;

use crate::postgres::VersionError;

/// Error variants are named with the `Error` suffix for clarity (e.g., `KubeError`, `ValidationError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Watch error: {0}")]
    WaitError(#[from] kube::runtime::wait::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Version error: {0}")]
    VersionError(#[from] VersionError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("cluster {0} uses emptydir storage and can not be upgraded")]
    IneligibleStorage(String),

    #[error("pgupgrade {0} already exists")]
    IntentExists(String),

    #[error("pgcluster {0} not found")]
    ClusterNotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(api_err)) => {
                // 4xx errors (except 409 Conflict, 429 TooManyRequests) are not retryable
                let code = api_err.code;
                if (400..500).contains(&code) {
                    return code == 409 || code == 429;
                }
                true
            }
            // Network and other client errors are retryable
            Error::KubeError(_) => true,
            Error::WaitError(_) | Error::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if the request is invalid for the cluster it targets
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::ValidationError(_)
                | Error::IneligibleStorage(_)
                | Error::IntentExists(_)
                | Error::ClusterNotFound(_)
        )
    }

    /// Returns true if an image tag could not be parsed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::VersionError(_))
    }

    /// Returns true if the Kubernetes API reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(resp)) if resp.code == 404)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff configuration
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Initial delay for first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300), // 5 minutes
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the backoff delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);

        // Apply jitter
        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_delay)
    }

    /// Get the delay for an error, with different handling for retryable vs non-retryable
    pub fn delay_for_error(&self, error: &Error, attempt: u32) -> Duration {
        if error.is_retryable() {
            self.delay_for_attempt(attempt)
        } else {
            // Non-retryable errors wait for manual intervention
            self.max_delay
        }
    }
}
