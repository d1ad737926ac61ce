//! Platform access used by the upgrade path.
//!
//! Each concern sits behind a trait so strategies can run against the
//! Kubernetes API in production and against in-memory stores in tests.

pub mod clusters;
pub mod intents;
pub mod workloads;

pub use clusters::{ClusterSource, KubeClusters};
pub use intents::{IntentStore, KubeIntentStore, status_patch};
pub use workloads::{KubeWorkloads, WorkloadClient};
