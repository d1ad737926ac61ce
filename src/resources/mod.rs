pub mod common;
pub mod deployment;
pub mod job;
pub mod pvc;

pub use common::{
    API_VERSION, FIELD_MANAGER, KIND, REPLICA_SUFFIX, cluster_selector, owner_reference,
    standard_labels, upgrade_pod_selector,
};
pub use deployment::{DeploymentFields, DeploymentRole, generate_deployment, replica_deployment_name};
pub use job::{
    JobFields, JobOutcome, conversion_job_name, generate_conversion_job, is_owned_by, job_outcome,
};
pub use pvc::generate_pvc;
