// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for tag parsing, request validation and the upgrade workflow
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Legacy and platform-10 tags parse to the documented values
//! 2. Arbitrary strings are rejected with errors, not panics
//! 3. Validation enforces the upgrade direction for every version pair
//! 4. The state machine never panics on any event sequence

use kube::core::ObjectMeta;
use proptest::prelude::*;

use pgupgrade_operator::config::UpgradeConfig;
use pgupgrade_operator::controller::upgrade_state_machine::{
    UpgradeEvent, UpgradePhase, UpgradeStateMachine, UpgradeTransitionContext,
};
use pgupgrade_operator::controller::{UpgradeRequest, validate_upgrade_request};
use pgupgrade_operator::crd::{PgCluster, PgClusterSpec, PgStorageSpec, UpgradeType};
use pgupgrade_operator::postgres::parse_major_version;
use pgupgrade_operator::resources::JobOutcome;

// =============================================================================
// Helper functions
// =============================================================================

fn cluster_with_tag(tag: &str) -> PgCluster {
    PgCluster {
        metadata: ObjectMeta {
            name: Some("db".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: PgClusterSpec {
            name: "db".to_string(),
            port: "5432".to_string(),
            ccp_image_tag: tag.to_string(),
            primary_storage: PgStorageSpec {
                name: "db-pvc".to_string(),
                access_mode: "ReadWriteOnce".to_string(),
                size: "1Gi".to_string(),
                storage_type: "create".to_string(),
                storage_class: None,
            },
            backup_pvc_name: String::new(),
            pg_master_host: String::new(),
            pg_master_user: String::new(),
            pg_master_password: String::new(),
            pg_user: String::new(),
            pg_password: String::new(),
            pg_database: String::new(),
            pg_root_password: String::new(),
            replicas: 1,
            fs_group: None,
            supplemental_groups: vec![],
        },
    }
}

// =============================================================================
// Strategy generators
// =============================================================================

fn os_name() -> impl Strategy<Value = String> {
    prop_oneof![Just("centos7".to_string()), Just("rhel7".to_string())]
}

/// Legacy tag and its major/minor pair
fn legacy_tag() -> impl Strategy<Value = (String, u32, u32)> {
    (os_name(), 1..=9u32, 0..=9u32, 0..=20u32).prop_map(|(os, major, minor, patch)| {
        (format!("{os}-{major}.{minor}.{patch}-1.6.0"), major, minor)
    })
}

/// Platform-10 tag and its stripped digits
fn platform_ten_tag() -> impl Strategy<Value = (String, String)> {
    (os_name(), 0..=9u32, 0..=9u32).prop_map(|(os, minor, patch)| {
        (format!("{os}-10.{minor}.{patch}-1.7.0"), format!("10{minor}{patch}"))
    })
}

fn upgrade_type() -> impl Strategy<Value = UpgradeType> {
    prop_oneof![Just(UpgradeType::Minor), Just(UpgradeType::Major)]
}

fn upgrade_phase() -> impl Strategy<Value = UpgradePhase> {
    prop_oneof![
        Just(UpgradePhase::Pending),
        Just(UpgradePhase::JobSubmitted),
        Just(UpgradePhase::Completed),
        Just(UpgradePhase::Failed),
    ]
}

fn upgrade_event() -> impl Strategy<Value = UpgradeEvent> {
    prop_oneof![
        Just(UpgradeEvent::MinorUpgradeApplied),
        Just(UpgradeEvent::ConversionSubmitted),
        Just(UpgradeEvent::ConversionSucceeded),
        Just(UpgradeEvent::ConversionFailed),
        Just(UpgradeEvent::ErrorOccurred),
    ]
}

fn job_outcome() -> impl Strategy<Value = Option<JobOutcome>> {
    prop_oneof![
        Just(None),
        Just(Some(JobOutcome::Running)),
        Just(Some(JobOutcome::Succeeded)),
        Just(Some(JobOutcome::Failed)),
    ]
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Legacy tags compare on major and minor only
    #[test]
    fn prop_legacy_tag_value((tag, major, minor) in legacy_tag()) {
        let expected: f64 = format!("{major}{minor}").parse().unwrap();
        prop_assert_eq!(parse_major_version(&tag).unwrap(), expected);
    }

    /// Platform-10 tags use all digits scaled by ten
    #[test]
    fn prop_platform_ten_tag_value((tag, digits) in platform_ten_tag()) {
        let expected: f64 = digits.parse::<f64>().unwrap() * 10.0;
        prop_assert_eq!(parse_major_version(&tag).unwrap(), expected);
    }

    /// Parsing arbitrary input never panics
    #[test]
    fn prop_parse_no_panic(tag in ".{0,40}") {
        let _ = parse_major_version(&tag);
    }

    /// Tags without a separator are always rejected
    #[test]
    fn prop_tag_without_separator_rejected(tag in "[a-z0-9.]{0,20}") {
        prop_assert!(parse_major_version(&tag).is_err());
    }

    /// Validation accepts exactly the direction each upgrade type allows
    #[test]
    fn prop_validation_direction(
        (current, _, _) in legacy_tag(),
        (requested, _, _) in legacy_tag(),
        upgrade_type in upgrade_type(),
    ) {
        prop_assume!(current != requested);
        let existing = parse_major_version(&current).unwrap();
        let target = parse_major_version(&requested).unwrap();

        let cluster = cluster_with_tag(&current);
        let request = UpgradeRequest::new("db", upgrade_type, Some(requested.clone()));
        let result = validate_upgrade_request(&request, &UpgradeConfig::default(), &cluster);

        let allowed = match upgrade_type {
            UpgradeType::Major => target > existing,
            UpgradeType::Minor => target <= existing,
        };
        prop_assert_eq!(result.is_ok(), allowed);
    }

    /// Validation is deterministic
    #[test]
    fn prop_validation_deterministic(
        (current, _, _) in legacy_tag(),
        (requested, _) in platform_ten_tag(),
        upgrade_type in upgrade_type(),
    ) {
        let cluster = cluster_with_tag(&current);
        let request = UpgradeRequest::new("db", upgrade_type, Some(requested));
        let first = validate_upgrade_request(&request, &UpgradeConfig::default(), &cluster);
        let second = validate_upgrade_request(&request, &UpgradeConfig::default(), &cluster);

        prop_assert_eq!(first.is_ok(), second.is_ok());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a.spec, b.spec);
        }
    }

    /// The state machine never panics and never leaves a terminal phase
    #[test]
    fn prop_state_machine_no_panic(
        phase in upgrade_phase(),
        events in prop::collection::vec(upgrade_event(), 0..10),
        upgrade_type in upgrade_type(),
        outcome in job_outcome(),
    ) {
        let sm = UpgradeStateMachine::new();
        let ctx = UpgradeTransitionContext::new(upgrade_type, outcome);
        let mut current = phase;

        for event in events {
            let was_terminal = current.is_terminal();
            if let Some(next) = sm.transition(&current, event, &ctx).target() {
                prop_assert!(!was_terminal);
                current = next;
            }
        }
    }
}
