//! Smoke screen unit tests for approval engine components
//!
//! These tests span the codebase, testing behavior in isolation from
//! integration scenarios. They are intended as smoke-screen coverage and
//! generally exercise the happy path plus the cheap edge cases; anything
//! that needs a live database belongs in the scenario tests.

use chrono::{Datelike, Timelike, Utc};
use approval_flow::config::RouteFile;
use approval_flow::instance::Instance;
use approval_flow::route::{Route, select_route};
use approval_flow::types::{AmountRange, Role, StepStatus, TimeStamp};
use approval_flow::utils::{self, mint_id};

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Minted ids carry the entity prefix, so logs stay legible.
    #[test]
    fn ids_carry_their_entity_prefix() {
        let doc = mint_id(utils::DOCUMENT_HRP).unwrap();
        let user = mint_id(utils::USER_HRP).unwrap();

        assert!(doc.starts_with("doc_1"));
        assert!(user.starts_with("user_1"));
        assert_ne!(doc, user);
    }

    /// An empty human-readable prefix is not encodable.
    #[test]
    fn empty_prefix_is_refused() {
        assert!(mint_id("").is_err());
    }

    /// Each call mints a distinct identifier.
    #[test]
    fn minted_ids_are_unique() {
        let a = mint_id(utils::INSTANCE_HRP).unwrap();
        let b = mint_id(utils::INSTANCE_HRP).unwrap();

        assert_ne!(a, b);
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    /// TimeStamp::new() tracks the current time.
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let now = Utc::now();

        let diff = (now - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    /// TimeStamp can be pinned to a specific date/time for fixtures.
    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let ts = TimeStamp::new_with(2024, 6, 15, 10, 30, 0);
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    /// CBOR encoding round-trips without losing precision.
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    /// Bounds are inclusive on both ends.
    #[test]
    fn range_bounds_are_inclusive() {
        let range = AmountRange::new(Some(100), Some(200));

        assert!(!range.contains(99));
        assert!(range.contains(100));
        assert!(range.contains(200));
        assert!(!range.contains(201));
    }

    /// A missing lower bound means zero.
    #[test]
    fn missing_min_means_zero() {
        let range = AmountRange::new(None, Some(10));

        assert_eq!(range.floor(), 0);
        assert!(range.contains(0));
    }

    /// Adjacent bands (max = other's min - 1) do not overlap.
    #[test]
    fn adjacent_bands_do_not_overlap() {
        let low = AmountRange::new(None, Some(500_000));
        let high = AmountRange::new(Some(500_001), None);

        assert!(!low.overlaps(&high));
    }

    /// Two open-ended ranges always overlap.
    #[test]
    fn open_ended_ranges_overlap() {
        let a = AmountRange::new(Some(10), None);
        let b = AmountRange::new(Some(1_000_000), None);

        assert!(a.overlaps(&b));
    }

    /// Only back-office and admin roles may act on documents they do not own.
    #[test]
    fn back_office_permission_is_limited_to_two_roles() {
        assert!(Role::BackOffice.is_back_office());
        assert!(Role::Admin.is_back_office());
        assert!(!Role::Sales.is_back_office());
        assert!(!Role::Manager.is_back_office());
        assert!(!Role::Director.is_back_office());
    }
}

// ROUTE MATCHING TESTS
#[cfg(test)]
mod route_tests {
    use super::*;

    fn band(name: &str, min: Option<u64>, max: Option<u64>) -> Route {
        Route::new(name, None, AmountRange::new(min, max))
            .unwrap()
            .with_step(Role::Manager, None)
    }

    /// The matcher returns the same route for the same inputs.
    #[test]
    fn matching_is_deterministic() {
        let routes = vec![
            band("low", None, Some(500_000)),
            band("high", Some(500_001), None),
        ];

        let first = select_route(routes.clone(), Role::Sales, 400_000).unwrap();
        let second = select_route(routes, Role::Sales, 400_000).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "low");
    }

    /// When several routes admit an amount, the lowest lower bound wins.
    #[test]
    fn lowest_min_wins_on_overlap() {
        let wide = band("wide", Some(0), None);
        let narrow = band("narrow", Some(100), Some(200));
        let routes = vec![narrow, wide.clone()];

        let chosen = select_route(routes, Role::Sales, 150).unwrap();
        assert_eq!(chosen.id, wide.id);
    }

    /// Inactive routes are invisible to the matcher.
    #[test]
    fn inactive_routes_never_match() {
        let mut retired = band("retired", None, None);
        retired.is_active = false;

        assert!(select_route(vec![retired], Role::Sales, 100).is_none());
    }

    /// The upper bound excludes amounts above it.
    #[test]
    fn amount_above_the_band_falls_through() {
        let routes = vec![
            band("low", None, Some(500_000)),
            band("high", Some(500_001), None),
        ];

        let chosen = select_route(routes, Role::Sales, 500_001).unwrap();
        assert_eq!(chosen.name, "high");
    }

    /// Role-scoped routes only admit their own role; a catch-all picks up
    /// the rest.
    #[test]
    fn role_scope_is_honored() {
        let sales_only = Route::new("sales", Some(Role::Sales), AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None);

        let chosen = select_route(vec![sales_only.clone()], Role::Sales, 10).unwrap();
        assert_eq!(chosen.id, sales_only.id);
        assert!(select_route(vec![sales_only], Role::BackOffice, 10).is_none());
    }

    /// No admitting route means no match, not a fallback.
    #[test]
    fn no_admitting_route_returns_none() {
        let routes = vec![band("high", Some(1_000_000), None)];

        assert!(select_route(routes, Role::Sales, 10).is_none());
    }
}

// INSTANCE TRANSITION TESTS
#[cfg(test)]
mod instance_tests {
    use super::*;

    fn three_step_route() -> Route {
        Route::new("chain", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None)
            .with_step(Role::Director, None)
            .with_step(Role::Executive, None)
    }

    /// The instance snapshots the chain: roles copied, all seeded pending,
    /// the first step actionable.
    #[test]
    fn start_snapshots_the_chain() {
        let route = three_step_route();
        let instance = Instance::start("doc_a", &route, "user_a").unwrap();

        assert_eq!(instance.route_id, route.id);
        assert_eq!(instance.route_fingerprint, route.fingerprint().unwrap());
        assert_eq!(instance.steps.len(), 3);
        assert_eq!(instance.current_step, Some(1));
        assert_eq!(instance.steps[2].approver_role, Role::Executive);
    }

    /// Approvals walk the chain strictly in order.
    #[test]
    fn approvals_advance_in_order() {
        let route = three_step_route();
        let mut instance = Instance::start("doc_a", &route, "user_a").unwrap();

        assert_eq!(
            instance.record_approval(1, "u1").unwrap(),
            Some(Role::Director)
        );
        assert_eq!(
            instance.record_approval(2, "u2").unwrap(),
            Some(Role::Executive)
        );
        assert_eq!(instance.record_approval(3, "u3").unwrap(), None);
    }

    /// A step ahead of the current one cannot be actioned: it is pending
    /// in status but not the conditioned row the executor targets.
    #[test]
    fn current_pending_points_at_the_cursor() {
        let route = three_step_route();
        let mut instance = Instance::start("doc_a", &route, "user_a").unwrap();
        instance.record_approval(1, "u1").unwrap();

        let step = instance.current_pending().unwrap();
        assert_eq!(step.step_order, 2);
    }

    /// Restart rebuilds the chain from the newly matched route while the
    /// record keeps its identity.
    #[test]
    fn restart_keeps_the_id_and_rebuilds_steps() {
        let route = three_step_route();
        let mut instance = Instance::start("doc_a", &route, "user_a").unwrap();
        instance
            .record_rejection(1, "u1", Some("no budget"))
            .unwrap();

        let id = instance.id.clone();
        let shorter = Route::new("short", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None);
        instance.restart(&shorter, "user_b").unwrap();

        assert_eq!(instance.id, id);
        assert_eq!(instance.steps.len(), 1);
        assert_eq!(instance.requested_by, "user_b");
        assert!(instance.rejection_reason.is_none());
        assert!(
            instance
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Pending)
        );
    }

    /// Step notes from the template survive into the snapshot.
    #[test]
    fn template_notes_are_copied() {
        let route = Route::new("noted", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, Some("check margins"));
        let instance = Instance::start("doc_a", &route, "user_a").unwrap();

        assert_eq!(instance.steps[0].notes.as_deref(), Some("check margins"));
    }
}

// CONFIG MODULE TESTS
#[cfg(test)]
mod config_tests {
    use super::*;

    /// Unknown role names are a parse error, not a silent default.
    #[test]
    fn unknown_role_fails_to_parse() {
        let result = RouteFile::parse(
            r#"
            [[route]]
            name = "bad"

            [[route.step]]
            approver_role = "wizard"
            "#,
        );

        assert!(result.is_err());
    }

    /// Routes default to active; the flag can be set explicitly.
    #[test]
    fn is_active_defaults_to_true() {
        let file = RouteFile::parse(
            r#"
            [[route]]
            name = "on"

            [[route.step]]
            approver_role = "manager"

            [[route]]
            name = "off"
            is_active = false

            [[route.step]]
            approver_role = "manager"
            "#,
        )
        .unwrap();

        assert!(file.routes[0].is_active);
        assert!(!file.routes[1].is_active);
    }
}
