mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use common::TestApp;
use erp_universal::{
    errors::ServiceError,
    models::staff::{
        ClockAction, ClockStatus, PerformanceInfo, Permission, StaffRole, TimeEntryStatus,
    },
    models::EntityType,
    services::staff::{ClockRequest, ShiftInput, StaffMemberInput},
    store::{entity_store, NewEntity},
};
use rust_decimal_macros::dec;
use sea_orm::ConnectionTrait;
use uuid::Uuid;

fn staff_input(first: &str, last: &str, role: StaffRole) -> StaffMemberInput {
    StaffMemberInput {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@bistro.example", first.to_lowercase()),
        phone: None,
        address: None,
        emergency_contact: None,
        role,
        department: "Kitchen".to_string(),
        position: Some("Line cook".to_string()),
        hire_date: None,
        employment_type: erp_universal::models::staff::EmploymentType::FullTime,
        hourly_rate: dec!(18.50),
    }
}

#[tokio::test]
async fn clock_in_then_out_logs_hours() {
    let app = TestApp::new().await;
    let scope = app.organization("CLOCK").await;
    let staff = &app.state.services.staff;

    let member = staff
        .create_staff_member(scope, staff_input("Maria", "Lopez", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    assert_eq!(member.clock_status, ClockStatus::ClockedOut);

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let clock_in = staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockIn).at(start))
        .await
        .unwrap();
    assert_eq!(clock_in.status, TimeEntryStatus::Active);

    let during = staff.get_staff_member(scope, member.id).await.unwrap();
    assert!(during.clock_status.is_clocked_in());

    let clock_out = staff
        .clock_in_out(
            scope,
            member.id,
            ClockRequest::new(ClockAction::ClockOut).at(start + Duration::hours(2)),
        )
        .await
        .unwrap();
    assert_eq!(clock_out.time_entry_id, clock_in.time_entry_id);
    assert_eq!(clock_out.status, TimeEntryStatus::Completed);
    assert_eq!(clock_out.total_hours, Some(dec!(2.00)));

    let after = staff.get_staff_member(scope, member.id).await.unwrap();
    assert_eq!(after.clock_status, ClockStatus::ClockedOut);
    assert_eq!(after.total_hours_logged, dec!(2));

    let history = staff.get_attendance_history(scope, member.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .any(|event| event.details.action == ClockAction::ClockOut
            && event.details.total_hours == Some(dec!(2.00))));
}

#[tokio::test]
async fn double_clock_in_conflicts() {
    let app = TestApp::new().await;
    let scope = app.organization("TWICE").await;
    let staff = &app.state.services.staff;
    let member = staff
        .create_staff_member(scope, staff_input("Sam", "Reed", StaffRole::Trainee))
        .await
        .unwrap()
        .into_value();

    staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockIn))
        .await
        .unwrap();
    let second = staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockIn))
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn clock_out_requires_an_open_entry() {
    let app = TestApp::new().await;
    let scope = app.organization("NOOPEN").await;
    let staff = &app.state.services.staff;
    let member = staff
        .create_staff_member(scope, staff_input("Lee", "Park", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();

    let result = staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockOut))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockIn).at(start))
        .await
        .unwrap();
    let backwards = staff
        .clock_in_out(
            scope,
            member.id,
            ClockRequest::new(ClockAction::ClockOut).at(start - Duration::minutes(5)),
        )
        .await;
    assert_matches!(backwards, Err(ServiceError::InvalidInput(_)));

    // The failed clock-out left the entry open
    let member = staff.get_staff_member(scope, member.id).await.unwrap();
    assert!(member.clock_status.is_clocked_in());
}

#[tokio::test]
async fn employee_ids_are_sequential_per_organization() {
    let app = TestApp::new().await;
    let scope = app.organization("SEQ").await;
    let other = app.organization("SEQ2").await;
    let staff = &app.state.services.staff;

    let first = staff
        .create_staff_member(scope, staff_input("Ana", "Silva", StaffRole::Manager))
        .await
        .unwrap()
        .into_value();
    let second = staff
        .create_staff_member(scope, staff_input("Ben", "Ng", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    let elsewhere = staff
        .create_staff_member(other, staff_input("Cy", "Moss", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();

    assert_eq!(first.employee_id, "EMP-0001");
    assert_eq!(second.employee_id, "EMP-0002");
    assert_eq!(elsewhere.employee_id, "EMP-0001");
    assert_eq!(first.full_name, "Ana Silva");
    assert_eq!(first.personal.email, "ana@bistro.example");
}

#[tokio::test]
async fn new_staff_get_role_permissions_until_replaced() {
    let app = TestApp::new().await;
    let scope = app.organization("PERM").await;
    let staff = &app.state.services.staff;
    let member = staff
        .create_staff_member(scope, staff_input("Kim", "Cho", StaffRole::Supervisor))
        .await
        .unwrap()
        .into_value();

    assert_eq!(
        member.permissions.permissions,
        StaffRole::Supervisor.default_permissions()
    );
    assert!(member.permissions.allows(Permission::ManageSchedule));
    assert!(!member.permissions.allows(Permission::ManageSettings));

    let replacement: BTreeSet<Permission> =
        [Permission::ClockInOut, Permission::ViewReports].into_iter().collect();
    let updated = staff
        .update_permissions(scope, member.id, replacement.clone())
        .await
        .unwrap();
    assert_eq!(updated.role, StaffRole::Supervisor);

    let reloaded = staff.get_staff_member(scope, member.id).await.unwrap();
    assert_eq!(reloaded.permissions.permissions, replacement);
}

#[tokio::test]
async fn shifts_are_listed_in_start_order() {
    let app = TestApp::new().await;
    let scope = app.organization("SHIFT").await;
    let staff = &app.state.services.staff;
    let member = staff
        .create_staff_member(scope, staff_input("Jo", "Hart", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();

    let monday = Utc.with_ymd_and_hms(2024, 3, 4, 16, 0, 0).unwrap();
    for start in [monday + Duration::days(1), monday] {
        staff
            .create_shift(
                scope,
                member.id,
                ShiftInput {
                    starts_at: start,
                    ends_at: start + Duration::minutes(450),
                    position: Some("Grill".to_string()),
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let shifts = staff.list_shifts(scope, Some(member.id)).await.unwrap();
    assert_eq!(shifts.len(), 2);
    assert_eq!(shifts[0].details.starts_at, monday);
    assert_eq!(shifts[0].scheduled_hours, dec!(7.5));

    let inverted = staff
        .create_shift(
            scope,
            member.id,
            ShiftInput {
                starts_at: monday,
                ends_at: monday,
                position: None,
                notes: None,
            },
        )
        .await;
    assert_matches!(inverted, Err(ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn analytics_summarise_roles_and_hours() {
    let app = TestApp::new().await;
    let scope = app.organization("STATS").await;
    let staff = &app.state.services.staff;
    let cook = staff
        .create_staff_member(scope, staff_input("Ivy", "Lane", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    staff
        .create_staff_member(scope, staff_input("Ola", "Berg", StaffRole::Manager))
        .await
        .unwrap();

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    staff
        .clock_in_out(scope, cook.id, ClockRequest::new(ClockAction::ClockIn).at(start))
        .await
        .unwrap();
    staff
        .clock_in_out(
            scope,
            cook.id,
            ClockRequest::new(ClockAction::ClockOut).at(start + Duration::hours(4)),
        )
        .await
        .unwrap();

    let analytics = staff.get_staff_analytics(scope).await.unwrap();
    assert_eq!(analytics.total_staff, 2);
    assert_eq!(analytics.active_staff, 2);
    assert_eq!(analytics.currently_clocked_in, 0);
    assert_eq!(analytics.role_breakdown.get(&StaffRole::Manager), Some(&1));
    assert_eq!(analytics.total_hours_logged, dec!(4));
    assert_eq!(analytics.estimated_labor_cost, dec!(74.00));
}

#[tokio::test]
async fn unknown_staff_member_is_not_found() {
    let app = TestApp::new().await;
    let scope = app.organization("GHOST").await;
    let result = app
        .state
        .services
        .staff
        .get_staff_member(scope, Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn store_allows_one_open_time_entry_per_member() {
    let app = TestApp::new().await;
    let scope = app.organization("OPEN").await;
    let staff = &app.state.services.staff;
    let member = staff
        .create_staff_member(scope, staff_input("Ivo", "Petrov", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    staff
        .clock_in_out(scope, member.id, ClockRequest::new(ClockAction::ClockIn))
        .await
        .unwrap();

    // Inserted past the service's open-entry check
    let second_open = entity_store::create_entity(
        app.db(),
        scope,
        NewEntity::new(EntityType::TimeEntry, "Time entry")
            .with_subtype(TimeEntryStatus::Active.to_string())
            .related_to(member.id),
    )
    .await;
    assert_matches!(second_open, Err(ServiceError::Conflict(_)));

    let closed = entity_store::create_entity(
        app.db(),
        scope,
        NewEntity::new(EntityType::TimeEntry, "Time entry")
            .with_subtype(TimeEntryStatus::Completed.to_string())
            .related_to(member.id),
    )
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn employee_ids_are_unique_per_organization() {
    let app = TestApp::new().await;
    let scope = app.organization("IDS").await;
    let other = app.organization("IDS2").await;
    let staff = &app.state.services.staff;

    let first = staff
        .create_staff_member(scope, staff_input("Ana", "Silva", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    assert_eq!(first.employee_id, "EMP-0001");

    let duplicate = entity_store::create_entity(
        app.db(),
        scope,
        NewEntity::new(EntityType::StaffMember, "Copy").with_code("EMP-0001"),
    )
    .await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(ref msg)) if msg.contains("EMP-0001"));
    assert!(entity_store::create_entity(
        app.db(),
        other,
        NewEntity::new(EntityType::StaffMember, "Copy").with_code("EMP-0001"),
    )
    .await
    .is_ok());

    // Another writer already holds the next number
    entity_store::create_entity(
        app.db(),
        scope,
        NewEntity::new(EntityType::StaffMember, "Claimed").with_code("EMP-0003"),
    )
    .await
    .unwrap();
    let next = staff
        .create_staff_member(scope, staff_input("Rui", "Costa", StaffRole::Employee))
        .await
        .unwrap()
        .into_value();
    assert_eq!(next.employee_id, "EMP-0004");
}

#[tokio::test]
async fn failed_performance_seed_is_a_warning() {
    let app = TestApp::new().await;
    let scope = app.organization("PERF").await;
    let staff = &app.state.services.staff;

    app.db()
        .execute_unprepared(
            "CREATE TRIGGER reject_performance BEFORE INSERT ON metadata \
             WHEN NEW.metadata_key = 'performance' \
             BEGIN SELECT RAISE(ABORT, 'performance writes disabled'); END",
        )
        .await
        .unwrap();

    let outcome = staff
        .create_staff_member(scope, staff_input("Lena", "Berg", StaffRole::Manager))
        .await
        .unwrap();
    assert_eq!(outcome.warnings().len(), 1);
    assert!(outcome.warnings()[0].contains("performance"));

    let member = outcome.into_value();
    let stored = staff.get_staff_member(scope, member.id).await.unwrap();
    assert_eq!(stored.full_name, "Lena Berg");
    assert_eq!(stored.performance, PerformanceInfo::default());
    assert_eq!(stored.performance_score, None);
}
