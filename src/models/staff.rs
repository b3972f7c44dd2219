//! Staff documents, role-derived permissions, and attendance records.

use super::MetadataDocument;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Manager,
    Supervisor,
    Employee,
    Trainee,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ClockInOut,
    ProcessOrders,
    ProcessPayments,
    ViewInventory,
    ManageInventory,
    ManageMenu,
    ViewStaff,
    ManageStaff,
    ManageSchedule,
    ViewReports,
    ManageFinancials,
    ManageSettings,
}

impl StaffRole {
    /// Permission set granted to a new staff member with this role.
    pub fn default_permissions(self) -> BTreeSet<Permission> {
        use Permission::*;
        let granted: &[Permission] = match self {
            StaffRole::Admin => return Permission::iter().collect(),
            StaffRole::Manager => &[
                ClockInOut,
                ProcessOrders,
                ProcessPayments,
                ViewInventory,
                ManageInventory,
                ManageMenu,
                ViewStaff,
                ManageStaff,
                ManageSchedule,
                ViewReports,
            ],
            StaffRole::Supervisor => &[
                ClockInOut,
                ProcessOrders,
                ProcessPayments,
                ViewInventory,
                ManageInventory,
                ViewStaff,
                ManageSchedule,
                ViewReports,
            ],
            StaffRole::Employee => &[ClockInOut, ProcessOrders, ProcessPayments, ViewInventory],
            StaffRole::Trainee => &[ClockInOut, ProcessOrders],
        };
        granted.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Seasonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    OnLeave,
    Inactive,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl MetadataDocument for PersonalInfo {
    const KEY: &'static str = "personal_info";
    const CATEGORY: &'static str = "staff";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentInfo {
    pub employee_id: String,
    pub role: StaffRole,
    pub department: String,
    #[serde(default)]
    pub position: Option<String>,
    pub hire_date: NaiveDate,
    pub employment_type: EmploymentType,
    pub hourly_rate: Decimal,
    pub status: EmploymentStatus,
}

impl MetadataDocument for EmploymentInfo {
    const KEY: &'static str = "employment_info";
    const CATEGORY: &'static str = "staff";
}

/// Permissions captured at assignment time. Changing the role later does not
/// rewrite this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub role: StaffRole,
    pub permissions: BTreeSet<Permission>,
    pub assigned_at: DateTime<Utc>,
}

impl PermissionSet {
    pub fn for_role(role: StaffRole, at: DateTime<Utc>) -> Self {
        Self {
            role,
            permissions: role.default_permissions(),
            assigned_at: at,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

impl MetadataDocument for PermissionSet {
    const KEY: &'static str = "permissions";
    const CATEGORY: &'static str = "security";
}

/// Review ratings on a 0-5 scale; unrated areas stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInfo {
    #[serde(default)]
    pub punctuality: Option<Decimal>,
    #[serde(default)]
    pub quality: Option<Decimal>,
    #[serde(default)]
    pub teamwork: Option<Decimal>,
    #[serde(default)]
    pub customer_service: Option<Decimal>,
    #[serde(default)]
    pub reviews_count: u32,
    #[serde(default)]
    pub last_review_date: Option<NaiveDate>,
}

impl PerformanceInfo {
    /// Mean of the rated areas, two decimal places.
    pub fn overall_score(&self) -> Option<Decimal> {
        let rated: Vec<Decimal> = [
            self.punctuality,
            self.quality,
            self.teamwork,
            self.customer_service,
        ]
        .into_iter()
        .flatten()
        .collect();

        if rated.is_empty() {
            return None;
        }
        let sum: Decimal = rated.iter().copied().sum();
        Some((sum / Decimal::from(rated.len() as u64)).round_dp(2))
    }
}

impl MetadataDocument for PerformanceInfo {
    const KEY: &'static str = "performance";
    const CATEGORY: &'static str = "staff";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeEntryStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryDetails {
    pub staff_member_id: Uuid,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub total_hours: Option<Decimal>,
    pub status: TimeEntryStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl TimeEntryDetails {
    /// Closes the entry at `at`.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.clock_out = Some(at);
        self.total_hours = Some(hours_between(self.clock_in, at));
        self.status = TimeEntryStatus::Completed;
    }
}

impl MetadataDocument for TimeEntryDetails {
    const KEY: &'static str = "time_entry_details";
    const CATEGORY: &'static str = "attendance";
}

/// Running totals over a staff member's completed time entries. Folded in at
/// clock-out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttendanceTotals {
    #[serde(default)]
    pub total_hours_logged: Decimal,
    #[serde(default)]
    pub completed_entries: u32,
    #[serde(default)]
    pub last_clock_out: Option<DateTime<Utc>>,
}

impl AttendanceTotals {
    pub fn add_entry(&mut self, hours: Decimal, clock_out: DateTime<Utc>) {
        self.total_hours_logged = self.total_hours_logged.saturating_add(hours);
        self.completed_entries = self.completed_entries.saturating_add(1);
        self.last_clock_out = Some(match self.last_clock_out {
            Some(previous) => previous.max(clock_out),
            None => clock_out,
        });
    }
}

impl MetadataDocument for AttendanceTotals {
    const KEY: &'static str = "attendance_totals";
    const CATEGORY: &'static str = "attendance";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClockAction {
    ClockIn,
    ClockOut,
}

/// Append-only record of one clock event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDetails {
    pub staff_member_id: Uuid,
    pub time_entry_id: Uuid,
    pub action: ClockAction,
    pub occurred_at: DateTime<Utc>,
    pub total_hours: Option<Decimal>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl MetadataDocument for AttendanceDetails {
    const KEY: &'static str = "attendance_details";
    const CATEGORY: &'static str = "transaction";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftDetails {
    pub staff_member_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub position: Option<String>,
    pub status: ShiftStatus,
    pub notes: Option<String>,
}

impl ShiftDetails {
    pub fn scheduled_hours(&self) -> Decimal {
        hours_between(self.starts_at, self.ends_at)
    }
}

impl MetadataDocument for ShiftDetails {
    const KEY: &'static str = "shift_details";
    const CATEGORY: &'static str = "scheduling";
}

/// Elapsed hours between two instants, two decimal places, never negative.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClockStatus {
    ClockedIn {
        time_entry_id: Uuid,
        since: DateTime<Utc>,
    },
    ClockedOut,
}

impl ClockStatus {
    pub fn is_clocked_in(&self) -> bool {
        matches!(self, ClockStatus::ClockedIn { .. })
    }
}

/// Staff member assembled from its entity row, metadata documents and
/// time entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: String,
    pub full_name: String,
    pub personal: PersonalInfo,
    pub employment: EmploymentInfo,
    pub permissions: PermissionSet,
    pub performance: PerformanceInfo,
    pub performance_score: Option<Decimal>,
    pub clock_status: ClockStatus,
    pub total_hours_logged: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub staff_member_id: Uuid,
    pub details: ShiftDetails,
    pub scheduled_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffAnalytics {
    pub total_staff: usize,
    pub active_staff: usize,
    pub currently_clocked_in: usize,
    pub role_breakdown: BTreeMap<StaffRole, usize>,
    pub department_breakdown: BTreeMap<String, usize>,
    pub total_hours_logged: Decimal,
    pub estimated_labor_cost: Decimal,
    pub average_hourly_rate: Decimal,
    pub average_performance_score: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    #[test]
    fn admin_has_every_permission() {
        let admin = StaffRole::Admin.default_permissions();
        assert_eq!(admin.len(), Permission::iter().count());
    }

    #[test]
    fn permissions_narrow_down_the_hierarchy() {
        let manager = StaffRole::Manager.default_permissions();
        let supervisor = StaffRole::Supervisor.default_permissions();
        let employee = StaffRole::Employee.default_permissions();
        let trainee = StaffRole::Trainee.default_permissions();

        assert!(supervisor.is_subset(&manager));
        assert!(employee.is_subset(&supervisor));
        assert!(trainee.is_subset(&employee));
        assert!(!manager.contains(&Permission::ManageSettings));
        assert!(trainee.contains(&Permission::ClockInOut));
        assert!(!trainee.contains(&Permission::ViewInventory));
    }

    #[test]
    fn overall_score_averages_rated_areas() {
        let perf = PerformanceInfo {
            punctuality: Some(dec!(4)),
            quality: Some(dec!(5)),
            teamwork: None,
            customer_service: Some(dec!(3.5)),
            ..Default::default()
        };
        assert_eq!(perf.overall_score(), Some(dec!(4.17)));
        assert_eq!(PerformanceInfo::default().overall_score(), None);
    }

    #[test]
    fn completing_a_time_entry_records_hours() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut entry = TimeEntryDetails {
            staff_member_id: Uuid::new_v4(),
            clock_in: start,
            clock_out: None,
            total_hours: None,
            status: TimeEntryStatus::Active,
            location: None,
            notes: None,
        };
        entry.complete(start + Duration::minutes(135));
        assert_eq!(entry.status, TimeEntryStatus::Completed);
        assert_eq!(entry.total_hours, Some(dec!(2.25)));
    }

    #[test]
    fn attendance_totals_accumulate_out_of_order_entries() {
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 17, 0, 0).unwrap();
        let mut totals = AttendanceTotals::default();
        totals.add_entry(dec!(8), late);
        totals.add_entry(dec!(1.5), late - Duration::days(1));
        assert_eq!(totals.total_hours_logged, dec!(9.5));
        assert_eq!(totals.completed_entries, 2);
        assert_eq!(totals.last_clock_out, Some(late));
    }

    #[test]
    fn hours_between_never_negative() {
        let now = Utc::now();
        assert_eq!(hours_between(now, now - Duration::hours(1)), Decimal::ZERO);
    }
}
