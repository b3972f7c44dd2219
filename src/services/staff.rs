use super::transactions;
use super::validate_non_negative_decimal;
use crate::{
    db::DbPool,
    entities::EntityModel,
    errors::ServiceError,
    events::{Event, EventSender},
    models::staff::{
        AttendanceDetails, AttendanceTotals, ClockAction, ClockStatus, EmergencyContact,
        EmploymentInfo, EmploymentStatus, EmploymentType, PerformanceInfo, Permission,
        PermissionSet, PersonalInfo, Shift, ShiftDetails, ShiftStatus, StaffAnalytics,
        StaffMember, StaffRole, TimeEntryDetails, TimeEntryStatus,
    },
    models::{CreationOutcome, EntityType, MetadataDocument},
    store::{
        entity_store, metadata_store, EntityFilter, EntityPatch, MetadataBag, NewEntity,
        NewMetadata, TenantScope,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Employee ids tried before a create gives up with `Conflict`.
const EMPLOYEE_ID_ATTEMPTS: u32 = 3;

fn employee_code(number: u64) -> String {
    format!("EMP-{:04}", number)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StaffMemberInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    pub role: StaffRole,
    #[validate(length(min = 1, max = 100))]
    pub department: String,
    #[serde(default)]
    pub position: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default = "default_employment_type")]
    pub employment_type: EmploymentType,
    #[validate(custom = "validate_non_negative_decimal")]
    pub hourly_rate: Decimal,
}

fn default_employment_type() -> EmploymentType {
    EmploymentType::FullTime
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClockRequest {
    pub action: ClockAction,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Defaults to now
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl ClockRequest {
    pub fn new(action: ClockAction) -> Self {
        Self {
            action,
            location: None,
            notes: None,
            occurred_at: None,
        }
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockResult {
    pub time_entry_id: Uuid,
    pub action: ClockAction,
    pub status: TimeEntryStatus,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub total_hours: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShiftInput {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub position: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Builds the staff projection from the member's metadata and open time
/// entries. Personal and employment documents are written together with the
/// entity and are required; permissions fall back to the role defaults,
/// performance to an unrated record and attendance totals to zero.
pub fn project_staff_member(
    entity: EntityModel,
    bag: &MetadataBag,
    open_entries: &[(Uuid, TimeEntryDetails)],
) -> Result<StaffMember, ServiceError> {
    let personal: PersonalInfo = bag.require(entity.id)?;
    let employment: EmploymentInfo = bag.require(entity.id)?;
    let permissions = match bag.document::<PermissionSet>()? {
        Some(set) => set,
        None => PermissionSet::for_role(employment.role, entity.created_at),
    };
    let performance: PerformanceInfo = bag.document_or_default()?;
    let attendance: AttendanceTotals = bag.document_or_default()?;

    let clock_status = open_entries
        .iter()
        .find(|(_, entry)| entry.status == TimeEntryStatus::Active)
        .map(|(id, entry)| ClockStatus::ClockedIn {
            time_entry_id: *id,
            since: entry.clock_in,
        })
        .unwrap_or(ClockStatus::ClockedOut);

    Ok(StaffMember {
        id: entity.id,
        organization_id: entity.organization_id,
        employee_id: employment.employee_id.clone(),
        full_name: personal.full_name(),
        performance_score: performance.overall_score(),
        personal,
        employment,
        permissions,
        performance,
        clock_status,
        total_hours_logged: attendance.total_hours_logged,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    })
}

/// Active time entries of one staff member (or of everyone), grouped by
/// staff member. Completed entries are never loaded.
async fn load_open_time_entries<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    staff_id: Option<Uuid>,
) -> Result<HashMap<Uuid, Vec<(Uuid, TimeEntryDetails)>>, ServiceError> {
    let filter = EntityFilter {
        related_entity_id: staff_id,
        subtype: Some(TimeEntryStatus::Active.to_string()),
        ..Default::default()
    };
    let entries = entity_store::list_entities(db, scope, EntityType::TimeEntry, &filter).await?;
    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let mut bags = metadata_store::group_by_entity(
        metadata_store::list_metadata_for_entities(db, scope, EntityType::TimeEntry, &ids)
            .await?,
    );

    let mut grouped: HashMap<Uuid, Vec<(Uuid, TimeEntryDetails)>> = HashMap::new();
    for entry in entries {
        let bag = bags.remove(&entry.id).unwrap_or_default();
        let details: TimeEntryDetails = bag.require(entry.id)?;
        grouped
            .entry(details.staff_member_id)
            .or_default()
            .push((entry.id, details));
    }
    Ok(grouped)
}

/// Writes the staff entity with its personal, employment and permission
/// documents. `db` must be a transaction for them to commit together.
async fn insert_staff_member<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    employee_id: &str,
    personal: &PersonalInfo,
    input: &StaffMemberInput,
    now: DateTime<Utc>,
) -> Result<Uuid, ServiceError> {
    let entity = entity_store::create_entity(
        db,
        scope,
        NewEntity::new(EntityType::StaffMember, personal.full_name())
            .with_subtype(input.role.to_string())
            .with_code(employee_id),
    )
    .await?;

    let employment = EmploymentInfo {
        employee_id: employee_id.to_string(),
        role: input.role,
        department: input.department.clone(),
        position: input.position.clone(),
        hire_date: input.hire_date.unwrap_or_else(|| now.date_naive()),
        employment_type: input.employment_type,
        hourly_rate: input.hourly_rate,
        status: EmploymentStatus::Active,
    };
    metadata_store::create_metadata_batch(
        db,
        scope,
        vec![
            NewMetadata::document(EntityType::StaffMember, entity.id, personal)?,
            NewMetadata::document(EntityType::StaffMember, entity.id, &employment)?,
            NewMetadata::document(
                EntityType::StaffMember,
                entity.id,
                &PermissionSet::for_role(input.role, now),
            )?,
        ],
    )
    .await?;

    Ok(entity.id)
}

/// Service for staff members, attendance and scheduling
#[derive(Clone)]
pub struct StaffService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl StaffService {
    /// Creates a new staff service instance
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_staff_members(
        &self,
        scope: TenantScope,
    ) -> Result<Vec<StaffMember>, ServiceError> {
        let db = &*self.db_pool;
        let entities = entity_store::list_entities(
            db,
            scope,
            EntityType::StaffMember,
            &EntityFilter::default(),
        )
        .await?;
        let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
        let mut bags = metadata_store::group_by_entity(
            metadata_store::list_metadata_for_entities(db, scope, EntityType::StaffMember, &ids)
                .await?,
        );
        let mut entries = load_open_time_entries(db, scope, None).await?;

        entities
            .into_iter()
            .map(|entity| {
                let bag = bags.remove(&entity.id).unwrap_or_default();
                let own_entries = entries.remove(&entity.id).unwrap_or_default();
                project_staff_member(entity, &bag, &own_entries)
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn get_staff_member(
        &self,
        scope: TenantScope,
        staff_id: Uuid,
    ) -> Result<StaffMember, ServiceError> {
        let db = &*self.db_pool;
        let entity =
            entity_store::get_entity_of_type(db, scope, EntityType::StaffMember, staff_id).await?;
        let bag = metadata_store::group_by_entity(
            metadata_store::list_metadata_for_entities(
                db,
                scope,
                EntityType::StaffMember,
                &[staff_id],
            )
            .await?,
        )
        .remove(&staff_id)
        .unwrap_or_default();
        let entries = load_open_time_entries(db, scope, Some(staff_id))
            .await?
            .remove(&staff_id)
            .unwrap_or_default();
        project_staff_member(entity, &bag, &entries)
    }

    /// Creates a staff member with an `EMP-NNNN` employee id and the default
    /// permissions of `input.role`.
    #[instrument(skip(self, input))]
    pub async fn create_staff_member(
        &self,
        scope: TenantScope,
        input: StaffMemberInput,
    ) -> Result<CreationOutcome<StaffMember>, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let now = Utc::now();

        let personal = PersonalInfo {
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            emergency_contact: input.emergency_contact.clone(),
        };

        // The unique (organization, type, code) index rejects an id taken by
        // a concurrent create; the next attempt moves past it
        let mut tried: u64 = 0;
        let mut attempt = 0;
        let (staff_id, employee_id) = loop {
            attempt += 1;
            let txn = db.begin().await?;
            let existing = entity_store::count_entities(&txn, scope, EntityType::StaffMember).await?;
            let number = (existing + 1).max(tried + 1);
            tried = number;
            let employee_id = employee_code(number);

            match insert_staff_member(&txn, scope, &employee_id, &personal, &input, now).await {
                Ok(staff_id) => {
                    txn.commit().await?;
                    break (staff_id, employee_id);
                }
                Err(ServiceError::Conflict(reason)) if attempt < EMPLOYEE_ID_ATTEMPTS => {
                    txn.rollback().await?;
                    warn!(attempt, %employee_id, %reason, "employee id taken, trying the next one");
                }
                Err(e) => {
                    txn.rollback().await?;
                    return Err(e);
                }
            }
        };

        let mut warnings = Vec::new();
        if let Err(e) = metadata_store::create_document(
            db,
            scope,
            EntityType::StaffMember,
            staff_id,
            &PerformanceInfo::default(),
        )
        .await
        {
            warn!(staff_member_id = %staff_id, error = %e, "performance record not written");
            warnings.push(format!("performance record not initialized: {}", e));
        }

        let member = self.get_staff_member(scope, staff_id).await?;
        info!(staff_member_id = %staff_id, %employee_id, "staff member created");

        self.event_sender
            .send_or_log(Event::StaffMemberCreated {
                organization_id: scope.organization_id(),
                staff_member_id: staff_id,
                employee_id,
            })
            .await;

        Ok(CreationOutcome::from_parts(member, warnings))
    }

    /// Replaces the permission set. The role recorded with the set is the
    /// staff member's current role; changing a role elsewhere never rewrites
    /// permissions.
    #[instrument(skip(self, permissions))]
    pub async fn update_permissions(
        &self,
        scope: TenantScope,
        staff_id: Uuid,
        permissions: BTreeSet<Permission>,
    ) -> Result<PermissionSet, ServiceError> {
        let member = self.get_staff_member(scope, staff_id).await?;
        let db = &*self.db_pool;

        let updated = PermissionSet {
            role: member.employment.role,
            permissions,
            assigned_at: Utc::now(),
        };
        match metadata_store::get_metadata(
            db,
            scope,
            EntityType::StaffMember,
            staff_id,
            PermissionSet::KEY,
        )
        .await?
        {
            Some(record) => {
                metadata_store::compare_and_swap(db, scope, &record, updated.to_json()?).await?;
            }
            None => {
                metadata_store::create_document(db, scope, EntityType::StaffMember, staff_id, &updated)
                    .await?;
            }
        }

        info!(staff_member_id = %staff_id, count = updated.permissions.len(), "permissions updated");
        self.event_sender
            .send_or_log(Event::StaffPermissionsChanged {
                organization_id: scope.organization_id(),
                staff_member_id: staff_id,
            })
            .await;
        Ok(updated)
    }

    /// Opens or closes the staff member's time entry and appends an
    /// attendance event.
    ///
    /// Clocking in while an entry is active is a conflict; clocking out with
    /// no active entry is `NotFound`.
    #[instrument(skip(self, request), fields(action = %request.action))]
    pub async fn clock_in_out(
        &self,
        scope: TenantScope,
        staff_id: Uuid,
        request: ClockRequest,
    ) -> Result<ClockResult, ServiceError> {
        request.validate()?;
        let occurred_at = request.occurred_at.unwrap_or_else(Utc::now);

        let txn = self.db_pool.begin().await?;
        let outcome = match request.action {
            ClockAction::ClockIn => self.clock_in(&txn, scope, staff_id, &request, occurred_at).await,
            ClockAction::ClockOut => {
                self.clock_out(&txn, scope, staff_id, &request, occurred_at)
                    .await
            }
        };
        let result = match outcome {
            Ok(result) => {
                txn.commit().await?;
                result
            }
            Err(e) => {
                txn.rollback().await?;
                return Err(e);
            }
        };

        let event = match result.action {
            ClockAction::ClockIn => Event::StaffClockedIn {
                organization_id: scope.organization_id(),
                staff_member_id: staff_id,
                time_entry_id: result.time_entry_id,
                at: occurred_at,
            },
            ClockAction::ClockOut => Event::StaffClockedOut {
                organization_id: scope.organization_id(),
                staff_member_id: staff_id,
                time_entry_id: result.time_entry_id,
                total_hours: result.total_hours.unwrap_or_default(),
                at: occurred_at,
            },
        };
        info!(staff_member_id = %staff_id, time_entry_id = %result.time_entry_id, status = %result.status, "clock event recorded");
        self.event_sender.send_or_log(event).await;
        Ok(result)
    }

    async fn clock_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: TenantScope,
        staff_id: Uuid,
        request: &ClockRequest,
        occurred_at: DateTime<Utc>,
    ) -> Result<ClockResult, ServiceError> {
        let staff =
            entity_store::get_entity_of_type(db, scope, EntityType::StaffMember, staff_id).await?;
        let entries = load_open_time_entries(db, scope, Some(staff_id)).await?;
        if let Some((active_id, _)) = entries
            .get(&staff_id)
            .and_then(|list| list.iter().find(|(_, e)| e.status == TimeEntryStatus::Active))
        {
            return Err(ServiceError::Conflict(format!(
                "Staff member {} is already clocked in (time entry {})",
                staff_id, active_id
            )));
        }

        let details = TimeEntryDetails {
            staff_member_id: staff_id,
            clock_in: occurred_at,
            clock_out: None,
            total_hours: None,
            status: TimeEntryStatus::Active,
            location: request.location.clone(),
            notes: request.notes.clone(),
        };
        let entry = entity_store::create_entity(
            db,
            scope,
            NewEntity::new(
                EntityType::TimeEntry,
                format!("{} {}", staff.entity_name, occurred_at.date_naive()),
            )
            .with_subtype(TimeEntryStatus::Active.to_string())
            .related_to(staff_id),
        )
        .await
        .map_err(|e| match e {
            ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                "Staff member {} is already clocked in",
                staff_id
            )),
            other => other,
        })?;
        metadata_store::create_document(db, scope, EntityType::TimeEntry, entry.id, &details)
            .await?;

        self.record_attendance(db, scope, &staff, entry.id, request, occurred_at, None)
            .await?;

        Ok(ClockResult {
            time_entry_id: entry.id,
            action: ClockAction::ClockIn,
            status: TimeEntryStatus::Active,
            clock_in: occurred_at,
            clock_out: None,
            total_hours: None,
        })
    }

    async fn clock_out<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: TenantScope,
        staff_id: Uuid,
        request: &ClockRequest,
        occurred_at: DateTime<Utc>,
    ) -> Result<ClockResult, ServiceError> {
        let staff =
            entity_store::get_entity_of_type(db, scope, EntityType::StaffMember, staff_id).await?;
        let entries = load_open_time_entries(db, scope, Some(staff_id)).await?;
        let (entry_id, mut details) = entries
            .get(&staff_id)
            .and_then(|list| {
                list.iter()
                    .find(|(_, e)| e.status == TimeEntryStatus::Active)
                    .cloned()
            })
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No active time entry for staff member {}",
                    staff_id
                ))
            })?;

        if occurred_at < details.clock_in {
            return Err(ServiceError::InvalidInput(format!(
                "Clock-out time {} is before clock-in time {}",
                occurred_at, details.clock_in
            )));
        }

        details.complete(occurred_at);
        if let Some(notes) = &request.notes {
            details.notes = Some(notes.clone());
        }
        metadata_store::update_document(db, scope, EntityType::TimeEntry, entry_id, &details)
            .await?;

        let hours = details.total_hours.unwrap_or_default();
        match metadata_store::get_document::<_, AttendanceTotals>(
            db,
            scope,
            EntityType::StaffMember,
            staff_id,
        )
        .await?
        {
            Some((record, mut totals)) => {
                totals.add_entry(hours, occurred_at);
                metadata_store::compare_and_swap(db, scope, &record, totals.to_json()?).await?;
            }
            None => {
                let mut totals = AttendanceTotals::default();
                totals.add_entry(hours, occurred_at);
                metadata_store::create_document(db, scope, EntityType::StaffMember, staff_id, &totals)
                    .await?;
            }
        }
        entity_store::touch_entity(
            db,
            scope,
            entry_id,
            EntityPatch {
                subtype: Some(TimeEntryStatus::Completed.to_string()),
                ..Default::default()
            },
        )
        .await?;

        self.record_attendance(
            db,
            scope,
            &staff,
            entry_id,
            request,
            occurred_at,
            details.total_hours,
        )
        .await?;

        Ok(ClockResult {
            time_entry_id: entry_id,
            action: ClockAction::ClockOut,
            status: details.status,
            clock_in: details.clock_in,
            clock_out: details.clock_out,
            total_hours: details.total_hours,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_attendance<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: TenantScope,
        staff: &EntityModel,
        time_entry_id: Uuid,
        request: &ClockRequest,
        occurred_at: DateTime<Utc>,
        total_hours: Option<Decimal>,
    ) -> Result<Uuid, ServiceError> {
        let details = AttendanceDetails {
            staff_member_id: staff.id,
            time_entry_id,
            action: request.action,
            occurred_at,
            total_hours,
            location: request.location.clone(),
            notes: request.notes.clone(),
        };
        transactions::record(
            db,
            scope,
            EntityType::AttendanceEvent,
            staff.id,
            &request.action.to_string(),
            format!("{} {}", request.action, staff.entity_name),
            &details,
        )
        .await
    }

    /// Attendance events of one staff member, newest first.
    #[instrument(skip(self))]
    pub async fn get_attendance_history(
        &self,
        scope: TenantScope,
        staff_id: Uuid,
    ) -> Result<Vec<transactions::RecordedTransaction<AttendanceDetails>>, ServiceError> {
        let db = &*self.db_pool;
        entity_store::get_entity_of_type(db, scope, EntityType::StaffMember, staff_id).await?;
        transactions::list_for_subject(db, scope, EntityType::AttendanceEvent, staff_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn create_shift(
        &self,
        scope: TenantScope,
        staff_id: Uuid,
        input: ShiftInput,
    ) -> Result<Shift, ServiceError> {
        input.validate()?;
        if input.ends_at <= input.starts_at {
            return Err(ServiceError::InvalidInput(
                "Shift must end after it starts".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let staff =
            entity_store::get_entity_of_type(db, scope, EntityType::StaffMember, staff_id).await?;

        let details = ShiftDetails {
            staff_member_id: staff_id,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            position: input.position,
            status: ShiftStatus::Scheduled,
            notes: input.notes,
        };

        let txn = self.db_pool.begin().await?;
        let mut new_entity = NewEntity::new(
            EntityType::Shift,
            format!("{} {}", staff.entity_name, details.starts_at.date_naive()),
        )
        .related_to(staff_id);
        if let Some(position) = &details.position {
            new_entity = new_entity.with_subtype(position.clone());
        }
        let entity = entity_store::create_entity(&txn, scope, new_entity).await?;
        metadata_store::create_document(&txn, scope, EntityType::Shift, entity.id, &details)
            .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ShiftScheduled {
                organization_id: scope.organization_id(),
                staff_member_id: staff_id,
                shift_id: entity.id,
            })
            .await;

        Ok(Shift {
            id: entity.id,
            staff_member_id: staff_id,
            scheduled_hours: details.scheduled_hours(),
            details,
        })
    }

    /// Shifts ordered by start time, optionally for one staff member.
    #[instrument(skip(self))]
    pub async fn list_shifts(
        &self,
        scope: TenantScope,
        staff_id: Option<Uuid>,
    ) -> Result<Vec<Shift>, ServiceError> {
        let db = &*self.db_pool;
        let filter = EntityFilter {
            related_entity_id: staff_id,
            ..Default::default()
        };
        let entities = entity_store::list_entities(db, scope, EntityType::Shift, &filter).await?;
        let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
        let mut bags = metadata_store::group_by_entity(
            metadata_store::list_metadata_for_entities(db, scope, EntityType::Shift, &ids).await?,
        );

        let mut shifts = entities
            .into_iter()
            .map(|entity| {
                let bag = bags.remove(&entity.id).unwrap_or_default();
                let details: ShiftDetails = bag.require(entity.id)?;
                Ok(Shift {
                    id: entity.id,
                    staff_member_id: details.staff_member_id,
                    scheduled_hours: details.scheduled_hours(),
                    details,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;
        shifts.sort_by(|a, b| a.details.starts_at.cmp(&b.details.starts_at));
        Ok(shifts)
    }

    #[instrument(skip(self))]
    pub async fn get_staff_analytics(
        &self,
        scope: TenantScope,
    ) -> Result<StaffAnalytics, ServiceError> {
        let members = self.get_staff_members(scope).await?;
        Ok(staff_analytics(&members))
    }
}

/// Aggregates over projected staff members.
pub fn staff_analytics(members: &[StaffMember]) -> StaffAnalytics {
    let mut role_breakdown = BTreeMap::new();
    let mut department_breakdown = BTreeMap::new();
    let mut total_hours_logged = Decimal::ZERO;
    let mut estimated_labor_cost = Decimal::ZERO;
    let mut rate_sum = Decimal::ZERO;
    let mut scores = Vec::new();

    for member in members {
        *role_breakdown.entry(member.employment.role).or_insert(0) += 1;
        *department_breakdown
            .entry(member.employment.department.clone())
            .or_insert(0) += 1;
        total_hours_logged = total_hours_logged.saturating_add(member.total_hours_logged);
        estimated_labor_cost = estimated_labor_cost.saturating_add(
            member
                .total_hours_logged
                .saturating_mul(member.employment.hourly_rate),
        );
        rate_sum = rate_sum.saturating_add(member.employment.hourly_rate);
        if let Some(score) = member.performance_score {
            scores.push(score);
        }
    }

    let mean = |sum: Decimal, count: usize| {
        if count == 0 {
            None
        } else {
            Some((sum / Decimal::from(count as u64)).round_dp(2))
        }
    };

    StaffAnalytics {
        total_staff: members.len(),
        active_staff: members
            .iter()
            .filter(|m| m.employment.status == EmploymentStatus::Active)
            .count(),
        currently_clocked_in: members
            .iter()
            .filter(|m| m.clock_status.is_clocked_in())
            .count(),
        role_breakdown,
        department_breakdown,
        total_hours_logged,
        estimated_labor_cost: estimated_labor_cost.round_dp(2),
        average_hourly_rate: mean(rate_sum, members.len()).unwrap_or_default(),
        average_performance_score: mean(scores.iter().copied().sum(), scores.len()),
    }
}
