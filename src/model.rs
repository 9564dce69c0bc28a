// src/model.rs
//
// Core data model consumed by the reporting engine. All entities here are
// owned and mutated by the CRUD layer; within one report request the engine
// sees them as an immutable `TenantSnapshot`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

// --- Id Aliases ---

pub type EntryId = u64;
pub type TechnicianId = u64;
pub type UserId = u64;
pub type ProjectId = u64;
pub type TaskId = u64;
pub type LocationId = u64;
pub type TenantId = String;

// --- Statuses ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEntryStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Closed,
}

impl TimeEntryStatus {
    /// Awaiting an approval decision.
    pub fn is_pending(self) -> bool {
        matches!(self, TimeEntryStatus::Draft | TimeEntryStatus::Submitted)
    }

    /// Positively decided. Closed entries were approved before being locked
    /// for payroll, so they stay in the approved partition.
    pub fn is_approved(self) -> bool {
        matches!(self, TimeEntryStatus::Approved | TimeEntryStatus::Closed)
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, TimeEntryStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeEntryStatus::Draft => "draft",
            TimeEntryStatus::Submitted => "submitted",
            TimeEntryStatus::Approved => "approved",
            TimeEntryStatus::Rejected => "rejected",
            TimeEntryStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Submitted,
    FinanceReview,
    FinanceApproved,
    Rejected,
    Paid,
}

impl ExpenseStatus {
    /// Awaiting a finance decision.
    pub fn is_pending(self) -> bool {
        matches!(self, ExpenseStatus::Submitted | ExpenseStatus::FinanceReview)
    }

    pub fn is_approved(self) -> bool {
        matches!(self, ExpenseStatus::FinanceApproved | ExpenseStatus::Paid)
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, ExpenseStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseStatus::Submitted => "submitted",
            ExpenseStatus::FinanceReview => "finance_review",
            ExpenseStatus::FinanceApproved => "finance_approved",
            ExpenseStatus::Rejected => "rejected",
            ExpenseStatus::Paid => "paid",
        }
    }
}

// --- Records ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    pub technician_id: TechnicianId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub hours_worked: Decimal,
    pub status: TimeEntryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: EntryId,
    pub technician_id: TechnicianId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
}

// --- Membership & Identity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    None,
    Member,
    Manager,
}

impl MembershipRole {
    pub fn grants_access(self) -> bool {
        !matches!(self, MembershipRole::None)
    }
}

/// One row per (project, user). A user with any non-`none` role on a project
/// counts as a member of that project for visibility purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub project_role: MembershipRole,
    pub expense_role: MembershipRole,
    pub finance_role: MembershipRole,
}

impl ProjectMembership {
    pub fn has_any_role(&self) -> bool {
        self.project_role.grants_access()
            || self.expense_role.grants_access()
            || self.finance_role.grants_access()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Manager,
    Technician,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read reports within the caller's membership scope.
    ViewReports,
    /// Read reports tenant-wide, regardless of membership.
    ViewAllReports,
    /// Act on the approval queue (required for the heatmap).
    ApproveEntries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: HashSet<Permission>,
}

impl Identity {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

// --- Request-level errors shared by the engine modules ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("request validation failed ({} field error(s))", .0.len())]
    Validation(Vec<FieldError>),
    #[error("permission denied: {0}")]
    Forbidden(String),
}

impl ReportError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::Validation(vec![FieldError::new(field, message)])
    }
}

// --- Tenant Snapshot ---

/// Immutable view of one tenant's records for the duration of a request.
/// Produced by the storage collaborator; the engine never mutates it.
#[derive(Debug, Clone, Default)]
pub struct TenantSnapshot {
    pub tenant_id: TenantId,
    pub technicians: Vec<Technician>,
    pub projects: Vec<Project>,
    pub memberships: Vec<ProjectMembership>,
    pub identities: HashMap<UserId, Identity>,
    pub time_entries: Vec<TimeEntry>,
    pub expense_entries: Vec<ExpenseEntry>,
}

impl TenantSnapshot {
    pub fn identity(&self, user_id: UserId) -> Option<&Identity> {
        self.identities.get(&user_id)
    }

    pub fn project_name(&self, project_id: ProjectId) -> Option<&str> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.name.as_str())
    }

    pub fn technician(&self, technician_id: TechnicianId) -> Option<&Technician> {
        self.technicians.iter().find(|t| t.id == technician_id)
    }

    /// User owning the given technician record, if the technician exists.
    pub fn user_for_technician(&self, technician_id: TechnicianId) -> Option<UserId> {
        self.technician(technician_id).map(|t| t.user_id)
    }

    /// Technician records owned by the given user (normally exactly one).
    pub fn technicians_for_user(&self, user_id: UserId) -> HashSet<TechnicianId> {
        self.technicians
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.id)
            .collect()
    }
}

// --- Snapshot Store Port ---

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),
}

/// Storage collaborator seam: hands the engine a consistent per-request
/// snapshot of one tenant's records.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn snapshot(&self, tenant_id: &str) -> Result<Arc<TenantSnapshot>, SnapshotError>;
}

pub struct InMemorySnapshotStore {
    tenants: HashMap<TenantId, Arc<TenantSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            tenants: HashMap::new(),
        }
    }

    pub fn insert(&mut self, snapshot: TenantSnapshot) {
        self.tenants
            .insert(snapshot.tenant_id.clone(), Arc::new(snapshot));
    }

    /// Seeds a small runnable tenant so the binary answers report requests
    /// out of the box: one owner, two technicians sharing a project, and a
    /// handful of December entries.
    pub fn with_demo_tenant() -> Self {
        let mut store = Self::new();
        store.insert(demo_tenant("demo"));
        store
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn snapshot(&self, tenant_id: &str) -> Result<Arc<TenantSnapshot>, SnapshotError> {
        self.tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| SnapshotError::UnknownTenant(tenant_id.to_string()))
    }
}

fn demo_tenant(tenant_id: &str) -> TenantSnapshot {
    use rust_decimal_macros::dec;

    let d = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("demo tenant date literal is valid")
    };
    let ts = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .expect("demo tenant timestamp literal is valid")
            .with_timezone(&Utc)
    };
    let membership = |project_id, user_id| ProjectMembership {
        project_id,
        user_id,
        project_role: MembershipRole::Member,
        expense_role: MembershipRole::Member,
        finance_role: MembershipRole::None,
    };

    let mut identities = HashMap::new();
    identities.insert(
        1,
        Identity {
            user_id: 1,
            role: Role::Owner,
            permissions: HashSet::from([
                Permission::ViewReports,
                Permission::ViewAllReports,
                Permission::ApproveEntries,
            ]),
        },
    );
    identities.insert(
        2,
        Identity {
            user_id: 2,
            role: Role::Technician,
            permissions: HashSet::from([Permission::ViewReports]),
        },
    );
    identities.insert(
        3,
        Identity {
            user_id: 3,
            role: Role::Technician,
            permissions: HashSet::from([Permission::ViewReports]),
        },
    );

    TenantSnapshot {
        tenant_id: tenant_id.to_string(),
        technicians: vec![
            Technician {
                id: 2,
                user_id: 2,
                name: "Alice Moreau".to_string(),
                email: "alice@example.com".to_string(),
                is_active: true,
            },
            Technician {
                id: 3,
                user_id: 3,
                name: "Bram Okafor".to_string(),
                email: "bram@example.com".to_string(),
                is_active: true,
            },
        ],
        projects: vec![
            Project {
                id: 10,
                name: "Harbor Retrofit".to_string(),
            },
            Project {
                id: 20,
                name: "Depot Wiring".to_string(),
            },
        ],
        memberships: vec![
            membership(10, 2),
            membership(10, 3),
            membership(20, 3),
        ],
        identities,
        time_entries: vec![
            TimeEntry {
                id: 100,
                technician_id: 2,
                project_id: 10,
                task_id: 1,
                location_id: 1,
                date: d("2025-12-01"),
                hours_worked: dec!(8),
                status: TimeEntryStatus::Approved,
                created_at: ts("2025-12-01T17:00:00Z"),
            },
            TimeEntry {
                id: 101,
                technician_id: 3,
                project_id: 10,
                task_id: 1,
                location_id: 1,
                date: d("2025-12-01"),
                hours_worked: dec!(6),
                status: TimeEntryStatus::Submitted,
                created_at: ts("2025-12-01T18:30:00Z"),
            },
            TimeEntry {
                id: 102,
                technician_id: 3,
                project_id: 20,
                task_id: 2,
                location_id: 2,
                date: d("2025-12-02"),
                hours_worked: dec!(1.5),
                status: TimeEntryStatus::Approved,
                created_at: ts("2025-12-02T16:45:00Z"),
            },
        ],
        expense_entries: vec![ExpenseEntry {
            id: 200,
            technician_id: 2,
            project_id: 10,
            date: d("2025-12-01"),
            amount: dec!(42.50),
            category: "travel".to_string(),
            status: ExpenseStatus::Submitted,
            created_at: ts("2025-12-01T17:10:00Z"),
        }],
    }
}
