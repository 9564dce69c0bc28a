// src/scoping.rs
//
// Access scoping for report requests. Resolved exactly once per request by
// a pure function of (identity, snapshot, filters); every aggregator then
// filters records through the resulting `Scope` instead of re-checking
// roles. The mode is a closed variant, never a role-name string.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::model::{
    ExpenseEntry, Identity, Permission, ProjectId, ReportError, Role, TechnicianId, TenantSnapshot,
    TimeEntry, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    All,
    Membership,
}

/// Resolved visibility for one request. Under `All` with no narrowing
/// filter the sets are unrestricted; under `Membership` both sets are
/// always concrete.
#[derive(Debug, Clone)]
pub struct Scope {
    mode: ScopeMode,
    technicians: Option<HashSet<TechnicianId>>,
    projects: Option<HashSet<ProjectId>>,
}

impl Scope {
    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn includes_technician(&self, technician_id: TechnicianId) -> bool {
        match &self.technicians {
            Some(set) => set.contains(&technician_id),
            None => true,
        }
    }

    pub fn includes_project(&self, project_id: ProjectId) -> bool {
        match &self.projects {
            Some(set) => set.contains(&project_id),
            None => true,
        }
    }

    pub fn includes_time_entry(&self, entry: &TimeEntry) -> bool {
        self.includes_technician(entry.technician_id) && self.includes_project(entry.project_id)
    }

    pub fn includes_expense(&self, entry: &ExpenseEntry) -> bool {
        self.includes_technician(entry.technician_id) && self.includes_project(entry.project_id)
    }

    pub fn visible_time_entries<'a>(
        &'a self,
        snapshot: &'a TenantSnapshot,
    ) -> impl Iterator<Item = &'a TimeEntry> + 'a {
        snapshot
            .time_entries
            .iter()
            .filter(move |e| self.includes_time_entry(e))
    }

    pub fn visible_expenses<'a>(
        &'a self,
        snapshot: &'a TenantSnapshot,
    ) -> impl Iterator<Item = &'a ExpenseEntry> + 'a {
        snapshot
            .expense_entries
            .iter()
            .filter(move |e| self.includes_expense(e))
    }
}

fn has_tenant_wide_read(identity: &Identity) -> bool {
    identity.role == Role::Owner || identity.has_permission(Permission::ViewAllReports)
}

/// Resolves the caller's visibility.
///
/// Owners (or holders of the tenant-wide read permission) see everything;
/// a `user_id` filter only ever narrows. Everyone else sees the union of
/// technicians across their member projects - peers included - and a
/// filter pointing outside that set is dropped rather than honored, so a
/// crafted filter can neither widen visibility nor turn into an error.
/// A caller without any report permission is refused outright.
pub fn resolve_scope(
    identity: &Identity,
    snapshot: &TenantSnapshot,
    user_filter: Option<UserId>,
) -> Result<Scope, ReportError> {
    if has_tenant_wide_read(identity) {
        let technicians = user_filter.map(|uid| snapshot.technicians_for_user(uid));
        debug!(
            user_id = identity.user_id,
            narrowed = technicians.is_some(),
            "resolved tenant-wide report scope"
        );
        return Ok(Scope {
            mode: ScopeMode::All,
            technicians,
            projects: None,
        });
    }

    if !identity.has_permission(Permission::ViewReports) {
        return Err(ReportError::Forbidden(format!(
            "user {} may not view reports",
            identity.user_id
        )));
    }

    let member_projects: HashSet<ProjectId> = snapshot
        .memberships
        .iter()
        .filter(|m| m.user_id == identity.user_id && m.has_any_role())
        .map(|m| m.project_id)
        .collect();

    // Membership grants visibility into peers: every technician on any of
    // the caller's projects, not just the caller's own record.
    let member_users: HashSet<UserId> = snapshot
        .memberships
        .iter()
        .filter(|m| member_projects.contains(&m.project_id) && m.has_any_role())
        .map(|m| m.user_id)
        .collect();
    let mut technicians: HashSet<TechnicianId> = snapshot
        .technicians
        .iter()
        .filter(|t| member_users.contains(&t.user_id))
        .map(|t| t.id)
        .collect();

    if let Some(uid) = user_filter {
        let requested = snapshot.technicians_for_user(uid);
        let narrowed: HashSet<TechnicianId> =
            technicians.intersection(&requested).copied().collect();
        if narrowed.is_empty() {
            warn!(
                caller = identity.user_id,
                filter_user = uid,
                "user_id filter outside membership scope; ignoring"
            );
        } else {
            technicians = narrowed;
        }
    }

    debug!(
        user_id = identity.user_id,
        projects = member_projects.len(),
        technicians = technicians.len(),
        "resolved membership report scope"
    );
    Ok(Scope {
        mode: ScopeMode::Membership,
        technicians: Some(technicians),
        projects: Some(member_projects),
    })
}

/// Heatmap gate: approval-queue reports require approval authority, no
/// matter how wide the caller's read scope is.
pub fn require_approval_authority(identity: &Identity) -> Result<(), ReportError> {
    if identity.role == Role::Owner || identity.has_permission(Permission::ApproveEntries) {
        Ok(())
    } else {
        Err(ReportError::Forbidden(format!(
            "user {} lacks approval authority",
            identity.user_id
        )))
    }
}
