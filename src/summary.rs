// src/summary.rs
//
// Summary Aggregator: groups scoped records by period key crossed with an
// optional (user, project) dimension tuple and totals them. Combinations
// absent from the data are omitted, never zero-filled; output order is
// deterministic (period key, then user, then project).

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{FieldError, ProjectId, ReportError, TenantSnapshot, UserId};
use crate::period::Period;
use crate::scoping::Scope;

// --- Request / Response Shapes ---

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub group_by: Vec<String>,
    pub period: String,
    /// "timesheets" (default) or "expenses".
    #[serde(default)]
    pub entity: Option<String>,
    /// Narrowing filter, subject to the scoping rule.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEntity {
    Timesheets,
    Expenses,
}

impl ReportEntity {
    pub fn parse(value: &str) -> Option<ReportEntity> {
        match value {
            "timesheets" => Some(ReportEntity::Timesheets),
            "expenses" => Some(ReportEntity::Expenses),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub group_user: bool,
    pub group_project: bool,
    pub period: Period,
    pub entity: ReportEntity,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SummaryRow {
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_minutes: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub total_amount: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub approved_amount: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub pending_amount: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub rejected_amount: Option<Decimal>,
    pub total_entries: u64,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub rows: Vec<SummaryRow>,
}

// --- Validation ---

pub fn parse_date_param(field: &str, value: &str) -> Result<NaiveDate, FieldError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| FieldError::new(field, format!("invalid date \"{value}\", expected YYYY-MM-DD")))
}

impl SummaryRequest {
    pub fn validate(&self) -> Result<SummaryParams, ReportError> {
        let mut errors = Vec::new();

        let from = parse_date_param("from", &self.from).map_err(|e| errors.push(e)).ok();
        let to = parse_date_param("to", &self.to).map_err(|e| errors.push(e)).ok();
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                errors.push(FieldError::new("from", "from must not be after to"));
            }
        }

        let period = match Period::parse(&self.period) {
            Some(p) => Some(p),
            None => {
                errors.push(FieldError::new(
                    "period",
                    format!("unsupported period \"{}\"", self.period),
                ));
                None
            }
        };

        let mut group_user = false;
        let mut group_project = false;
        for (i, dim) in self.group_by.iter().enumerate() {
            match dim.as_str() {
                "user" => group_user = true,
                "project" => group_project = true,
                other => errors.push(FieldError::new(
                    format!("group_by.{i}"),
                    format!("unsupported group_by value \"{other}\""),
                )),
            }
        }

        let entity = match self.entity.as_deref() {
            None => Some(ReportEntity::Timesheets),
            Some(value) => match ReportEntity::parse(value) {
                Some(e) => Some(e),
                None => {
                    errors.push(FieldError::new(
                        "entity",
                        format!("unsupported entity \"{value}\""),
                    ));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(ReportError::Validation(errors));
        }
        Ok(SummaryParams {
            from: from.expect("validated"),
            to: to.expect("validated"),
            group_user,
            group_project,
            period: period.expect("validated"),
            entity: entity.expect("validated"),
            user_id: self.user_id,
        })
    }
}

// --- Aggregation ---

type GroupKey = (String, Option<UserId>, Option<ProjectId>);

#[derive(Default)]
struct TimeAcc {
    total: i64,
    approved: i64,
    pending: i64,
    rejected: i64,
    entries: u64,
}

struct ExpenseAcc {
    total: Decimal,
    approved: Decimal,
    pending: Decimal,
    rejected: Decimal,
    entries: u64,
}

impl Default for ExpenseAcc {
    fn default() -> Self {
        Self {
            total: dec!(0),
            approved: dec!(0),
            pending: dec!(0),
            rejected: dec!(0),
            entries: 0,
        }
    }
}

/// Exact minutes for a decimal hour figure. Hours are recorded at minute
/// granularity, so the product is integral.
pub fn minutes_of(hours: Decimal) -> i64 {
    (hours * dec!(60)).round().to_i64().unwrap_or(0)
}

pub fn summarize(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    params: &SummaryParams,
) -> SummaryResponse {
    let rows = match params.entity {
        ReportEntity::Timesheets => summarize_timesheets(snapshot, scope, params),
        ReportEntity::Expenses => summarize_expenses(snapshot, scope, params),
    };
    debug!(
        rows = rows.len(),
        entity = ?params.entity,
        "summary aggregation complete"
    );
    SummaryResponse { rows }
}

fn group_key(
    snapshot: &TenantSnapshot,
    params: &SummaryParams,
    technician_id: u64,
    project_id: ProjectId,
    date: NaiveDate,
) -> GroupKey {
    let user = if params.group_user {
        snapshot.user_for_technician(technician_id)
    } else {
        None
    };
    let project = params.group_project.then_some(project_id);
    (params.period.key(date), user, project)
}

fn summarize_timesheets(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    params: &SummaryParams,
) -> Vec<SummaryRow> {
    // BTreeMap keeps output deterministic: period key, then user, then project.
    let mut groups: BTreeMap<GroupKey, TimeAcc> = BTreeMap::new();
    for entry in scope.visible_time_entries(snapshot) {
        if entry.date < params.from || entry.date > params.to {
            continue;
        }
        let key = group_key(snapshot, params, entry.technician_id, entry.project_id, entry.date);
        let acc = groups.entry(key).or_default();
        let minutes = minutes_of(entry.hours_worked);
        acc.total += minutes;
        if entry.status.is_approved() {
            acc.approved += minutes;
        } else if entry.status.is_pending() {
            acc.pending += minutes;
        } else if entry.status.is_rejected() {
            acc.rejected += minutes;
        }
        acc.entries += 1;
    }

    groups
        .into_iter()
        .map(|((period, user_id, project_id), acc)| SummaryRow {
            period,
            user_id,
            project_id,
            project_name: project_id.and_then(|p| snapshot.project_name(p).map(String::from)),
            total_minutes: Some(acc.total),
            approved_minutes: Some(acc.approved),
            pending_minutes: Some(acc.pending),
            rejected_minutes: Some(acc.rejected),
            total_amount: None,
            approved_amount: None,
            pending_amount: None,
            rejected_amount: None,
            total_entries: acc.entries,
        })
        .collect()
}

fn summarize_expenses(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    params: &SummaryParams,
) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<GroupKey, ExpenseAcc> = BTreeMap::new();
    for entry in scope.visible_expenses(snapshot) {
        if entry.date < params.from || entry.date > params.to {
            continue;
        }
        let key = group_key(snapshot, params, entry.technician_id, entry.project_id, entry.date);
        let acc = groups.entry(key).or_default();
        acc.total += entry.amount;
        if entry.status.is_approved() {
            acc.approved += entry.amount;
        } else if entry.status.is_pending() {
            acc.pending += entry.amount;
        } else if entry.status.is_rejected() {
            acc.rejected += entry.amount;
        }
        acc.entries += 1;
    }

    groups
        .into_iter()
        .map(|((period, user_id, project_id), acc)| SummaryRow {
            period,
            user_id,
            project_id,
            project_name: project_id.and_then(|p| snapshot.project_name(p).map(String::from)),
            total_minutes: None,
            approved_minutes: None,
            pending_minutes: None,
            rejected_minutes: None,
            total_amount: Some(acc.total),
            approved_amount: Some(acc.approved),
            pending_amount: Some(acc.pending),
            rejected_amount: Some(acc.rejected),
            total_entries: acc.entries,
        })
        .collect()
}
