// src/heatmap.rs
//
// Heatmap Aggregator: per-calendar-day counts of pending/approved items
// for the approval queue. Buckets by the day the record was *created*
// (when it landed on an approver's desk), not the business date the work
// was performed on; summaries use the business date. Days with no
// qualifying record are omitted entirely.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{FieldError, ReportError, TenantSnapshot};
use crate::period::day_key;
use crate::pivot::DateRange;
use crate::scoping::{Scope, ScopeMode};
use crate::summary::parse_date_param;

/// Upper bound on the requested span; keeps the cell count (and the work
/// per request) bounded even for tenant-wide scope.
pub const MAX_HEATMAP_DAYS: i64 = 62;

// --- Request / Response Shapes ---

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeatmapInclude {
    #[serde(default)]
    pub timesheets: bool,
    #[serde(default)]
    pub expenses: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeatmapRequest {
    pub range: DateRange,
    pub include: HeatmapInclude,
}

#[derive(Debug, Clone)]
pub struct HeatmapParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub timesheets: bool,
    pub expenses: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct KindCounts {
    pub pending: u64,
    pub approved: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DayCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timesheets: Option<KindCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expenses: Option<KindCounts>,
    pub total_pending: u64,
}

#[derive(Debug, Serialize)]
pub struct HeatmapMeta {
    pub from: String,
    pub to: String,
    pub scoped: ScopeMode,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub meta: HeatmapMeta,
    pub days: BTreeMap<String, DayCounts>,
}

// --- Validation ---

impl HeatmapRequest {
    pub fn validate(&self) -> Result<HeatmapParams, ReportError> {
        let mut errors = Vec::new();

        let from = parse_date_param("range.from", &self.range.from)
            .map_err(|e| errors.push(e))
            .ok();
        let to = parse_date_param("range.to", &self.range.to)
            .map_err(|e| errors.push(e))
            .ok();
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                errors.push(FieldError::new("range.from", "from must not be after to"));
            } else if (t - f).num_days() + 1 > MAX_HEATMAP_DAYS {
                errors.push(FieldError::new(
                    "range.to",
                    format!("range must not exceed {MAX_HEATMAP_DAYS} days"),
                ));
            }
        }

        if !self.include.timesheets && !self.include.expenses {
            errors.push(FieldError::new(
                "include",
                "at least one of timesheets/expenses must be included",
            ));
        }

        if !errors.is_empty() {
            return Err(ReportError::Validation(errors));
        }
        Ok(HeatmapParams {
            from: from.expect("validated"),
            to: to.expect("validated"),
            timesheets: self.include.timesheets,
            expenses: self.include.expenses,
        })
    }
}

// --- Aggregation ---

pub fn build_heatmap(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    params: &HeatmapParams,
) -> HeatmapResponse {
    let mut days: BTreeMap<NaiveDate, DayCounts> = BTreeMap::new();

    if params.timesheets {
        for entry in scope.visible_time_entries(snapshot) {
            let created = entry.created_at.date_naive();
            if created < params.from || created > params.to {
                continue;
            }
            // Rejected entries sit in neither the pending nor the approved
            // pile, so they alone never surface a day.
            let (pending, approved) = match (entry.status.is_pending(), entry.status.is_approved())
            {
                (true, _) => (1, 0),
                (_, true) => (0, 1),
                _ => continue,
            };
            let day = days.entry(created).or_default();
            let counts = day.timesheets.get_or_insert_with(KindCounts::default);
            counts.pending += pending;
            counts.approved += approved;
            day.total_pending += pending;
        }
    }

    if params.expenses {
        for entry in scope.visible_expenses(snapshot) {
            let created = entry.created_at.date_naive();
            if created < params.from || created > params.to {
                continue;
            }
            let (pending, approved) = match (entry.status.is_pending(), entry.status.is_approved())
            {
                (true, _) => (1, 0),
                (_, true) => (0, 1),
                _ => continue,
            };
            let day = days.entry(created).or_default();
            let counts = day.expenses.get_or_insert_with(KindCounts::default);
            counts.pending += pending;
            counts.approved += approved;
            day.total_pending += pending;
        }
    }

    // An included kind always serializes on an emitted day, even when all
    // of that day's activity came from the other kind.
    for day in days.values_mut() {
        if params.timesheets && day.timesheets.is_none() {
            day.timesheets = Some(KindCounts::default());
        }
        if params.expenses && day.expenses.is_none() {
            day.expenses = Some(KindCounts::default());
        }
    }

    debug!(days = days.len(), "heatmap aggregation complete");
    HeatmapResponse {
        meta: HeatmapMeta {
            from: day_key(params.from),
            to: day_key(params.to),
            scoped: scope.mode(),
        },
        days: days
            .into_iter()
            .map(|(date, counts)| (day_key(date), counts))
            .collect(),
    }
}
