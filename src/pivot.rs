// src/pivot.rs
//
// Pivot Builder: two-axis aggregate matrix over scoped records. Rows are
// user members, columns are project members; cells are sparse (absence
// means "no contributing records", never zero). Totals are summed from the
// unrounded cell values so displayed rounding can never drift the grand
// total.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::model::{FieldError, ProjectId, ReportError, TenantSnapshot, UserId};
use crate::period::Period;
use crate::scoping::{Scope, ScopeMode};
use crate::summary::parse_date_param;

// --- Request Shapes ---

#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PivotDimensions {
    #[serde(default)]
    pub rows: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PivotInclude {
    #[serde(default = "default_true")]
    pub row_totals: bool,
    #[serde(default = "default_true")]
    pub column_totals: bool,
    #[serde(default = "default_true")]
    pub grand_total: bool,
}

impl Default for PivotInclude {
    fn default() -> Self {
        Self {
            row_totals: true,
            column_totals: true,
            grand_total: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PivotFilters {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PivotRequest {
    #[serde(default)]
    pub period: Option<String>,
    pub range: DateRange,
    pub dimensions: PivotDimensions,
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub include: Option<PivotInclude>,
    #[serde(default)]
    pub filters: Option<PivotFilters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Hours,
    Amount,
}

impl Metric {
    pub fn parse(value: &str) -> Option<Metric> {
        match value {
            "hours" => Some(Metric::Hours),
            "amount" => Some(Metric::Amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PivotParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub metrics: Vec<Metric>,
    pub include: PivotInclude,
    pub user_filter: Option<UserId>,
}

// --- Response Shapes ---

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MetricValues {
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub hours: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option",
        default
    )]
    pub amount: Option<Decimal>,
}

impl MetricValues {
    fn add_hours(&mut self, hours: Decimal) {
        *self.hours.get_or_insert(Decimal::ZERO) += hours;
    }

    fn add_amount(&mut self, amount: Decimal) {
        *self.amount.get_or_insert(Decimal::ZERO) += amount;
    }

    fn merge(&mut self, other: &MetricValues) {
        if let Some(h) = other.hours {
            self.add_hours(h);
        }
        if let Some(a) = other.amount {
            self.add_amount(a);
        }
    }
}

/// Explicit (row, column) association key. Kept as a struct so absence in
/// the map is unambiguous, per the matrix contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellKey {
    pub row: UserId,
    pub column: ProjectId,
}

impl CellKey {
    /// Wire encoding of the composite key; ids are numeric so `|` cannot
    /// collide.
    pub fn encode(&self) -> String {
        format!("{}|{}", self.row, self.column)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RowMember {
    pub row_id: String,
    pub user_id: UserId,
    pub label: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ColumnMember {
    pub column_id: String,
    pub project_id: ProjectId,
    pub label: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RowTotal {
    pub row_id: String,
    #[serde(flatten)]
    pub metrics: MetricValues,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ColumnTotal {
    pub column_id: String,
    #[serde(flatten)]
    pub metrics: MetricValues,
}

#[derive(Debug, Serialize)]
pub struct PivotTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RowTotal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnTotal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grand: Option<MetricValues>,
}

#[derive(Debug, Serialize)]
pub struct PivotMeta {
    pub scoped: ScopeMode,
}

#[derive(Debug, Serialize)]
pub struct PivotResponse {
    pub rows: Vec<RowMember>,
    pub columns: Vec<ColumnMember>,
    pub cells: BTreeMap<String, MetricValues>,
    pub totals: PivotTotals,
    pub meta: PivotMeta,
}

// --- Validation ---

impl PivotRequest {
    pub fn validate(&self) -> Result<PivotParams, ReportError> {
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
            }
        }

        if let Some(period) = self.period.as_deref() {
            if Period::parse(period).is_none() {
                errors.push(FieldError::new(
                    "period",
                    format!("unsupported period \"{period}\""),
                ));
            }
        }

        if self.dimensions.rows.is_empty() {
            errors.push(FieldError::new(
                "dimensions.rows",
                "at least one row dimension is required",
            ));
        }
        for (i, dim) in self.dimensions.rows.iter().enumerate() {
            if dim != "user" {
                errors.push(FieldError::new(
                    format!("dimensions.rows.{i}"),
                    format!("unsupported row dimension \"{dim}\""),
                ));
            }
        }
        if self.dimensions.columns.is_empty() {
            errors.push(FieldError::new(
                "dimensions.columns",
                "at least one column dimension is required",
            ));
        }
        for (i, dim) in self.dimensions.columns.iter().enumerate() {
            if dim != "project" {
                errors.push(FieldError::new(
                    format!("dimensions.columns.{i}"),
                    format!("unsupported column dimension \"{dim}\""),
                ));
            }
        }

        let metrics = match &self.metrics {
            None => vec![Metric::Hours],
            Some(raw) => {
                let mut parsed = Vec::new();
                for (i, m) in raw.iter().enumerate() {
                    match Metric::parse(m) {
                        Some(metric) => {
                            if !parsed.contains(&metric) {
                                parsed.push(metric);
                            }
                        }
                        None => errors.push(FieldError::new(
                            format!("metrics.{i}"),
                            format!("unsupported metric \"{m}\""),
                        )),
                    }
                }
                if parsed.is_empty() && raw.is_empty() {
                    parsed.push(Metric::Hours);
                }
                parsed
            }
        };

        if !errors.is_empty() {
            return Err(ReportError::Validation(errors));
        }
        Ok(PivotParams {
            from: from.expect("validated"),
            to: to.expect("validated"),
            metrics,
            include: self.include.unwrap_or_default(),
            user_filter: self.filters.as_ref().and_then(|f| f.user_id),
        })
    }
}

// --- Aggregation ---

pub fn build_pivot(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    params: &PivotParams,
) -> PivotResponse {
    let mut cells: BTreeMap<CellKey, MetricValues> = BTreeMap::new();

    if params.metrics.contains(&Metric::Hours) {
        for entry in scope.visible_time_entries(snapshot) {
            if entry.date < params.from || entry.date > params.to {
                continue;
            }
            let Some(user_id) = snapshot.user_for_technician(entry.technician_id) else {
                continue;
            };
            cells
                .entry(CellKey {
                    row: user_id,
                    column: entry.project_id,
                })
                .or_default()
                .add_hours(entry.hours_worked);
        }
    }
    if params.metrics.contains(&Metric::Amount) {
        for entry in scope.visible_expenses(snapshot) {
            if entry.date < params.from || entry.date > params.to {
                continue;
            }
            let Some(user_id) = snapshot.user_for_technician(entry.technician_id) else {
                continue;
            };
            cells
                .entry(CellKey {
                    row: user_id,
                    column: entry.project_id,
                })
                .or_default()
                .add_amount(entry.amount);
        }
    }

    // Axis members present in data, in stable id order.
    let row_ids: BTreeSet<UserId> = cells.keys().map(|k| k.row).collect();
    let column_ids: BTreeSet<ProjectId> = cells.keys().map(|k| k.column).collect();

    let rows: Vec<RowMember> = row_ids
        .iter()
        .map(|&user_id| RowMember {
            row_id: user_id.to_string(),
            user_id,
            label: technician_label(snapshot, user_id),
        })
        .collect();
    let columns: Vec<ColumnMember> = column_ids
        .iter()
        .map(|&project_id| ColumnMember {
            column_id: project_id.to_string(),
            project_id,
            label: snapshot
                .project_name(project_id)
                .unwrap_or("(unknown project)")
                .to_string(),
        })
        .collect();

    // Partial totals are true sums over contributing cells.
    let mut row_totals: BTreeMap<UserId, MetricValues> = BTreeMap::new();
    let mut column_totals: BTreeMap<ProjectId, MetricValues> = BTreeMap::new();
    let mut grand = MetricValues::default();
    for (key, values) in &cells {
        row_totals.entry(key.row).or_default().merge(values);
        column_totals.entry(key.column).or_default().merge(values);
        grand.merge(values);
    }

    let totals = PivotTotals {
        rows: params.include.row_totals.then(|| {
            row_totals
                .into_iter()
                .map(|(user_id, metrics)| RowTotal {
                    row_id: user_id.to_string(),
                    metrics,
                })
                .collect()
        }),
        columns: params.include.column_totals.then(|| {
            column_totals
                .into_iter()
                .map(|(project_id, metrics)| ColumnTotal {
                    column_id: project_id.to_string(),
                    metrics,
                })
                .collect()
        }),
        grand: params.include.grand_total.then_some(grand),
    };

    debug!(
        rows = rows.len(),
        columns = columns.len(),
        cells = cells.len(),
        "pivot aggregation complete"
    );
    PivotResponse {
        rows,
        columns,
        cells: cells
            .into_iter()
            .map(|(key, values)| (key.encode(), values))
            .collect(),
        totals,
        meta: PivotMeta {
            scoped: scope.mode(),
        },
    }
}

fn technician_label(snapshot: &TenantSnapshot, user_id: UserId) -> String {
    snapshot
        .technicians
        .iter()
        .find(|t| t.user_id == user_id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| format!("user {user_id}"))
}
