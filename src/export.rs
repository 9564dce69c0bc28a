// src/export.rs
//
// Export Formatter: renders scoped raw rows, summaries, or a pivot into a
// downloadable table file. Rows flow through a lazy single-pass producer;
// the CSV body is streamed to the client chunk by chunk so a tenant-wide
// export never holds the formatted file in memory. The xlsx body is a zip
// archive (leading bytes `PK`) whose worksheet XML is written while the
// same producer is drained.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{self, Cursor, Write};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::model::{FieldError, ReportError, TenantSnapshot, UserId};
use crate::pivot::{
    build_pivot, DateRange, PivotDimensions, PivotFilters, PivotInclude, PivotParams, PivotRequest,
    PivotResponse,
};
use crate::scoping::Scope;
use crate::summary::{parse_date_param, summarize, ReportEntity, SummaryParams, SummaryRequest};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=UTF-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// --- Request Shapes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<ExportFormat> {
        match value {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_CONTENT_TYPE,
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Timesheets,
    Expenses,
    TimesheetsSummary,
    ExpensesSummary,
    TimesheetsPivot,
}

impl ReportKind {
    pub fn parse(value: &str) -> Option<ReportKind> {
        match value {
            "timesheets" => Some(ReportKind::Timesheets),
            "expenses" => Some(ReportKind::Expenses),
            "timesheets_summary" => Some(ReportKind::TimesheetsSummary),
            "expenses_summary" => Some(ReportKind::ExpensesSummary),
            "timesheets_pivot" => Some(ReportKind::TimesheetsPivot),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Timesheets => "timesheets",
            ReportKind::Expenses => "expenses",
            ReportKind::TimesheetsSummary => "timesheets_summary",
            ReportKind::ExpensesSummary => "expenses_summary",
            ReportKind::TimesheetsPivot => "timesheets_pivot",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub report: String,
    pub format: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub range: Option<DateRange>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub dimensions: Option<PivotDimensions>,
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub include: Option<PivotInclude>,
    #[serde(default)]
    pub filters: Option<PivotFilters>,
}

#[derive(Debug, Clone)]
pub enum ExportJob {
    RawTimesheets,
    RawExpenses,
    Summary(SummaryParams),
    Pivot(PivotParams),
}

#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub kind: ReportKind,
    pub format: ExportFormat,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub job: ExportJob,
    pub user_filter: Option<UserId>,
}

impl ExportRequest {
    /// Date range comes either from top-level `from`/`to` or a nested
    /// `range` body, so callers of the report endpoints can re-post the
    /// same shape with a `format` added.
    fn range_fields(&self) -> (Option<&str>, Option<&str>) {
        match (&self.from, &self.to, &self.range) {
            (Some(f), Some(t), _) => (Some(f.as_str()), Some(t.as_str())),
            (_, _, Some(range)) => (Some(range.from.as_str()), Some(range.to.as_str())),
            (f, t, None) => (f.as_deref(), t.as_deref()),
        }
    }

    pub fn validate(&self) -> Result<ExportPlan, ReportError> {
        let mut errors = Vec::new();

        let kind = match ReportKind::parse(&self.report) {
            Some(k) => Some(k),
            None => {
                errors.push(FieldError::new(
                    "report",
                    format!("unsupported report \"{}\"", self.report),
                ));
                None
            }
        };
        let format = match ExportFormat::parse(&self.format) {
            Some(f) => Some(f),
            None => {
                errors.push(FieldError::new(
                    "format",
                    format!("unsupported format \"{}\"", self.format),
                ));
                None
            }
        };

        let (from_raw, to_raw) = self.range_fields();
        let from = match from_raw {
            Some(raw) => parse_date_param("from", raw).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push(FieldError::new("from", "missing date range start"));
                None
            }
        };
        let to = match to_raw {
            Some(raw) => parse_date_param("to", raw).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push(FieldError::new("to", "missing date range end"));
                None
            }
        };
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                errors.push(FieldError::new("from", "from must not be after to"));
            }
        }

        let (Some(kind), Some(format), Some(from), Some(to)) = (kind, format, from, to) else {
            return Err(ReportError::Validation(errors));
        };
        if !errors.is_empty() {
            return Err(ReportError::Validation(errors));
        }

        let user_filter = self.filters.as_ref().and_then(|f| f.user_id);
        let job = match kind {
            ReportKind::Timesheets => ExportJob::RawTimesheets,
            ReportKind::Expenses => ExportJob::RawExpenses,
            ReportKind::TimesheetsSummary | ReportKind::ExpensesSummary => {
                let entity = if kind == ReportKind::TimesheetsSummary {
                    "timesheets"
                } else {
                    "expenses"
                };
                let group_by = if self.group_by.is_empty() {
                    vec!["user".to_string(), "project".to_string()]
                } else {
                    self.group_by.clone()
                };
                let request = SummaryRequest {
                    from: from.to_string(),
                    to: to.to_string(),
                    group_by,
                    period: self.period.clone().unwrap_or_else(|| "day".to_string()),
                    entity: Some(entity.to_string()),
                    user_id: user_filter,
                };
                ExportJob::Summary(request.validate()?)
            }
            ReportKind::TimesheetsPivot => {
                let request = PivotRequest {
                    period: self.period.clone(),
                    range: DateRange {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                    dimensions: self.dimensions.clone().unwrap_or(PivotDimensions {
                        rows: vec!["user".to_string()],
                        columns: vec!["project".to_string()],
                    }),
                    metrics: self.metrics.clone(),
                    include: self.include,
                    filters: self.filters.clone(),
                };
                ExportJob::Pivot(request.validate()?)
            }
        };

        Ok(ExportPlan {
            kind,
            format,
            from,
            to,
            job,
            user_filter,
        })
    }
}

// --- Row Producer ---

/// Finite, single-pass, non-restartable row source feeding a formatter.
pub struct ExportRows {
    pub header: Vec<String>,
    pub rows: Box<dyn Iterator<Item = Vec<String>> + Send + 'static>,
}

pub fn build_rows(snapshot: &TenantSnapshot, scope: &Scope, plan: &ExportPlan) -> ExportRows {
    match &plan.job {
        ExportJob::RawTimesheets => raw_timesheet_rows(snapshot, scope, plan.from, plan.to),
        ExportJob::RawExpenses => raw_expense_rows(snapshot, scope, plan.from, plan.to),
        ExportJob::Summary(params) => summary_rows(snapshot, scope, params),
        ExportJob::Pivot(params) => pivot_rows(build_pivot(snapshot, scope, params)),
    }
}

fn raw_timesheet_rows(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    from: NaiveDate,
    to: NaiveDate,
) -> ExportRows {
    struct Row {
        date: NaiveDate,
        technician: String,
        project: String,
        task_id: u64,
        hours: Decimal,
        status: &'static str,
    }

    let mut rows: Vec<Row> = scope
        .visible_time_entries(snapshot)
        .filter(|e| e.date >= from && e.date <= to)
        .map(|e| Row {
            date: e.date,
            technician: technician_name(snapshot, e.technician_id),
            project: project_label(snapshot, e.project_id),
            task_id: e.task_id,
            hours: e.hours_worked,
            status: e.status.as_str(),
        })
        .collect();
    rows.sort_by(|a, b| (a.date, &a.technician).cmp(&(b.date, &b.technician)));

    ExportRows {
        header: str_row(&["date", "technician", "project", "task_id", "hours", "status"]),
        rows: Box::new(rows.into_iter().map(|r| {
            vec![
                r.date.to_string(),
                r.technician,
                r.project,
                r.task_id.to_string(),
                r.hours.to_string(),
                r.status.to_string(),
            ]
        })),
    }
}

fn raw_expense_rows(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    from: NaiveDate,
    to: NaiveDate,
) -> ExportRows {
    struct Row {
        date: NaiveDate,
        technician: String,
        project: String,
        category: String,
        amount: Decimal,
        status: &'static str,
    }

    let mut rows: Vec<Row> = scope
        .visible_expenses(snapshot)
        .filter(|e| e.date >= from && e.date <= to)
        .map(|e| Row {
            date: e.date,
            technician: technician_name(snapshot, e.technician_id),
            project: project_label(snapshot, e.project_id),
            category: e.category.clone(),
            amount: e.amount,
            status: e.status.as_str(),
        })
        .collect();
    rows.sort_by(|a, b| (a.date, &a.technician).cmp(&(b.date, &b.technician)));

    ExportRows {
        header: str_row(&["date", "technician", "project", "category", "amount", "status"]),
        rows: Box::new(rows.into_iter().map(|r| {
            vec![
                r.date.to_string(),
                r.technician,
                r.project,
                r.category,
                r.amount.to_string(),
                r.status.to_string(),
            ]
        })),
    }
}

fn summary_rows(snapshot: &TenantSnapshot, scope: &Scope, params: &SummaryParams) -> ExportRows {
    let response = summarize(snapshot, scope, params);
    let header = match params.entity {
        ReportEntity::Timesheets => str_row(&[
            "period",
            "user_id",
            "project_id",
            "project_name",
            "total_minutes",
            "approved_minutes",
            "pending_minutes",
            "rejected_minutes",
            "total_entries",
        ]),
        ReportEntity::Expenses => str_row(&[
            "period",
            "user_id",
            "project_id",
            "project_name",
            "total_amount",
            "approved_amount",
            "pending_amount",
            "rejected_amount",
            "total_entries",
        ]),
    };
    let entity = params.entity;
    ExportRows {
        header,
        rows: Box::new(response.rows.into_iter().map(move |row| match entity {
            ReportEntity::Timesheets => vec![
                row.period,
                opt_str(row.user_id),
                opt_str(row.project_id),
                row.project_name.unwrap_or_default(),
                opt_str(row.total_minutes),
                opt_str(row.approved_minutes),
                opt_str(row.pending_minutes),
                opt_str(row.rejected_minutes),
                row.total_entries.to_string(),
            ],
            ReportEntity::Expenses => vec![
                row.period,
                opt_str(row.user_id),
                opt_str(row.project_id),
                row.project_name.unwrap_or_default(),
                opt_str(row.total_amount),
                opt_str(row.approved_amount),
                opt_str(row.pending_amount),
                opt_str(row.rejected_amount),
                row.total_entries.to_string(),
            ],
        })),
    }
}

/// Grid rendering of a pivot: one line per row member, one column per
/// column member, optional per-row totals and a closing totals line.
fn pivot_rows(pivot: PivotResponse) -> ExportRows {
    let mut header = vec!["user".to_string()];
    header.extend(pivot.columns.iter().map(|c| c.label.clone()));
    let with_row_totals = pivot.totals.rows.is_some();
    if with_row_totals {
        header.push("total".to_string());
    }

    let column_ids: Vec<String> = pivot.columns.iter().map(|c| c.column_id.clone()).collect();
    let mut lines: Vec<Vec<String>> = Vec::with_capacity(pivot.rows.len() + 1);
    for row in &pivot.rows {
        let mut line = vec![row.label.clone()];
        for column_id in &column_ids {
            let key = format!("{}|{}", row.row_id, column_id);
            line.push(
                pivot
                    .cells
                    .get(&key)
                    .map(metric_cell)
                    .unwrap_or_default(),
            );
        }
        if let Some(row_totals) = &pivot.totals.rows {
            line.push(
                row_totals
                    .iter()
                    .find(|t| t.row_id == row.row_id)
                    .map(|t| metric_cell(&t.metrics))
                    .unwrap_or_default(),
            );
        }
        lines.push(line);
    }

    if pivot.totals.columns.is_some() || pivot.totals.grand.is_some() {
        let mut line = vec!["total".to_string()];
        for column_id in &column_ids {
            line.push(
                pivot
                    .totals
                    .columns
                    .as_ref()
                    .and_then(|totals| totals.iter().find(|t| &t.column_id == column_id))
                    .map(|t| metric_cell(&t.metrics))
                    .unwrap_or_default(),
            );
        }
        if with_row_totals {
            line.push(
                pivot
                    .totals
                    .grand
                    .as_ref()
                    .map(metric_cell)
                    .unwrap_or_default(),
            );
        }
        lines.push(line);
    }

    ExportRows {
        header,
        rows: Box::new(lines.into_iter()),
    }
}

/// First present metric wins the grid cell; the JSON endpoint carries the
/// full metric set.
fn metric_cell(values: &crate::pivot::MetricValues) -> String {
    values
        .hours
        .or(values.amount)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn technician_name(snapshot: &TenantSnapshot, technician_id: u64) -> String {
    snapshot
        .technician(technician_id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| format!("technician {technician_id}"))
}

fn project_label(snapshot: &TenantSnapshot, project_id: u64) -> String {
    snapshot
        .project_name(project_id)
        .map(String::from)
        .unwrap_or_else(|| format!("project {project_id}"))
}

fn str_row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

fn opt_str<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("export I/O failed: {0}")]
    Io(#[from] io::Error),
}

// --- CSV ---

/// Drains the producer into any writer, one record at a time.
pub fn write_csv<W: Write>(rows: ExportRows, writer: W) -> io::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&rows.header)?;
    for row in rows.rows {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()
}

/// `io::Write` sink that hands each chunk to the response channel. A
/// closed receiver (client went away) surfaces as `BrokenPipe`, which
/// stops the producer.
struct ChannelWriter {
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "export receiver closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streams the CSV rendition without materializing it; the writer task
/// runs on the blocking pool and backpressures on the channel.
pub fn csv_stream_body(rows: ExportRows) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(16);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = write_csv(rows, ChannelWriter { tx }) {
            debug!("csv export stream ended early: {e}");
        }
    });
    Body::from_stream(ReceiverStream::new(rx))
}

// --- XLSX ---

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Report" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_sheet_row<W: Write>(writer: &mut W, cells: &[String]) -> io::Result<()> {
    writer.write_all(b"<row>")?;
    for cell in cells {
        if !cell.is_empty() && cell.parse::<f64>().is_ok() {
            write!(writer, "<c t=\"n\"><v>{cell}</v></c>")?;
        } else {
            write!(
                writer,
                "<c t=\"inlineStr\"><is><t>{}</t></is></c>",
                xml_escape(cell)
            )?;
        }
    }
    writer.write_all(b"</row>")
}

/// Renders the producer as a minimal SpreadsheetML package. The worksheet
/// part is written cell by cell while the iterator is drained; only the
/// compressed archive is held in memory (zip needs a seekable sink for
/// its central directory).
pub fn xlsx_bytes(rows: ExportRows) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS_XML.as_bytes())?;
    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(WORKBOOK_XML.as_bytes())?;
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(WORKBOOK_RELS_XML.as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    )?;
    write_sheet_row(&mut zip, &rows.header)?;
    for row in rows.rows {
        write_sheet_row(&mut zip, &row)?;
    }
    zip.write_all(b"</sheetData></worksheet>")?;

    Ok(zip.finish()?.into_inner())
}

// --- Response Assembly ---

pub fn export_file_name(kind: ReportKind, from: NaiveDate, to: NaiveDate, format: ExportFormat) -> String {
    format!("{}_{}_{}.{}", kind.name(), from, to, format.extension())
}

pub fn export_response(
    snapshot: &TenantSnapshot,
    scope: &Scope,
    plan: &ExportPlan,
) -> Result<Response, ExportError> {
    let rows = build_rows(snapshot, scope, plan);
    let filename = export_file_name(plan.kind, plan.from, plan.to, plan.format);
    info!(
        report = plan.kind.name(),
        format = plan.format.extension(),
        %filename,
        "starting export"
    );

    let body = match plan.format {
        ExportFormat::Csv => csv_stream_body(rows),
        ExportFormat::Xlsx => Body::from(xlsx_bytes(rows)?),
    };
    Ok((
        [
            (header::CONTENT_TYPE, plan.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
