// src/report_tests.rs

#[cfg(test)]
mod tests {
    use crate::heatmap::*;
    use crate::model::*;
    use crate::pivot::*;
    use crate::scoping::*;
    use crate::summary::*;
    use chrono::{DateTime, NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid test timestamp")
            .with_timezone(&Utc)
    }

    fn time_entry(
        id: EntryId,
        technician_id: TechnicianId,
        project_id: ProjectId,
        date: &str,
        hours: Decimal,
        status: TimeEntryStatus,
        created: &str,
    ) -> TimeEntry {
        TimeEntry {
            id,
            technician_id,
            project_id,
            task_id: 1,
            location_id: 1,
            date: d(date),
            hours_worked: hours,
            status,
            created_at: ts(created),
        }
    }

    fn expense(
        id: EntryId,
        technician_id: TechnicianId,
        project_id: ProjectId,
        date: &str,
        amount: Decimal,
        status: ExpenseStatus,
        created: &str,
    ) -> ExpenseEntry {
        ExpenseEntry {
            id,
            technician_id,
            project_id,
            date: d(date),
            amount,
            category: "travel".to_string(),
            status,
            created_at: ts(created),
        }
    }

    fn membership(project_id: ProjectId, user_id: UserId) -> ProjectMembership {
        ProjectMembership {
            project_id,
            user_id,
            project_role: MembershipRole::Member,
            expense_role: MembershipRole::Member,
            finance_role: MembershipRole::None,
        }
    }

    fn technician(id: TechnicianId, user_id: UserId, name: &str) -> Technician {
        Technician {
            id,
            user_id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            is_active: true,
        }
    }

    /// Tenant with an owner (user 1) and three technicians:
    /// Alice (user 2) and Bram (user 3) share project 10, Bram is also on
    /// project 20, and Cleo (user 4) works project 30 alone.
    fn fixture() -> TenantSnapshot {
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
        for user_id in [2, 3, 4] {
            identities.insert(
                user_id,
                Identity {
                    user_id,
                    role: Role::Technician,
                    permissions: HashSet::from([Permission::ViewReports]),
                },
            );
        }

        TenantSnapshot {
            tenant_id: "test".to_string(),
            technicians: vec![
                technician(2, 2, "Alice Moreau"),
                technician(3, 3, "Bram Okafor"),
                technician(4, 4, "Cleo Tanaka"),
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
                Project {
                    id: 30,
                    name: "Quarry Survey".to_string(),
                },
            ],
            memberships: vec![
                membership(10, 2),
                membership(10, 3),
                membership(20, 3),
                membership(30, 4),
            ],
            identities,
            time_entries: vec![
                time_entry(100, 2, 10, "2025-12-01", dec!(8), TimeEntryStatus::Approved, "2025-12-01T17:00:00Z"),
                // Submitted days after the work was done; the heatmap must
                // bucket it on 12-05 while summaries keep it on 12-02.
                time_entry(101, 2, 10, "2025-12-02", dec!(4), TimeEntryStatus::Submitted, "2025-12-05T09:00:00Z"),
                time_entry(102, 2, 10, "2025-12-03", dec!(2), TimeEntryStatus::Rejected, "2025-12-03T17:30:00Z"),
                time_entry(103, 3, 10, "2025-12-01", dec!(6), TimeEntryStatus::Submitted, "2025-12-01T18:00:00Z"),
                time_entry(104, 4, 30, "2025-12-01", dec!(5), TimeEntryStatus::Closed, "2025-12-01T16:00:00Z"),
            ],
            expense_entries: vec![
                expense(200, 2, 10, "2025-12-01", dec!(42.50), ExpenseStatus::Submitted, "2025-12-01T17:10:00Z"),
                expense(201, 3, 20, "2025-12-02", dec!(100), ExpenseStatus::FinanceApproved, "2025-12-02T12:00:00Z"),
                expense(202, 4, 30, "2025-12-01", dec!(10), ExpenseStatus::Paid, "2025-12-01T16:30:00Z"),
            ],
        }
    }

    fn identity_of(snapshot: &TenantSnapshot, user_id: UserId) -> Identity {
        snapshot
            .identity(user_id)
            .cloned()
            .expect("fixture identity exists")
    }

    fn summary_request(from: &str, to: &str, group_by: &[&str], period: &str) -> SummaryRequest {
        SummaryRequest {
            from: from.to_string(),
            to: to.to_string(),
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            period: period.to_string(),
            entity: None,
            user_id: None,
        }
    }

    fn pivot_request(from: &str, to: &str, metrics: Option<&[&str]>) -> PivotRequest {
        PivotRequest {
            period: None,
            range: DateRange {
                from: from.to_string(),
                to: to.to_string(),
            },
            dimensions: PivotDimensions {
                rows: vec!["user".to_string()],
                columns: vec!["project".to_string()],
            },
            metrics: metrics.map(|m| m.iter().map(|s| s.to_string()).collect()),
            include: None,
            filters: None,
        }
    }

    fn error_fields(err: ReportError) -> Vec<String> {
        match err {
            ReportError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // --- Scoping ---

    #[test]
    fn test_owner_scope_is_tenant_wide() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None)
            .expect("owner scope resolves");
        assert_eq!(scope.mode(), ScopeMode::All);
        assert_eq!(scope.visible_time_entries(&snapshot).count(), 5);
        assert_eq!(scope.visible_expenses(&snapshot).count(), 3);
    }

    #[test]
    fn test_membership_scope_includes_project_peers() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, None)
            .expect("member scope resolves");
        assert_eq!(scope.mode(), ScopeMode::Membership);
        // Alice shares project 10 with Bram, so Bram's entry there is
        // visible; Cleo's project 30 work is not.
        let visible: Vec<EntryId> = scope.visible_time_entries(&snapshot).map(|e| e.id).collect();
        assert_eq!(visible, vec![100, 101, 102, 103]);
        assert!(!scope.includes_project(30));
    }

    #[test]
    fn test_membership_scope_excludes_peer_work_on_foreign_projects() {
        let snapshot = fixture();
        // Bram's expense on project 20 stays invisible to Alice even though
        // Bram himself is within her scope via project 10.
        let scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, None)
            .expect("member scope resolves");
        let visible: Vec<EntryId> = scope.visible_expenses(&snapshot).map(|e| e.id).collect();
        assert_eq!(visible, vec![200]);
    }

    #[test]
    fn test_widening_user_filter_is_dropped() {
        let snapshot = fixture();
        // Alice asks for Cleo, who is outside her membership scope. The
        // filter must be ignored, not honored and not an error.
        let scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, Some(4))
            .expect("member scope resolves");
        let visible: Vec<EntryId> = scope.visible_time_entries(&snapshot).map(|e| e.id).collect();
        assert_eq!(visible, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_narrowing_user_filter_is_honored() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, Some(3))
            .expect("member scope resolves");
        let visible: Vec<EntryId> = scope.visible_time_entries(&snapshot).map(|e| e.id).collect();
        assert_eq!(visible, vec![103]);
    }

    #[test]
    fn test_owner_user_filter_narrows() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, Some(2))
            .expect("owner scope resolves");
        assert_eq!(scope.mode(), ScopeMode::All);
        let visible: Vec<EntryId> = scope.visible_time_entries(&snapshot).map(|e| e.id).collect();
        assert_eq!(visible, vec![100, 101, 102]);
    }

    #[test]
    fn test_no_report_permission_is_forbidden() {
        let snapshot = fixture();
        let stranger = Identity {
            user_id: 99,
            role: Role::Technician,
            permissions: HashSet::new(),
        };
        let err = resolve_scope(&stranger, &snapshot, None).unwrap_err();
        assert!(matches!(err, ReportError::Forbidden(_)));
    }

    #[test]
    fn test_heatmap_requires_approval_authority() {
        let snapshot = fixture();
        assert!(require_approval_authority(&identity_of(&snapshot, 1)).is_ok());
        let err = require_approval_authority(&identity_of(&snapshot, 2)).unwrap_err();
        assert!(matches!(err, ReportError::Forbidden(_)));
    }

    // --- Summary ---

    #[test]
    fn test_daily_summary_grouped_by_user_and_project() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = summary_request("2025-12-01", "2025-12-03", &["user", "project"], "day")
            .validate()
            .expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert_eq!(rows.len(), 5);

        // Deterministic order: period key, then user, then project.
        let keys: Vec<(&str, Option<u64>, Option<u64>)> = rows
            .iter()
            .map(|r| (r.period.as_str(), r.user_id, r.project_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2025-12-01", Some(2), Some(10)),
                ("2025-12-01", Some(3), Some(10)),
                ("2025-12-01", Some(4), Some(30)),
                ("2025-12-02", Some(2), Some(10)),
                ("2025-12-03", Some(2), Some(10)),
            ]
        );

        let alice_day1 = &rows[0];
        assert_eq!(alice_day1.total_minutes, Some(480));
        assert_eq!(alice_day1.approved_minutes, Some(480));
        assert_eq!(alice_day1.pending_minutes, Some(0));
        assert_eq!(alice_day1.rejected_minutes, Some(0));
        assert_eq!(alice_day1.project_name.as_deref(), Some("Harbor Retrofit"));
        assert_eq!(alice_day1.total_entries, 1);

        let bram_day1 = &rows[1];
        assert_eq!(bram_day1.total_minutes, Some(360));
        assert_eq!(bram_day1.pending_minutes, Some(360));

        let alice_day3 = &rows[4];
        assert_eq!(alice_day3.rejected_minutes, Some(120));
    }

    #[test]
    fn test_summary_partitions_always_sum_to_total() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = summary_request("2025-12-01", "2025-12-31", &[], "month")
            .validate()
            .expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.period, "2025-12");
        assert_eq!(row.user_id, None);
        assert_eq!(row.project_id, None);
        assert_eq!(row.total_minutes, Some(1500));
        // Closed entries count as approved.
        assert_eq!(row.approved_minutes, Some(780));
        assert_eq!(row.pending_minutes, Some(600));
        assert_eq!(row.rejected_minutes, Some(120));
        assert_eq!(
            row.approved_minutes.unwrap() + row.pending_minutes.unwrap()
                + row.rejected_minutes.unwrap(),
            row.total_minutes.unwrap()
        );
        assert_eq!(row.total_entries, 5);
    }

    #[test]
    fn test_weekly_summary_uses_iso_week_keys() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = summary_request("2025-12-01", "2025-12-07", &[], "week")
            .validate()
            .expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "2025-W49");
    }

    #[test]
    fn test_summary_respects_membership_scope() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, None).unwrap();
        let params = summary_request("2025-12-01", "2025-12-31", &[], "month")
            .validate()
            .expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert_eq!(rows.len(), 1);
        // Cleo's 5h on project 30 is outside Alice's scope.
        assert_eq!(rows[0].total_minutes, Some(1200));
        assert_eq!(rows[0].total_entries, 4);
    }

    #[test]
    fn test_summary_omits_empty_combinations() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = summary_request("2026-01-01", "2026-01-31", &["user", "project"], "day")
            .validate()
            .expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert!(rows.is_empty(), "no activity must mean no rows, not zeros");
    }

    #[test]
    fn test_expense_summary_partitions_amounts() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let mut request = summary_request("2025-12-01", "2025-12-31", &[], "month");
        request.entity = Some("expenses".to_string());
        let params = request.validate().expect("valid request");

        let rows = summarize(&snapshot, &scope, &params).rows;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_amount, Some(dec!(152.50)));
        assert_eq!(row.approved_amount, Some(dec!(110)));
        assert_eq!(row.pending_amount, Some(dec!(42.50)));
        assert_eq!(row.rejected_amount, Some(dec!(0)));
        assert_eq!(row.total_minutes, None, "expense rows carry no minutes");
        assert_eq!(row.total_entries, 3);
    }

    #[test]
    fn test_summary_validation_reports_each_bad_field() {
        let request = SummaryRequest {
            from: "12/01/2025".to_string(),
            to: "2025-12-31".to_string(),
            group_by: vec!["team".to_string()],
            period: "quarter".to_string(),
            entity: Some("invoices".to_string()),
            user_id: None,
        };
        let fields = error_fields(request.validate().unwrap_err());
        assert_eq!(fields, vec!["from", "period", "group_by.0", "entity"]);
    }

    #[test]
    fn test_summary_rejects_inverted_range() {
        let request = summary_request("2025-12-31", "2025-12-01", &[], "day");
        let fields = error_fields(request.validate().unwrap_err());
        assert_eq!(fields, vec!["from"]);
    }

    // --- Pivot ---

    #[test]
    fn test_pivot_builds_sparse_user_project_matrix() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = pivot_request("2025-12-01", "2025-12-31", Some(&["hours", "amount"]))
            .validate()
            .expect("valid request");

        let pivot = build_pivot(&snapshot, &scope, &params);

        let row_labels: Vec<&str> = pivot.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(row_labels, vec!["Alice Moreau", "Bram Okafor", "Cleo Tanaka"]);
        let column_labels: Vec<&str> = pivot.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            column_labels,
            vec!["Harbor Retrofit", "Depot Wiring", "Quarry Survey"]
        );

        // Sparse: Alice never touched projects 20 or 30.
        assert_eq!(pivot.cells.len(), 4);
        assert!(!pivot.cells.contains_key("2|20"));

        let alice_harbor = &pivot.cells["2|10"];
        assert_eq!(alice_harbor.hours, Some(dec!(14)));
        assert_eq!(alice_harbor.amount, Some(dec!(42.50)));

        let bram_depot = &pivot.cells["3|20"];
        assert_eq!(bram_depot.hours, None, "no time worked on depot wiring");
        assert_eq!(bram_depot.amount, Some(dec!(100)));
    }

    #[test]
    fn test_pivot_totals_sum_unrounded_cells() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = pivot_request("2025-12-01", "2025-12-31", Some(&["hours", "amount"]))
            .validate()
            .expect("valid request");

        let pivot = build_pivot(&snapshot, &scope, &params);

        let row_totals = pivot.totals.rows.as_ref().expect("row totals included");
        let alice = row_totals.iter().find(|t| t.row_id == "2").expect("alice total");
        assert_eq!(alice.metrics.hours, Some(dec!(14)));
        assert_eq!(alice.metrics.amount, Some(dec!(42.50)));

        let column_totals = pivot.totals.columns.as_ref().expect("column totals included");
        let harbor = column_totals
            .iter()
            .find(|t| t.column_id == "10")
            .expect("harbor total");
        assert_eq!(harbor.metrics.hours, Some(dec!(20)));

        let grand = pivot.totals.grand.as_ref().expect("grand total included");
        assert_eq!(grand.hours, Some(dec!(25)));
        assert_eq!(grand.amount, Some(dec!(152.50)));
    }

    #[test]
    fn test_pivot_totals_can_be_switched_off() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let mut request = pivot_request("2025-12-01", "2025-12-31", None);
        request.include = Some(PivotInclude {
            row_totals: false,
            column_totals: false,
            grand_total: false,
        });
        let params = request.validate().expect("valid request");

        let pivot = build_pivot(&snapshot, &scope, &params);
        assert!(pivot.totals.rows.is_none());
        assert!(pivot.totals.columns.is_none());
        assert!(pivot.totals.grand.is_none());
    }

    #[test]
    fn test_pivot_defaults_to_hours_metric() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = pivot_request("2025-12-01", "2025-12-31", None)
            .validate()
            .expect("valid request");

        let pivot = build_pivot(&snapshot, &scope, &params);
        // Bram's depot expense contributes no hours, so the cell is absent.
        assert!(!pivot.cells.contains_key("3|20"));
        assert_eq!(pivot.cells["2|10"].amount, None);
    }

    #[test]
    fn test_pivot_echoes_scope_mode() {
        let snapshot = fixture();
        let owner_scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let member_scope = resolve_scope(&identity_of(&snapshot, 2), &snapshot, None).unwrap();
        let params = pivot_request("2025-12-01", "2025-12-31", None)
            .validate()
            .expect("valid request");

        assert_eq!(build_pivot(&snapshot, &owner_scope, &params).meta.scoped, ScopeMode::All);
        assert_eq!(
            build_pivot(&snapshot, &member_scope, &params).meta.scoped,
            ScopeMode::Membership
        );
    }

    #[test]
    fn test_pivot_validation_flags_unsupported_dimensions() {
        let mut request = pivot_request("2025-12-01", "2025-12-31", None);
        request.dimensions = PivotDimensions {
            rows: vec!["team".to_string()],
            columns: vec![],
        };
        request.metrics = Some(vec!["velocity".to_string()]);
        let fields = error_fields(request.validate().unwrap_err());
        assert_eq!(
            fields,
            vec!["dimensions.rows.0", "dimensions.columns", "metrics.0"]
        );
    }

    // --- Heatmap ---

    fn heatmap_request(from: &str, to: &str, timesheets: bool, expenses: bool) -> HeatmapRequest {
        HeatmapRequest {
            range: DateRange {
                from: from.to_string(),
                to: to.to_string(),
            },
            include: HeatmapInclude {
                timesheets,
                expenses,
            },
        }
    }

    #[test]
    fn test_heatmap_buckets_by_creation_day() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = heatmap_request("2025-12-01", "2025-12-07", true, true)
            .validate()
            .expect("valid request");

        let heatmap = build_heatmap(&snapshot, &scope, &params);
        let days: Vec<&str> = heatmap.days.keys().map(String::as_str).collect();
        // 12-03 held only a rejected entry and is omitted; entry 101 was
        // created on 12-05 even though its business date is 12-02.
        assert_eq!(days, vec!["2025-12-01", "2025-12-02", "2025-12-05"]);

        let day1 = &heatmap.days["2025-12-01"];
        assert_eq!(
            day1.timesheets,
            Some(KindCounts {
                pending: 1,
                approved: 2
            })
        );
        assert_eq!(
            day1.expenses,
            Some(KindCounts {
                pending: 1,
                approved: 1
            })
        );
        assert_eq!(day1.total_pending, 2);

        // 12-02 only saw expense activity; the included timesheet kind
        // still serializes as zeros.
        let day2 = &heatmap.days["2025-12-02"];
        assert_eq!(day2.timesheets, Some(KindCounts::default()));
        assert_eq!(
            day2.expenses,
            Some(KindCounts {
                pending: 0,
                approved: 1
            })
        );
        assert_eq!(day2.total_pending, 0);

        let day5 = &heatmap.days["2025-12-05"];
        assert_eq!(
            day5.timesheets,
            Some(KindCounts {
                pending: 1,
                approved: 0
            })
        );
        assert_eq!(day5.total_pending, 1);

        assert_eq!(heatmap.meta.from, "2025-12-01");
        assert_eq!(heatmap.meta.to, "2025-12-07");
        assert_eq!(heatmap.meta.scoped, ScopeMode::All);
    }

    #[test]
    fn test_heatmap_single_kind_omits_the_other() {
        let snapshot = fixture();
        let scope = resolve_scope(&identity_of(&snapshot, 1), &snapshot, None).unwrap();
        let params = heatmap_request("2025-12-01", "2025-12-07", false, true)
            .validate()
            .expect("valid request");

        let heatmap = build_heatmap(&snapshot, &scope, &params);
        let days: Vec<&str> = heatmap.days.keys().map(String::as_str).collect();
        assert_eq!(days, vec!["2025-12-01", "2025-12-02"]);
        for day in heatmap.days.values() {
            assert!(day.timesheets.is_none(), "excluded kind must not serialize");
            assert!(day.expenses.is_some());
        }
    }

    #[test]
    fn test_heatmap_respects_membership_scope() {
        let snapshot = fixture();
        // Grant Bram approval authority so he can see the queue for his
        // projects; Cleo's activity still stays out of it.
        let mut identity = identity_of(&snapshot, 3);
        identity.permissions.insert(Permission::ApproveEntries);
        require_approval_authority(&identity).expect("granted");

        let scope = resolve_scope(&identity, &snapshot, None).unwrap();
        let params = heatmap_request("2025-12-01", "2025-12-07", true, true)
            .validate()
            .expect("valid request");

        let heatmap = build_heatmap(&snapshot, &scope, &params);
        assert_eq!(heatmap.meta.scoped, ScopeMode::Membership);
        let day1 = &heatmap.days["2025-12-01"];
        // Cleo's closed entry and paid expense on project 30 are invisible.
        assert_eq!(
            day1.timesheets,
            Some(KindCounts {
                pending: 1,
                approved: 1
            })
        );
        assert_eq!(
            day1.expenses,
            Some(KindCounts {
                pending: 1,
                approved: 0
            })
        );
        assert_eq!(day1.total_pending, 2);
    }

    #[test]
    fn test_heatmap_rejects_oversized_range() {
        let request = heatmap_request("2025-01-01", "2025-03-04", true, false);
        let fields = error_fields(request.validate().unwrap_err());
        assert_eq!(fields, vec!["range.to"]);

        // 62 days exactly is still allowed.
        assert!(heatmap_request("2025-01-01", "2025-03-03", true, false)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_heatmap_rejects_empty_include() {
        let request = heatmap_request("2025-12-01", "2025-12-07", false, false);
        let fields = error_fields(request.validate().unwrap_err());
        assert_eq!(fields, vec!["include"]);
    }
}
