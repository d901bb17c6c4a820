//! Plain-text rendering of change-tracking reports.

use std::fmt::Write;

use annotator_core::change::{ChangeSummary, ChangeType};
use annotator_core::types::DbId;
use annotator_db::models::change::{AnnotationChange, ChangeReport, ChangeTypeCount};

/// Session ids longer than this are shortened in listings.
const SESSION_DISPLAY_LEN: usize = 20;

/// Most active annotations listed by `check-tracking`.
const MOST_ACTIVE_LISTED: usize = 5;

/// Filters a `show-changes` run was invoked with.
#[derive(Debug, Clone, Default)]
pub struct ReportScope {
    pub annotation_id: Option<DbId>,
    pub change_type: Option<ChangeType>,
    /// `None` means no time window.
    pub recent_hours: Option<i64>,
}

/// Render the `show-changes` report.
pub fn render_show_changes(scope: &ReportScope, report: &ChangeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Annotation Change Tracking Report ===\n");

    if let Some(id) = scope.annotation_id {
        let _ = writeln!(out, "Showing changes for Annotation #{id}");
    }
    if let Some(change_type) = scope.change_type {
        let _ = writeln!(out, "Filtering by change type: {change_type}");
    }
    if let Some(hours) = scope.recent_hours {
        let _ = writeln!(out, "Showing changes from the last {hours} hours");
    }
    let _ = writeln!(out, "Total changes: {}\n", report.total_changes);

    let counts = nonzero_by_count(&report.by_type);
    if !counts.is_empty() {
        let _ = writeln!(out, "Changes by type:");
        for c in counts {
            let _ = writeln!(out, "  {}: {}", c.change_type.label(), c.count);
        }
        out.push('\n');
    }

    if report.recent.is_empty() {
        let _ = writeln!(out, "No changes found matching the criteria.");
    } else {
        let _ = writeln!(out, "Recent changes:");
        let _ = writeln!(out, "{}", "-".repeat(80));
        for change in &report.recent {
            let _ = writeln!(out, "{}", change_line(change));
        }
    }

    if scope.annotation_id.is_none() && !report.top_sessions.is_empty() {
        let _ = writeln!(out, "\nTop sessions by activity:");
        for session in &report.top_sessions {
            let _ = writeln!(
                out,
                "  Session {}: {} changes",
                shorten_session(&session.session_id),
                session.change_count
            );
        }
    }

    out
}

/// Render the `check-tracking` overview.
pub fn render_tracking_check(total_annotations: i64, report: &ChangeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total annotations: {total_annotations}");
    let _ = writeln!(out, "Total changes tracked: {}", report.total_changes);

    let _ = writeln!(out, "\nChange type breakdown:");
    for c in &report.by_type {
        let _ = writeln!(out, "  {}: {}", c.change_type, c.count);
    }

    if !report.most_active_annotations.is_empty() {
        let _ = writeln!(out, "\nMost active annotations:");
        for a in report.most_active_annotations.iter().take(MOST_ACTIVE_LISTED) {
            let _ = writeln!(
                out,
                "  Annotation #{}: {} changes (last {})",
                a.annotation_id,
                a.change_count,
                a.last_change.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    out
}

/// Render a per-annotation change summary.
pub fn render_summary(annotation_id: DbId, summary: &ChangeSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Change summary for annotation #{annotation_id}:");
    let _ = writeln!(out, "  Total changes: {}", summary.total_changes);
    let _ = writeln!(out, "  Drug additions: {}", summary.drug_additions);
    let _ = writeln!(out, "  Drug removals: {}", summary.drug_removals);
    let _ = writeln!(out, "  Event additions: {}", summary.event_additions);
    let _ = writeln!(out, "  Event removals: {}", summary.event_removals);
    let _ = writeln!(out, "  Bulk updates: {}", summary.bulk_updates);
    out
}

fn change_line(change: &AnnotationChange) -> String {
    let entity = change
        .entity_name
        .as_deref()
        .map_or_else(|| "N/A".to_string(), |name| format!("'{name}'"));
    format!(
        "{} | Annotation #{} | {} | {} | Field: {}",
        change.timestamp.format("%Y-%m-%d %H:%M:%S"),
        change.annotation_id,
        change.change_type.label(),
        entity,
        change.field_name
    )
}

/// Types with at least one change, most frequent first.
fn nonzero_by_count(counts: &[ChangeTypeCount]) -> Vec<&ChangeTypeCount> {
    let mut nonzero: Vec<&ChangeTypeCount> = counts.iter().filter(|c| c.count > 0).collect();
    nonzero.sort_by(|a, b| b.count.cmp(&a.count));
    nonzero
}

fn shorten_session(session_id: &str) -> String {
    if session_id.chars().count() > SESSION_DISPLAY_LEN {
        let head: String = session_id.chars().take(SESSION_DISPLAY_LEN).collect();
        format!("{head}...")
    } else {
        session_id.to_string()
    }
}
