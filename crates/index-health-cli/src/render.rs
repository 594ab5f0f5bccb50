//! Report rendering for the terminal.

use index_health::error::{
    EXIT_CANCELLED, EXIT_INCOMPLETE, EXIT_INCONSISTENT, EXIT_SUCCESS,
};
use index_health::verify::{ContentDiffRecord, ContentIssue};
use index_health::{
    ContentReport, CountDiffRecord, CountReport, EntityType, ErrorRecord, HealthCheckResult,
    ReportRecord, ValidationOutcome,
};

const SUCCESS_ICON: &str = "\u{2705}";
const FAILURE_ICON: &str = "\u{274C}";
const WARNING_ICON: &str = "\u{26A0}\u{FE0F}";

/// Exit code for a finished run. Cancellation wins over inconsistencies,
/// which win over errors.
pub fn exit_code(outcome: ValidationOutcome) -> u8 {
    if outcome.cancelled {
        EXIT_CANCELLED
    } else if outcome.inconsistent {
        EXIT_INCONSISTENT
    } else if outcome.incomplete {
        EXIT_INCOMPLETE
    } else {
        EXIT_SUCCESS
    }
}

/// A "Validating <entity>s count" section per entity, separated by blank lines.
pub fn count_sections(entities: &[EntityType], report: &CountReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, entity) in entities.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("Validating {}s count", entity));
        lines.push(String::new());
        lines.extend(
            report
                .records()
                .iter()
                .filter(|record| record_entity(record) == *entity)
                .map(count_record_line),
        );
    }
    if report.is_cancelled() {
        lines.push(format!("{} Count validation cancelled", WARNING_ICON));
    }
    lines
}

fn record_entity(record: &ReportRecord<CountDiffRecord>) -> EntityType {
    match record {
        ReportRecord::Diff(diff) => diff.entity(),
        ReportRecord::Error(err) => err.entity,
    }
}

fn count_record_line(record: &ReportRecord<CountDiffRecord>) -> String {
    match record {
        ReportRecord::Diff(diff) => count_line(diff),
        ReportRecord::Error(err) => error_line("validating count", err),
    }
}

fn count_line(diff: &CountDiffRecord) -> String {
    let (icon, message) = if diff.is_consistent() {
        (SUCCESS_ICON, "no inconsistencies found")
    } else {
        (FAILURE_ICON, "inconsistencies found")
    };
    format!(
        "{} {} when counting entity: {}, type: {} (DB: {}, ES: {}, Diff: {})",
        icon,
        message,
        diff.entity(),
        diff.subtype(),
        diff.db_total(),
        diff.es_total(),
        diff.diff()
    )
}

fn error_line(action: &str, err: &ErrorRecord) -> String {
    let source = err
        .source
        .map(|side| format!("{} ", side))
        .unwrap_or_default();
    format!(
        "{} Error while {} for entity: {} ({}): {}{}",
        WARNING_ICON, action, err.entity, err.scope, source, err.message
    )
}

/// Diff details, a summary line and, for stopped scans, a resume hint.
pub fn content_lines(report: &ContentReport) -> Vec<String> {
    let mut lines = Vec::new();
    for record in report.records() {
        match record {
            ReportRecord::Diff(diff) => lines.extend(content_diff_lines(diff)),
            ReportRecord::Error(err) => lines.push(error_line("validating contents", err)),
        }
    }

    let outcome = report.outcome();
    let diffs = report.diffs().count();
    let errors = report.errors().count();
    lines.push(if outcome.inconsistent {
        format!(
            "{} Inconsistencies found! {} document(s) differ, {} error(s)",
            FAILURE_ICON, diffs, errors
        )
    } else if outcome.incomplete {
        format!(
            "{} No inconsistencies found, but {} range(s) could not be validated",
            WARNING_ICON, errors
        )
    } else {
        format!("{} No inconsistencies found!", SUCCESS_ICON)
    });

    if let Some(id) = report.resume_from() {
        let reason = if report.is_cancelled() {
            "Validation cancelled"
        } else {
            "Validation stopped early"
        };
        lines.push(format!("{}; resume with --start-id {}", reason, id));
    }
    lines
}

fn content_diff_lines(diff: &ContentDiffRecord) -> Vec<String> {
    let icon = match diff.issue {
        ContentIssue::FieldMismatch => FAILURE_ICON,
        ContentIssue::MissingFromIndex | ContentIssue::MissingFromPrimary => WARNING_ICON,
    };
    let mut lines = vec![format!(
        "{} entity: {}, id: {}: {}",
        icon, diff.entity, diff.id, diff.issue
    )];
    if diff.issue == ContentIssue::FieldMismatch {
        for (field, mismatch) in &diff.mismatches {
            lines.push(format!(
                "    {}: DB {} / ES {}",
                field, mismatch.primary, mismatch.index
            ));
        }
    }
    lines
}

/// Health check summary.
pub fn health_lines(result: &HealthCheckResult) -> Vec<String> {
    let status = |ok: bool| if ok { "OK" } else { "FAILED" };
    let mut lines = vec!["Health Check Results:".to_string()];
    lines.push(format!(
        "  Database ({}): {} ({}ms)",
        result.primary_type,
        status(result.primary_connected),
        result.primary_latency_ms
    ));
    if let Some(err) = &result.primary_error {
        lines.push(format!("    Error: {}", err));
    }
    lines.push(format!(
        "  Index ({}): {} ({}ms)",
        result.index_type,
        status(result.index_connected),
        result.index_latency_ms
    ));
    if let Some(err) = &result.index_error {
        lines.push(format!("    Error: {}", err));
    }
    lines.push(format!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    ));
    lines
}
