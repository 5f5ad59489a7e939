//! Terminal rendering for attendance sheets, summaries and bulk-save reports.

use chrono::NaiveDate;
use dojo_core::{AttendanceRecord, AttendanceStats, EntityKind};
use dojo_sync::BulkSaveReport;

const NAME_WIDTH: usize = 24;
const DETAIL_WIDTH: usize = 28;

// ── Sheet ──

/// Print the sheet as a table. Students show their course, coaches their
/// expertise.
pub fn print_sheet(kind: EntityKind, date: NaiveDate, rows: &[AttendanceRecord]) {
    println!("=== {} attendance, {} ===", kind.label(), date.format("%A %d %B %Y"));
    if rows.is_empty() {
        println!("(no {})", kind.plural());
        println!();
        return;
    }

    let detail_header = match kind {
        EntityKind::Student => "Course",
        EntityKind::Coach => "Expertise",
    };
    println!(
        "  {:<NAME_WIDTH$} {:<DETAIL_WIDTH$} {:<11} {:<9} Notes",
        "Name", detail_header, "Status", "Check In"
    );
    for row in rows {
        let detail = match kind {
            EntityKind::Student => row.course_name.clone().unwrap_or_default(),
            EntityKind::Coach => row.expertise.join(", "),
        };
        println!(
            "  {:<NAME_WIDTH$} {:<DETAIL_WIDTH$} {:<11} {:<9} {}",
            truncate(&row.entity_name, NAME_WIDTH),
            truncate(&detail, DETAIL_WIDTH),
            row.status.title(),
            row.check_in_time.as_deref().unwrap_or("-"),
            row.notes.as_deref().unwrap_or(""),
        );
    }
    println!();
}

pub fn print_marked(record: &AttendanceRecord) {
    print!("{} marked {}", record.entity_name, record.status.title());
    if let Some(t) = &record.check_in_time {
        print!(" at {t}");
    }
    println!();
}

// ── Summary ──

pub fn print_stats(stats: &AttendanceStats) {
    println!("Summary");
    println!("  {:<12} {}", "Total", stats.total);
    println!("  {:<12} {}", "Present", stats.present);
    println!("  {:<12} {}", "Late", stats.late);
    println!("  {:<12} {}", "Absent", stats.absent);
    println!("  {:<12} {}", "Not marked", stats.not_marked);
    println!("  {:<12} {:.2}%", "Rate", stats.rounded_rate());
}

// ── Bulk save ──

pub fn print_report(report: &BulkSaveReport, elapsed_secs: f64) {
    println!(
        "Saved {} of {} marks in {:.1}s",
        report.success_count,
        report.attempted(),
        elapsed_secs
    );
    for failure in &report.failures {
        println!("  failed  {:<NAME_WIDTH$} {}", failure.entity_name, failure.message);
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
