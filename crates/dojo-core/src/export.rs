//! CSV export of the currently visible sheet.

use std::path::Path;

use crate::record::{AttendanceRecord, EntityKind};

const STUDENT_HEADER: &[&str] = &["Name", "Email", "Course", "Date", "Status", "Check In", "Notes"];
const COACH_HEADER: &[&str] = &["Name", "Email", "Phone", "Date", "Status", "Check In", "Notes"];

/// Render records as CSV. Students list their course, coaches their phone.
pub fn export_csv<'a>(
    records: impl IntoIterator<Item = &'a AttendanceRecord>,
    kind: EntityKind,
) -> String {
    let header = match kind {
        EntityKind::Student => STUDENT_HEADER,
        EntityKind::Coach => COACH_HEADER,
    };
    let mut out = String::new();
    push_row(&mut out, header.iter().copied());

    for record in records {
        let third = match kind {
            EntityKind::Student => record.course_name.as_deref(),
            EntityKind::Coach => record.phone.as_deref(),
        };
        let date = record.date.format("%Y-%m-%d").to_string();
        push_row(
            &mut out,
            [
                record.entity_name.as_str(),
                record.email.as_deref().unwrap_or(""),
                third.unwrap_or(""),
                date.as_str(),
                record.status.title(),
                record.check_in_time.as_deref().unwrap_or(""),
                record.notes.as_deref().unwrap_or(""),
            ],
        );
    }
    out
}

/// Write [`export_csv`] output to `path`.
pub fn write_csv<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a AttendanceRecord>,
    kind: EntityKind,
) -> std::io::Result<()> {
    std::fs::write(path, export_csv(records, kind))
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

// RFC 4180: quote when the field holds a delimiter, quote or line break.
fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
