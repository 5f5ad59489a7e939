//! Free-text search over an attendance sheet.

use crate::record::AttendanceRecord;

/// Case-insensitive substring match over name, email, course, branch and
/// expertise tags. A blank query matches everything.
pub fn matches_query(record: &AttendanceRecord, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(record.entity_name.as_str())
        || record.email.as_deref().is_some_and(contains)
        || record.course_name.as_deref().is_some_and(contains)
        || record.branch_name.as_deref().is_some_and(contains)
        || record.expertise.iter().any(|tag| contains(tag.as_str()))
}

/// Records matching `query`, in their original order.
pub fn filter_records<'a>(records: &'a [AttendanceRecord], query: &str) -> Vec<&'a AttendanceRecord> {
    records.iter().filter(|r| matches_query(r, query)).collect()
}
