//! Request and response payloads for the attendance endpoints.

use chrono::{DateTime, Local, NaiveTime};
use dojo_core::{AttendanceRecord, AttendanceStats, AttendanceStatus, EntityKind, format_timestamp};
use dojo_store::ConfirmedMark;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Body of `POST /attendance/mark`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRequest {
    pub user_id: String,
    pub user_type: EntityKind,
    pub course_id: Option<String>,
    pub branch_id: String,
    /// `yyyy-MM-ddTHH:MM:SS`, the sheet date at a fixed time of day.
    pub attendance_date: String,
    pub status: AttendanceStatus,
    /// RFC 3339 instant; `null` for absent.
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub notes: Option<String>,
}

impl MarkRequest {
    /// Payload writing `record`'s current status, stamped at `now`.
    pub fn for_record(
        record: &AttendanceRecord,
        branch_id: &str,
        actor: &str,
        attendance_time: NaiveTime,
        now: DateTime<Local>,
    ) -> Self {
        let branch_id = if record.branch_id.is_empty() {
            branch_id
        } else {
            record.branch_id.as_str()
        };
        Self {
            user_id: record.entity_id.clone(),
            user_type: record.entity_kind,
            course_id: record.course_id.clone(),
            branch_id: branch_id.to_string(),
            attendance_date: record.date.and_time(attendance_time).format("%Y-%m-%dT%H:%M:%S").to_string(),
            status: record.status,
            check_in_time: record.status.stamps_check_in().then(|| now.to_rfc3339()),
            check_out_time: None,
            notes: Some(format!("Marked by {actor}")),
        }
    }
}

/// Fields to merge back after a successful write.
///
/// Reads `status`, `check_in_time` and `notes` from `response.attendance`,
/// `response.data` or the root; whatever the server does not echo falls back
/// to what was sent.
pub fn confirmed_fields(response: &Value, request: &MarkRequest) -> ConfirmedMark {
    let body = ["attendance", "data"]
        .iter()
        .find_map(|k| response.get(*k).filter(|v| v.is_object()))
        .unwrap_or(response);

    let status = body
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(request.status);

    let check_in_time = body
        .get("check_in_time")
        .and_then(Value::as_str)
        .and_then(format_timestamp)
        .or_else(|| request.check_in_time.as_deref().and_then(format_timestamp));

    let notes = body
        .get("notes")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| request.notes.clone());

    ConfirmedMark {
        status,
        check_in_time,
        notes,
    }
}

/// Counts from `GET /attendance/stats`, optionally wrapped in `stats` or
/// `data`. `None` when no total is reported.
///
/// The rate is recomputed from the counts so it always agrees with them.
/// Counts that add up to more than the total are rejected.
pub fn parse_server_stats(value: &Value) -> Option<AttendanceStats> {
    let body = ["stats", "data"]
        .iter()
        .find_map(|k| value.get(*k).filter(|v| v.is_object()))
        .unwrap_or(value);
    let count = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| body.get(*k).and_then(Value::as_u64))
            .map(|n| n as usize)
    };

    let total = count(&["total", "total_students", "total_coaches", "total_count"])?;
    let present = count(&["present", "present_count"]).unwrap_or(0);
    let absent = count(&["absent", "absent_count"]).unwrap_or(0);
    let late = count(&["late", "late_count"]).unwrap_or(0);

    let marked = present.checked_add(absent)?.checked_add(late)?;
    if marked > total {
        warn!(total, marked, "server stats exceed their total; ignoring");
        return None;
    }
    Some(AttendanceStats::from_counts(total, present, absent, late))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use dojo_core::{NormalizeContext, normalize_record};
    use serde_json::json;

    fn record(status: &str) -> AttendanceRecord {
        let ctx = NormalizeContext::new(
            EntityKind::Coach,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "b1",
        );
        normalize_record(
            &json!({"id": "c7", "course_id": 12, "attendance": {"status": status}}),
            &ctx,
        )
    }

    fn nine_am() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap()
    }

    #[test]
    fn mark_request_wire_shape() {
        let req = MarkRequest::for_record(&record("present"), "ignored", "Sensei", nine_am(), now());
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["user_id"], "c7");
        assert_eq!(body["user_type"], "coach");
        assert_eq!(body["course_id"], "12");
        assert_eq!(body["branch_id"], "b1");
        assert_eq!(body["attendance_date"], "2024-03-01T09:00:00");
        assert_eq!(body["status"], "present");
        assert!(body["check_in_time"].is_string());
        assert!(body["check_out_time"].is_null());
        assert_eq!(body["notes"], "Marked by Sensei");
    }

    #[test]
    fn absent_sends_null_check_in() {
        let req = MarkRequest::for_record(&record("absent"), "b1", "Sensei", nine_am(), now());
        let body = serde_json::to_value(&req).unwrap();
        assert!(body["check_in_time"].is_null());
        assert_eq!(body["status"], "absent");
    }

    #[test]
    fn fallback_branch_when_record_has_none() {
        let mut rec = record("late");
        rec.branch_id.clear();
        let req = MarkRequest::for_record(&rec, "b9", "Sensei", nine_am(), now());
        assert_eq!(req.branch_id, "b9");
    }

    #[test]
    fn confirmation_prefers_server_fields() {
        let req = MarkRequest::for_record(&record("late"), "b1", "Sensei", nine_am(), now());
        let response = json!({
            "message": "ok",
            "attendance": {"status": "present", "check_in_time": "2024-03-01T09:01:00",
                           "notes": "Marked by Branch Manager"}
        });
        let confirmed = confirmed_fields(&response, &req);
        assert_eq!(confirmed.status, AttendanceStatus::Present);
        assert_eq!(confirmed.check_in_time.as_deref(), Some("09:01 AM"));
        assert_eq!(confirmed.notes.as_deref(), Some("Marked by Branch Manager"));
    }

    #[test]
    fn confirmation_falls_back_to_request() {
        let req = MarkRequest::for_record(&record("late"), "b1", "Sensei", nine_am(), now());
        let confirmed = confirmed_fields(&json!({"status": "success"}), &req);
        assert_eq!(confirmed.status, AttendanceStatus::Late);
        assert_eq!(confirmed.check_in_time.as_deref(), Some("09:05 AM"));
        assert_eq!(confirmed.notes.as_deref(), Some("Marked by Sensei"));

        let confirmed = confirmed_fields(&Value::Null, &req);
        assert_eq!(confirmed.status, AttendanceStatus::Late);
    }

    #[test]
    fn server_stats_aliases() {
        let stats = parse_server_stats(&json!({
            "stats": {"total_students": 4, "present_count": 2, "late_count": 1, "absent_count": 1}
        }))
        .unwrap();
        assert_eq!((stats.total, stats.present, stats.late, stats.absent), (4, 2, 1, 1));
        assert!((stats.attendance_rate - 75.0).abs() < 1e-9);

        let flat = parse_server_stats(&json!({"total": 2, "present": 1})).unwrap();
        assert_eq!(flat.not_marked, 1);

        assert!(parse_server_stats(&json!({"message": "no data"})).is_none());
    }

    #[test]
    fn inconsistent_server_stats_are_rejected() {
        assert!(parse_server_stats(&json!({"total": 1, "present": u64::MAX, "late": 1})).is_none());
        assert!(parse_server_stats(&json!({"total": 3, "present": 2, "absent": 2})).is_none());
        let exact = parse_server_stats(&json!({"total": 3, "present": 2, "absent": 1})).unwrap();
        assert_eq!(exact.not_marked, 0);
    }
}
