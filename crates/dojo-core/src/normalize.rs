//! Response normalisation for attendance rosters.
//!
//! The backend returns students and coaches in several shapes depending on
//! the endpoint: names split across `first_name`/`last_name` or nested in
//! `personal_info`, contact details under `contact_info`, ids as numbers or
//! strings, rosters wrapped in `{students: [...]}`, `{data: [...]}` or bare
//! arrays. Everything here folds those shapes into one [`AttendanceRecord`].
//!
//! # Totality
//!
//! [`normalize_record`] never fails. Missing fields fall back to defaults
//! (`not_marked`, no times, `"Unknown <Kind>"`), and an unparsable
//! timestamp is logged and dropped. One malformed item never blanks the
//! rest of a roster.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

use crate::record::{AttendanceRecord, AttendanceStatus, EntityKind, record_id};

/// Display format for check-in / check-out times: `09:05 AM`.
const DISPLAY_TIME: &str = "%I:%M %p";

/// Entity id used when an item carries none of the id fields.
const UNIDENTIFIED: &str = "unidentified";

/// Nested objects searched after the top level, in order.
const CONTACT_SCOPES: &[&str] = &["contact_info", "personal_info"];

/// Target kind, date and branch for a batch of raw items.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub kind: EntityKind,
    pub date: NaiveDate,
    /// Used when an item has no branch of its own (branch-manager views
    /// only ever load one branch).
    pub fallback_branch_id: String,
}

impl NormalizeContext {
    pub fn new(kind: EntityKind, date: NaiveDate, fallback_branch_id: impl Into<String>) -> Self {
        Self {
            kind,
            date,
            fallback_branch_id: fallback_branch_id.into(),
        }
    }
}

/// Normalise one raw backend item into an [`AttendanceRecord`].
pub fn normalize_record(raw: &Value, ctx: &NormalizeContext) -> AttendanceRecord {
    let entity_id = entity_id_of(raw, ctx.kind).unwrap_or_else(|| UNIDENTIFIED.to_string());
    build_record(raw, ctx, entity_id)
}

/// Normalise a whole roster response.
///
/// Items without an id are keyed `unidentified-{position}`, with a `~n`
/// suffix when a real item already uses that id, so the composite ids stay
/// unique within the batch.
pub fn normalize_roster(response: &Value, ctx: &NormalizeContext) -> Vec<AttendanceRecord> {
    let items = roster_items(response, ctx.kind);
    let ids: Vec<Option<String>> = items.iter().map(|raw| entity_id_of(raw, ctx.kind)).collect();
    let mut taken: HashSet<String> = ids.iter().flatten().cloned().collect();

    items
        .iter()
        .zip(ids)
        .enumerate()
        .map(|(position, (raw, id))| {
            let entity_id = id.unwrap_or_else(|| {
                warn!(position, kind = %ctx.kind, "roster item has no id");
                synthetic_id(position, &mut taken)
            });
            build_record(raw, ctx, entity_id)
        })
        .collect()
}

fn synthetic_id(position: usize, taken: &mut HashSet<String>) -> String {
    let base = format!("{UNIDENTIFIED}-{position}");
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        candidate = format!("{base}~{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Extract the list of entity items from a roster response.
///
/// Accepts `{students|coaches: [...]}`, `{data: [...]}`,
/// `{data: {students|coaches: [...]}}` and bare arrays.
pub fn roster_items(response: &Value, kind: EntityKind) -> Vec<Value> {
    if let Some(items) = response.as_array() {
        return items.clone();
    }
    let candidates = [
        response.get(kind.plural()),
        response.get("data").and_then(|d| d.get(kind.plural())),
        response.get("data"),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(items) = candidate.as_array() {
            return items.clone();
        }
    }
    warn!(kind = %kind, "roster response has no recognisable item list");
    Vec::new()
}

/// Parse an ISO timestamp and reformat it as a 12-hour local display time.
///
/// RFC 3339 values are converted to local time; naive date-times are taken
/// as already local. Returns `None` (with a warning) when parsing fails.
pub fn format_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(display_time(dt.with_timezone(&Local)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.format(DISPLAY_TIME).to_string());
        }
    }
    warn!(value = %raw, "unparsable timestamp dropped");
    None
}

/// Format an instant the way check-in times are displayed.
pub fn display_time(dt: DateTime<Local>) -> String {
    dt.format(DISPLAY_TIME).to_string()
}

fn build_record(raw: &Value, ctx: &NormalizeContext, entity_id: String) -> AttendanceRecord {
    let attendance = raw.get("attendance").filter(|a| a.is_object());

    let status = attendance
        .and_then(|a| string_at(a, "status"))
        .map(|s| {
            s.parse::<AttendanceStatus>().unwrap_or_else(|e| {
                warn!(entity_id = %entity_id, error = %e, "unknown status treated as not marked");
                AttendanceStatus::NotMarked
            })
        })
        .unwrap_or_default();

    let check_in_time = attendance
        .and_then(|a| string_at(a, "check_in_time"))
        .and_then(|s| format_timestamp(&s));
    let check_out_time = attendance
        .and_then(|a| string_at(a, "check_out_time"))
        .and_then(|s| format_timestamp(&s));
    let notes = attendance.and_then(|a| string_at(a, "notes"));

    let branch_id = string_at(raw, "branch_id")
        .or_else(|| nested_string(raw, "branch", "id"))
        .unwrap_or_else(|| ctx.fallback_branch_id.clone());

    AttendanceRecord {
        id: record_id(&entity_id, ctx.date),
        entity_name: display_name(raw, ctx.kind),
        email: contact_field(raw, &["email"]),
        phone: contact_field(raw, &["phone", "phone_number"]),
        branch_id,
        branch_name: string_at(raw, "branch_name").or_else(|| nested_string(raw, "branch", "name")),
        course_id: string_at(raw, "course_id").or_else(|| nested_string(raw, "course", "id")),
        course_name: string_at(raw, "course_name")
            .or_else(|| nested_string(raw, "course", "name"))
            .or_else(|| nested_string(raw, "course", "title")),
        expertise: expertise_tags(raw),
        entity_id,
        entity_kind: ctx.kind,
        date: ctx.date,
        status,
        check_in_time,
        check_out_time,
        notes,
    }
}

fn entity_id_of(raw: &Value, kind: EntityKind) -> Option<String> {
    let kind_key = format!("{}_id", kind.as_str());
    ["id", "_id", kind_key.as_str(), "user_id"]
        .iter()
        .find_map(|key| string_at(raw, key))
}

fn display_name(raw: &Value, kind: EntityKind) -> String {
    let kind_key = format!("{}_name", kind.as_str());
    let scopes = std::iter::once(Some(raw)).chain(std::iter::once(raw.get("personal_info")));
    for scope in scopes.flatten() {
        if let Some(full) = string_at(scope, "full_name") {
            return full;
        }
        let first = string_at(scope, "first_name");
        let last = string_at(scope, "last_name");
        if first.is_some() || last.is_some() {
            let joined = [first, last].into_iter().flatten().collect::<Vec<_>>().join(" ");
            return joined;
        }
        if let Some(name) = string_at(scope, &kind_key).or_else(|| string_at(scope, "name")) {
            return name;
        }
    }
    format!("Unknown {}", kind.label())
}

fn contact_field(raw: &Value, keys: &[&str]) -> Option<String> {
    let scopes = std::iter::once(Some(raw)).chain(CONTACT_SCOPES.iter().map(|s| raw.get(*s)));
    for scope in scopes.flatten() {
        if let Some(v) = keys.iter().find_map(|k| string_at(scope, k)) {
            return Some(v);
        }
    }
    None
}

fn expertise_tags(raw: &Value) -> Vec<String> {
    let Some(items) = ["areas_of_expertise", "expertise"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_array))
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(_) | Value::Number(_) => scalar_string(item),
            Value::Object(_) => string_at(item, "name"),
            _ => None,
        })
        .collect()
}

/// A non-blank string (or number rendered as a string) at `key`.
fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_string)
}

fn nested_string(value: &Value, object: &str, key: &str) -> Option<String> {
    value.get(object).and_then(|o| string_at(o, key))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(kind: EntityKind) -> NormalizeContext {
        NormalizeContext::new(
            kind,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "branch-main",
        )
    }

    #[test]
    fn empty_object_is_well_formed() {
        let rec = normalize_record(&json!({}), &ctx(EntityKind::Student));
        assert_eq!(rec.status, AttendanceStatus::NotMarked);
        assert_eq!(rec.entity_name, "Unknown Student");
        assert_eq!(rec.entity_id, "unidentified");
        assert_eq!(rec.id, "unidentified_2024-03-01");
        assert_eq!(rec.branch_id, "branch-main");
        assert!(rec.check_in_time.is_none());
        assert!(rec.check_out_time.is_none());
        assert!(rec.notes.is_none());
        assert!(rec.expertise.is_empty());
    }

    #[test]
    fn non_object_input_is_well_formed() {
        for raw in [json!(null), json!(42), json!("x"), json!([1, 2])] {
            let rec = normalize_record(&raw, &ctx(EntityKind::Coach));
            assert_eq!(rec.status, AttendanceStatus::NotMarked);
            assert_eq!(rec.entity_name, "Unknown Coach");
        }
    }

    #[test]
    fn name_fallback_chain() {
        let c = ctx(EntityKind::Student);
        let full = json!({"id": 1, "full_name": "Ana Lima", "first_name": "X"});
        assert_eq!(normalize_record(&full, &c).entity_name, "Ana Lima");

        let split = json!({"id": 1, "first_name": "Ana", "last_name": "Lima"});
        assert_eq!(normalize_record(&split, &c).entity_name, "Ana Lima");

        let student_name = json!({"id": 1, "student_name": "Ana"});
        assert_eq!(normalize_record(&student_name, &c).entity_name, "Ana");

        let nested = json!({"id": 1, "personal_info": {"first_name": "Bo", "last_name": "Kim"}});
        assert_eq!(normalize_record(&nested, &c).entity_name, "Bo Kim");

        let blank = json!({"id": 1, "full_name": "   ", "student_name": ""});
        assert_eq!(normalize_record(&blank, &c).entity_name, "Unknown Student");
    }

    #[test]
    fn contact_info_is_searched() {
        let raw = json!({
            "id": "c7",
            "contact_info": {"email": "coach@dojo.test", "phone_number": "555-0101"}
        });
        let rec = normalize_record(&raw, &ctx(EntityKind::Coach));
        assert_eq!(rec.email.as_deref(), Some("coach@dojo.test"));
        assert_eq!(rec.phone.as_deref(), Some("555-0101"));
    }

    #[test]
    fn numeric_and_kind_specific_ids() {
        let c = ctx(EntityKind::Coach);
        assert_eq!(normalize_record(&json!({"id": 17}), &c).id, "17_2024-03-01");
        assert_eq!(normalize_record(&json!({"coach_id": "c-9"}), &c).entity_id, "c-9");
        assert_eq!(normalize_record(&json!({"_id": "abc"}), &c).entity_id, "abc");
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let raw = json!({"id": "s1", "full_name": "A"});
        let c = ctx(EntityKind::Student);
        assert_eq!(normalize_record(&raw, &c).id, normalize_record(&raw, &c).id);
    }

    #[test]
    fn attendance_sub_object() {
        let raw = json!({
            "id": "s1",
            "attendance": {
                "status": "late",
                "check_in_time": "2024-03-01T09:05:00",
                "check_out_time": "2024-03-01T17:30:00",
                "notes": "Marked by Sensei"
            }
        });
        let rec = normalize_record(&raw, &ctx(EntityKind::Student));
        assert_eq!(rec.status, AttendanceStatus::Late);
        assert_eq!(rec.check_in_time.as_deref(), Some("09:05 AM"));
        assert_eq!(rec.check_out_time.as_deref(), Some("05:30 PM"));
        assert_eq!(rec.notes.as_deref(), Some("Marked by Sensei"));
    }

    #[test]
    fn null_attendance_is_not_marked() {
        let raw = json!({"id": "s1", "attendance": null});
        assert_eq!(
            normalize_record(&raw, &ctx(EntityKind::Student)).status,
            AttendanceStatus::NotMarked
        );
    }

    #[test]
    fn unknown_status_is_not_marked() {
        let raw = json!({"id": "s1", "attendance": {"status": "excused"}});
        assert_eq!(
            normalize_record(&raw, &ctx(EntityKind::Student)).status,
            AttendanceStatus::NotMarked
        );
    }

    #[test]
    fn bad_timestamp_is_dropped_not_raised() {
        let raw = json!({
            "id": "s1",
            "attendance": {"status": "present", "check_in_time": "yesterday-ish"}
        });
        let rec = normalize_record(&raw, &ctx(EntityKind::Student));
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert!(rec.check_in_time.is_none());
    }

    #[test]
    fn rfc3339_timestamp_formats() {
        let shown = format_timestamp("2024-03-01T09:05:00Z").unwrap();
        assert!(shown.ends_with("AM") || shown.ends_with("PM"));
        assert_eq!(shown.len(), "09:05 AM".len());
    }

    #[test]
    fn naive_timestamp_variants() {
        assert_eq!(format_timestamp("2024-03-01 13:45:10").as_deref(), Some("01:45 PM"));
        assert_eq!(format_timestamp("2024-03-01T00:15:00.250").as_deref(), Some("12:15 AM"));
        assert_eq!(format_timestamp("2024-03-01T07:00").as_deref(), Some("07:00 AM"));
        assert_eq!(format_timestamp(""), None);
    }

    #[test]
    fn branch_course_and_expertise() {
        let raw = json!({
            "id": "c1",
            "branch": {"id": "b2", "name": "Downtown"},
            "course": {"id": 5, "title": "Karate Basics"},
            "areas_of_expertise": ["Kata", {"name": "Kumite"}, null]
        });
        let rec = normalize_record(&raw, &ctx(EntityKind::Coach));
        assert_eq!(rec.branch_id, "b2");
        assert_eq!(rec.branch_name.as_deref(), Some("Downtown"));
        assert_eq!(rec.course_id.as_deref(), Some("5"));
        assert_eq!(rec.course_name.as_deref(), Some("Karate Basics"));
        assert_eq!(rec.expertise, vec!["Kata", "Kumite"]);
    }

    #[test]
    fn roster_shapes() {
        let item = json!({"id": "s1"});
        let c = ctx(EntityKind::Student);
        for shape in [
            json!({"students": [item.clone()]}),
            json!({"data": [item.clone()]}),
            json!({"data": {"students": [item.clone()]}}),
            json!([item.clone()]),
        ] {
            let recs = normalize_roster(&shape, &c);
            assert_eq!(recs.len(), 1, "shape {shape}");
            assert_eq!(recs[0].id, "s1_2024-03-01");
        }
        assert!(normalize_roster(&json!({"coaches": [item]}), &c).is_empty());
        assert!(normalize_roster(&json!({"message": "ok"}), &c).is_empty());
    }

    #[test]
    fn malformed_item_does_not_blank_roster() {
        let response = json!({"coaches": [
            {"id": "c1", "full_name": "Good"},
            "garbage",
            {"attendance": {"status": "present", "check_in_time": "bogus"}},
            {"id": "c2", "full_name": "Also Good"}
        ]});
        let recs = normalize_roster(&response, &ctx(EntityKind::Coach));
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[1].id, "unidentified-1_2024-03-01");
        assert_eq!(recs[2].id, "unidentified-2_2024-03-01");
        assert_eq!(recs[2].status, AttendanceStatus::Present);
        assert_eq!(recs[3].entity_name, "Also Good");
    }

    #[test]
    fn synthetic_id_never_collides_with_real_id() {
        let response = json!({"students": [
            {"id": "unidentified-1", "full_name": "Real"},
            {"full_name": "No Id"},
            {"id": "unidentified-1~1", "full_name": "Also Real"}
        ]});
        let recs = normalize_roster(&response, &ctx(EntityKind::Student));
        let ids: Vec<_> = recs.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["unidentified-1", "unidentified-1~2", "unidentified-1~1"]);
    }
}
