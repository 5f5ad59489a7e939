//! Shared attendance types for the Dojo dashboards and the sync engine.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who an attendance row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Student,
    Coach,
}

impl EntityKind {
    /// Wire value used for `user_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Student => "student",
            EntityKind::Coach => "coach",
        }
    }

    /// Path segment and response key: `students` / `coaches`.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Coach => "coaches",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Student => "Student",
            EntityKind::Coach => "Coach",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Ok(EntityKind::Student),
            "coach" | "coaches" => Ok(EntityKind::Coach),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Attendance state of one entity on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    #[default]
    NotMarked,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown attendance status: {0:?}")]
pub struct ParseStatusError(pub String);

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::NotMarked => "not_marked",
        }
    }

    /// Title-cased label used in tables and CSV exports.
    pub fn title(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::NotMarked => "Not Marked",
        }
    }

    /// Present and late both count towards the attendance rate.
    pub fn counts_as_attended(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }

    /// Every status except absent carries a check-in time.
    pub fn stamps_check_in(self) -> bool {
        self != AttendanceStatus::Absent
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "not_marked" | "not-marked" | "not marked" | "" => Ok(AttendanceStatus::NotMarked),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// One row of an attendance sheet: a student or coach on a given date.
///
/// Built by [`crate::normalize_record`] from whatever shape the backend
/// returned; every optional upstream field is resolved there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Composite key, see [`record_id`].
    pub id: String,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub branch_id: String,
    pub branch_name: Option<String>,
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub expertise: Vec<String>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// 12-hour display string, e.g. `09:05 AM`.
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub notes: Option<String>,
}

/// Composite record key `{entity_id}_{yyyy-MM-dd}`.
///
/// The date suffix has a fixed width, so two keys are equal only when both
/// the entity and the date are.
pub fn record_id(entity_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", entity_id, date.format("%Y-%m-%d"))
}
