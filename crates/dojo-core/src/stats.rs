//! Attendance summary counts derived from a record set.

use serde::{Deserialize, Serialize};

use crate::record::{AttendanceRecord, AttendanceStatus};

/// Counts for one sheet. Always derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub not_marked: usize,
    /// `(present + late) / total * 100`, `0` for an empty sheet.
    pub attendance_rate: f64,
}

impl AttendanceStats {
    /// Recount from scratch. Callers run this after every status change
    /// instead of adjusting counters.
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        Self::from_statuses(records.iter().map(|r| r.status))
    }

    pub fn from_statuses(statuses: impl IntoIterator<Item = AttendanceStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            match status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Late => stats.late += 1,
                AttendanceStatus::NotMarked => stats.not_marked += 1,
            }
        }
        stats.attendance_rate = rate(stats.present + stats.late, stats.total);
        stats
    }

    /// Build from counts reported elsewhere (e.g. the stats endpoint).
    /// Anything not present, absent or late is counted as not marked.
    /// Sums saturate, so inconsistent counts never overflow.
    pub fn from_counts(total: usize, present: usize, absent: usize, late: usize) -> Self {
        let attended = present.saturating_add(late);
        Self {
            total,
            present,
            absent,
            late,
            not_marked: total.saturating_sub(attended.saturating_add(absent)),
            attendance_rate: rate(attended, total),
        }
    }

    /// Rate rounded to two decimals, as shown on the dashboard cards.
    pub fn rounded_rate(&self) -> f64 {
        (self.attendance_rate * 100.0).round() / 100.0
    }
}

fn rate(attended: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        attended as f64 / total as f64 * 100.0
    }
}
