use std::time::Duration;

use chrono::NaiveTime;

use crate::batch::BatchPolicy;

/// Tunables for one [`crate::AttendanceSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Branch used for rows that do not name one, and sent with every write.
    pub branch_id: String,
    /// Who is marking; recorded as `"Marked by <actor>"`.
    pub actor: String,
    /// How long a row shows success/error before reverting to idle.
    pub status_reset_after: Duration,
    /// How long a transient error or success banner stays up.
    pub notice_dismiss_after: Duration,
    pub batch: BatchPolicy,
    /// Wall-clock time attached to `attendance_date` in write payloads.
    pub attendance_time: NaiveTime,
}

impl SessionConfig {
    pub fn new(branch_id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            branch_id: branch_id.into(),
            actor: actor.into(),
            ..Self::default()
        }
    }

    pub fn with_batch(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            branch_id: String::new(),
            actor: "Admin".to_string(),
            status_reset_after: Duration::from_secs(2),
            notice_dismiss_after: Duration::from_secs(5),
            batch: BatchPolicy::Sequential,
            attendance_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}
