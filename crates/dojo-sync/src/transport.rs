use async_trait::async_trait;
use chrono::NaiveDate;
use dojo_core::EntityKind;
use serde_json::Value;

use crate::SyncError;
use crate::wire::MarkRequest;

/// The backend as seen by a session. Responses are returned raw; shape
/// handling belongs to the normaliser and [`crate::wire`].
#[async_trait]
pub trait AttendanceTransport: Send + Sync {
    /// `GET /attendance/{students|coaches}?date=YYYY-MM-DD`
    async fn fetch_roster(&self, kind: EntityKind, date: NaiveDate) -> Result<Value, SyncError>;

    /// `POST /attendance/mark`
    async fn mark(&self, request: &MarkRequest) -> Result<Value, SyncError>;

    /// `GET /attendance/stats?date=YYYY-MM-DD`; `None` when the backend has
    /// no stats for the date.
    async fn fetch_stats(&self, date: NaiveDate) -> Result<Option<Value>, SyncError>;
}
