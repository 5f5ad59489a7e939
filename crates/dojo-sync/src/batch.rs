//! Bulk-save policy and accounting.

use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use tracing::debug;

use crate::transport::AttendanceTransport;
use crate::wire::MarkRequest;
use crate::{FailureKind, SyncError};

/// How a bulk save issues its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// One write at a time, in sheet order; each waits for the previous
    /// response.
    #[default]
    Sequential,
    /// Up to `n` writes in flight. Results are still accounted in sheet
    /// order.
    Bounded(usize),
}

impl BatchPolicy {
    /// `0` and `1` both mean sequential.
    pub fn with_concurrency(n: usize) -> Self {
        if n <= 1 {
            BatchPolicy::Sequential
        } else {
            BatchPolicy::Bounded(n)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub record_id: String,
    pub entity_name: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Tally of one bulk save. Counts are additive and independent of the
/// order writes completed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSaveReport {
    pub success_count: usize,
    pub error_count: usize,
    pub failures: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcomeKind {
    /// Nothing was marked, so nothing was sent.
    Empty,
    AllSucceeded,
    PartialBulkFailure,
    AllFailed,
}

impl BulkSaveReport {
    pub fn attempted(&self) -> usize {
        self.success_count + self.error_count
    }

    pub fn outcome_kind(&self) -> BulkOutcomeKind {
        match (self.success_count, self.error_count) {
            (0, 0) => BulkOutcomeKind::Empty,
            (_, 0) => BulkOutcomeKind::AllSucceeded,
            (0, _) => BulkOutcomeKind::AllFailed,
            _ => BulkOutcomeKind::PartialBulkFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The sheet has no unsaved marks.
    NothingToSave,
    /// Another bulk save is still running.
    AlreadySaving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSaveOutcome {
    Skipped(SkipReason),
    Completed(BulkSaveReport),
}

impl BulkSaveOutcome {
    pub fn report(&self) -> Option<&BulkSaveReport> {
        match self {
            BulkSaveOutcome::Completed(report) => Some(report),
            BulkSaveOutcome::Skipped(_) => None,
        }
    }
}

/// One write of a batch and its result.
pub(crate) struct WriteResult {
    pub record_id: String,
    pub request: MarkRequest,
    pub result: Result<Value, SyncError>,
}

/// Send every request under `policy`. Results come back in input order.
/// A failure never stops the remaining writes.
pub(crate) async fn send_all<T>(
    transport: &T,
    writes: Vec<(String, MarkRequest)>,
    policy: BatchPolicy,
) -> Vec<WriteResult>
where
    T: AttendanceTransport + ?Sized,
{
    match policy {
        BatchPolicy::Sequential => {
            let mut results = Vec::with_capacity(writes.len());
            for (record_id, request) in writes {
                debug!(record_id = %record_id, "sending bulk write");
                let result = transport.mark(&request).await;
                results.push(WriteResult {
                    record_id,
                    request,
                    result,
                });
            }
            results
        }
        BatchPolicy::Bounded(limit) => {
            stream::iter(writes)
                .map(move |(record_id, request)| async move {
                    let result = transport.mark(&request).await;
                    WriteResult {
                        record_id,
                        request,
                        result,
                    }
                })
                .buffered(limit.max(1))
                .collect()
                .await
        }
    }
}
