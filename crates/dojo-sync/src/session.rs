//! One attendance page session: the sheet, its row indicators and banners,
//! and the two write policies.
//!
//! - **Immediate** ([`AttendanceSession::mark`]): every mark is written at
//!   once. Writes to different rows run independently; writes to the same
//!   row are queued so the last mark lands last. A failed write keeps the
//!   local mark and flags the row.
//! - **Deferred** ([`AttendanceSession::stage`] then
//!   [`AttendanceSession::save_all`]): marks only touch the local sheet and
//!   raise the unsaved flag; a bulk save writes every marked row.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate};
use dojo_core::{
    AttendanceRecord, AttendanceStats, AttendanceStatus, EntityKind, NormalizeContext, export_csv,
    normalize_roster,
};
use dojo_store::{AttendanceStore, Notice, NoticeBoard, NoticeLevel, SaveStatus, StatusBoard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::batch::{
    BulkFailure, BulkSaveOutcome, BulkSaveReport, SkipReason, WriteResult, send_all,
};
use crate::config::SessionConfig;
use crate::transport::AttendanceTransport;
use crate::wire::{MarkRequest, confirmed_fields, parse_server_stats};
use crate::{FailureKind, SyncError};

pub struct AttendanceSession<T: ?Sized> {
    transport: Arc<T>,
    config: SessionConfig,
    store: Mutex<AttendanceStore>,
    statuses: StatusBoard,
    notices: NoticeBoard,
    row_locks: RowLocks,
    saving: AtomicBool,
}

impl<T> AttendanceSession<T>
where
    T: AttendanceTransport + ?Sized,
{
    /// Load the sheet for `kind` on `date`.
    ///
    /// Fails without a partial sheet when the roster cannot be fetched.
    pub async fn open(
        transport: Arc<T>,
        kind: EntityKind,
        date: NaiveDate,
        config: SessionConfig,
    ) -> Result<Self, SyncError> {
        let records = fetch_records(transport.as_ref(), kind, date, &config.branch_id).await?;
        Ok(Self {
            transport,
            config,
            store: Mutex::new(AttendanceStore::new(kind, date, records)),
            statuses: StatusBoard::new(),
            notices: NoticeBoard::new(),
            row_locks: RowLocks::default(),
            saving: AtomicBool::new(false),
        })
    }

    /// Re-fetch the current date and replace the sheet.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.reload(self.date()).await
    }

    /// Load another date, replacing the sheet.
    pub async fn change_date(&self, date: NaiveDate) -> Result<(), SyncError> {
        self.reload(date).await
    }

    async fn reload(&self, date: NaiveDate) -> Result<(), SyncError> {
        let kind = self.kind();
        match fetch_records(self.transport.as_ref(), kind, date, &self.config.branch_id).await {
            Ok(records) => {
                self.lock_store().replace_all(date, records);
                self.statuses.clear();
                Ok(())
            }
            Err(e) => {
                self.report_error(&e);
                Err(e)
            }
        }
    }

    // ── Read side ──

    pub fn kind(&self) -> EntityKind {
        self.lock_store().kind()
    }

    pub fn date(&self) -> NaiveDate {
        self.lock_store().date()
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.lock_store().records().to_vec()
    }

    pub fn record(&self, id: &str) -> Option<AttendanceRecord> {
        self.lock_store().get(id).cloned()
    }

    /// Rows matching a free-text query, in sheet order.
    pub fn search(&self, query: &str) -> Vec<AttendanceRecord> {
        self.lock_store().search(query).into_iter().cloned().collect()
    }

    /// Counts derived from the sheet as it is right now.
    pub fn stats(&self) -> AttendanceStats {
        *self.lock_store().stats()
    }

    /// Server-reported counts for the date, or locally derived ones when
    /// the stats endpoint is unavailable.
    pub async fn summary(&self) -> AttendanceStats {
        let date = self.date();
        match self.transport.fetch_stats(date).await {
            Ok(Some(body)) => match parse_server_stats(&body) {
                Some(stats) => return stats,
                None => warn!(date = %date, "stats response had no totals; deriving locally"),
            },
            Ok(None) => debug!(date = %date, "no server stats; deriving locally"),
            Err(e) => warn!(date = %date, error = %e, "stats fetch failed; deriving locally"),
        }
        self.stats()
    }

    pub fn save_status(&self, id: &str) -> SaveStatus {
        self.statuses.status(id)
    }

    pub fn notice(&self, level: NoticeLevel) -> Option<Notice> {
        self.notices.current(level)
    }

    pub fn dismiss_notice(&self, level: NoticeLevel) {
        self.notices.dismiss(level);
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.lock_store().has_unsaved_changes()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// CSV of the rows matching `query`.
    pub fn export_csv(&self, query: &str) -> String {
        let store = self.lock_store();
        export_csv(store.search(query), store.kind())
    }

    // ── Immediate-write policy ──

    /// Mark a row and write it straight away.
    ///
    /// The local change is visible before the write starts and is kept if
    /// the write fails; the row then shows `error` and an error banner is
    /// posted. There is no retry.
    pub async fn mark(
        &self,
        id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, SyncError> {
        let (request, applied) = {
            let mut store = self.lock_store();
            let record = store.apply_mark(id, status)?;
            (self.request_for(&record), record)
        };
        self.statuses.begin(id);

        let _row = self.row_locks.acquire(id).await;
        // An earlier write on this row may have settled while we queued.
        self.statuses.begin(id);

        info!(record_id = id, status = %status, "writing attendance mark");
        match self.transport.mark(&request).await {
            Ok(response) => {
                let confirmed = confirmed_fields(&response, &request);
                let record = match self.lock_store().merge_confirmed(id, confirmed.clone()) {
                    Ok(record) => record,
                    Err(e) => {
                        // The sheet was reloaded while the write was in flight.
                        warn!(record_id = id, error = %e, "marked row no longer on sheet");
                        AttendanceRecord {
                            status: confirmed.status,
                            check_in_time: confirmed.check_in_time,
                            notes: confirmed.notes.or(applied.notes.clone()),
                            ..applied
                        }
                    }
                };
                self.statuses
                    .settle(id, SaveStatus::Success, self.config.status_reset_after);
                Ok(record)
            }
            Err(e) => {
                warn!(record_id = id, error = %e, "attendance write failed; local mark kept");
                self.statuses
                    .settle(id, SaveStatus::Error, self.config.status_reset_after);
                self.report_error(&e);
                Err(e)
            }
        }
    }

    // ── Deferred bulk-write policy ──

    /// Mark a row locally and raise the unsaved flag. Nothing is sent.
    pub fn stage(&self, id: &str, status: AttendanceStatus) -> Result<AttendanceRecord, SyncError> {
        Ok(self.lock_store().stage_mark(id, status)?)
    }

    /// Write every marked row.
    ///
    /// Skipped when nothing is unsaved or another bulk save is running.
    /// Every row is attempted regardless of earlier failures. The unsaved
    /// flag clears only when at least one write succeeded and nothing was
    /// staged while the writes were in flight. A row re-marked during the
    /// save keeps its newer local status.
    pub async fn save_all(&self) -> BulkSaveOutcome {
        if !self.has_unsaved_changes() {
            return BulkSaveOutcome::Skipped(SkipReason::NothingToSave);
        }
        let Some(_latch) = SavingLatch::try_acquire(&self.saving) else {
            debug!("bulk save already running; ignoring");
            return BulkSaveOutcome::Skipped(SkipReason::AlreadySaving);
        };

        let (writes, names, staged_before) = {
            let store = self.lock_store();
            let pending = store.pending_writes();
            let names = pending
                .iter()
                .map(|r| (r.id.clone(), r.entity_name.clone()))
                .collect::<HashMap<String, String>>();
            let writes = pending
                .iter()
                .map(|r| (r.id.clone(), self.request_for(r)))
                .collect::<Vec<(String, MarkRequest)>>();
            (writes, names, store.stage_count())
        };

        info!(count = writes.len(), policy = ?self.config.batch, "bulk saving attendance");
        let results = send_all(self.transport.as_ref(), writes, self.config.batch).await;

        let mut report = BulkSaveReport::default();
        for WriteResult {
            record_id,
            request,
            result,
        } in results
        {
            match result {
                Ok(response) => {
                    report.success_count += 1;
                    let confirmed = confirmed_fields(&response, &request);
                    let mut store = self.lock_store();
                    match store.get(&record_id).map(|r| r.status) {
                        Some(current) if current == request.status => {
                            if let Err(e) = store.merge_confirmed(&record_id, confirmed) {
                                warn!(record_id = %record_id, error = %e, "saved row no longer on sheet");
                            }
                        }
                        Some(current) => {
                            debug!(record_id = %record_id, local = %current, sent = %request.status,
                                "row re-marked during save; keeping local mark");
                        }
                        None => warn!(record_id = %record_id, "saved row no longer on sheet"),
                    }
                }
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "bulk write failed");
                    report.error_count += 1;
                    self.statuses
                        .settle(&record_id, SaveStatus::Error, self.config.status_reset_after);
                    report.failures.push(BulkFailure {
                        entity_name: names.get(&record_id).cloned().unwrap_or_default(),
                        record_id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if report.success_count > 0 {
            let mut store = self.lock_store();
            if store.stage_count() == staged_before {
                store.clear_unsaved_changes();
            } else {
                debug!("marks staged during save; sheet stays unsaved");
            }
            drop(store);
            self.notices.post(
                Notice::success(format!(
                    "Saved attendance for {} {}",
                    report.success_count,
                    plural(report.success_count, "record")
                )),
                Some(self.config.notice_dismiss_after),
            );
        }
        if report.error_count > 0 {
            let persistent = report
                .failures
                .iter()
                .any(|f| f.kind != FailureKind::Transient);
            self.notices.post(
                Notice::error(format!(
                    "Failed to save attendance for {} {}",
                    report.error_count,
                    plural(report.error_count, "record")
                )),
                (!persistent).then_some(self.config.notice_dismiss_after),
            );
        }
        info!(
            succeeded = report.success_count,
            failed = report.error_count,
            "bulk save complete"
        );
        BulkSaveOutcome::Completed(report)
    }

    // ── Internals ──

    fn lock_store(&self) -> MutexGuard<'_, AttendanceStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_for(&self, record: &AttendanceRecord) -> MarkRequest {
        MarkRequest::for_record(
            record,
            &self.config.branch_id,
            &self.config.actor,
            self.config.attendance_time,
            Local::now(),
        )
    }

    fn report_error(&self, error: &SyncError) {
        let dismiss_after = (!error.is_persistent()).then_some(self.config.notice_dismiss_after);
        self.notices.post(Notice::error(error.user_message()), dismiss_after);
    }
}

async fn fetch_records<T>(
    transport: &T,
    kind: EntityKind,
    date: NaiveDate,
    branch_id: &str,
) -> Result<Vec<AttendanceRecord>, SyncError>
where
    T: AttendanceTransport + ?Sized,
{
    info!(kind = %kind, date = %date, "loading attendance sheet");
    let response = transport.fetch_roster(kind, date).await?;
    let records = normalize_roster(&response, &NormalizeContext::new(kind, date, branch_id));
    info!(count = records.len(), "attendance sheet loaded");
    Ok(records)
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

/// Per-row write queue. Lock order is FIFO, so the last mark issued on a
/// row is the last one written.
#[derive(Default)]
struct RowLocks {
    rows: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RowLocks {
    async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut rows = self.rows.lock().await;
            Arc::clone(
                rows.entry(id.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

/// Holds the bulk-save flag; released on drop, including when the save
/// future is dropped mid-flight.
struct SavingLatch<'a>(&'a AtomicBool);

impl<'a> SavingLatch<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SavingLatch(flag))
    }
}

impl Drop for SavingLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
