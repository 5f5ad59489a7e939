//! In-memory attendance sheet for one page session.
//!
//! Holds the normalised records in load order, an id index, the derived
//! stats and the set-level unsaved-changes flag. Every status change goes
//! through this type so the stats are recounted in exactly one place.

use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use dojo_core::normalize::display_time;
use dojo_core::{AttendanceRecord, AttendanceStats, AttendanceStatus, EntityKind, filter_records};
use tracing::{debug, warn};

use crate::StoreError;

/// Fields the server confirmed after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedMark {
    pub status: AttendanceStatus,
    pub check_in_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceStore {
    kind: EntityKind,
    date: NaiveDate,
    records: Vec<AttendanceRecord>,
    index: HashMap<String, usize>,
    stats: AttendanceStats,
    has_unsaved_changes: bool,
    /// Bumped by every staged mark.
    stage_count: u64,
}

impl AttendanceStore {
    pub fn new(kind: EntityKind, date: NaiveDate, records: Vec<AttendanceRecord>) -> Self {
        let mut store = Self {
            kind,
            date,
            records: Vec::new(),
            index: HashMap::new(),
            stats: AttendanceStats::default(),
            has_unsaved_changes: false,
            stage_count: 0,
        };
        store.replace_all(date, records);
        store
    }

    /// Swap in a freshly loaded sheet (refresh or date change).
    ///
    /// Duplicate ids keep their first occurrence. Clears the unsaved flag.
    pub fn replace_all(&mut self, date: NaiveDate, records: Vec<AttendanceRecord>) {
        self.date = date;
        self.records.clear();
        self.index.clear();
        for record in records {
            if self.index.contains_key(&record.id) {
                warn!(id = %record.id, "duplicate attendance record dropped");
                continue;
            }
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
        self.has_unsaved_changes = false;
        self.recompute_stats();
        debug!(kind = %self.kind, date = %self.date, count = self.records.len(), "sheet loaded");
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&AttendanceRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> &AttendanceStats {
        &self.stats
    }

    pub fn recompute_stats(&mut self) -> &AttendanceStats {
        self.stats = AttendanceStats::from_records(&self.records);
        &self.stats
    }

    /// Optimistically set a row's status.
    ///
    /// Any status but absent stamps the check-in with the current local time;
    /// absent clears it.
    pub fn apply_mark(
        &mut self,
        id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, StoreError> {
        let record = self.get_mut(id)?;
        record.status = status;
        record.check_in_time = status
            .stamps_check_in()
            .then(|| display_time(Local::now()));
        let updated = record.clone();
        self.recompute_stats();
        Ok(updated)
    }

    /// [`apply_mark`](Self::apply_mark) for sheets saved in bulk later.
    pub fn stage_mark(
        &mut self,
        id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, StoreError> {
        let updated = self.apply_mark(id, status)?;
        self.has_unsaved_changes = true;
        self.stage_count += 1;
        Ok(updated)
    }

    /// Number of marks staged so far. A bulk save compares this before and
    /// after its writes to tell whether anything was re-staged meanwhile.
    pub fn stage_count(&self) -> u64 {
        self.stage_count
    }

    /// Overwrite a row with what the server confirmed.
    pub fn merge_confirmed(
        &mut self,
        id: &str,
        confirmed: ConfirmedMark,
    ) -> Result<AttendanceRecord, StoreError> {
        let record = self.get_mut(id)?;
        record.status = confirmed.status;
        record.check_in_time = confirmed.check_in_time;
        if confirmed.notes.is_some() {
            record.notes = confirmed.notes;
        }
        let updated = record.clone();
        self.recompute_stats();
        Ok(updated)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn clear_unsaved_changes(&mut self) {
        self.has_unsaved_changes = false;
    }

    /// Rows a bulk save should write: everything marked, in sheet order.
    pub fn pending_writes(&self) -> Vec<AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| r.status != AttendanceStatus::NotMarked)
            .cloned()
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<&AttendanceRecord> {
        filter_records(&self.records, query)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut AttendanceRecord, StoreError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.records[i]),
            None => Err(StoreError::UnknownRecord(id.to_string())),
        }
    }
}
