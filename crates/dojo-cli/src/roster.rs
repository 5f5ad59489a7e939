//! Bulk save pipeline: stage `ENTITY=STATUS` marks, then write them in one pass.

use std::time::Instant;

use anyhow::Context;
use dojo_core::{AttendanceStatus, record_id};
use dojo_sync::{AttendanceSession, AttendanceTransport, BulkSaveOutcome};

pub struct SaveRun {
    pub outcome: BulkSaveOutcome,
    pub elapsed_secs: f64,
}

/// Parse one `ENTITY_ID=STATUS` argument.
pub fn parse_mark(raw: &str) -> anyhow::Result<(String, AttendanceStatus)> {
    let (entity_id, status) = raw
        .split_once('=')
        .with_context(|| format!("expected ENTITY_ID=STATUS, got {raw:?}"))?;
    let entity_id = entity_id.trim();
    if entity_id.is_empty() {
        anyhow::bail!("missing entity id in {raw:?}");
    }
    let status: AttendanceStatus = status.parse()?;
    if status == AttendanceStatus::NotMarked {
        anyhow::bail!("{entity_id}: status must be present, absent or late");
    }
    Ok((entity_id.to_string(), status))
}

/// Stage every mark on the loaded sheet, then save them all.
pub async fn run_bulk_save<T>(
    session: &AttendanceSession<T>,
    marks: &[(String, AttendanceStatus)],
) -> anyhow::Result<SaveRun>
where
    T: AttendanceTransport + ?Sized,
{
    let start = Instant::now();
    let date = session.date();

    for (entity_id, status) in marks {
        let id = record_id(entity_id, date);
        session
            .stage(&id, *status)
            .with_context(|| format!("{entity_id} is not on the {} sheet for {date}", session.kind()))?;
    }
    eprintln!("  Staged {} marks for {date}", marks.len());

    let outcome = session.save_all().await;
    Ok(SaveRun {
        outcome,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
