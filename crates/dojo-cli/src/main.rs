mod display;
mod roster;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use dojo_core::{AttendanceStatus, EntityKind, record_id, write_csv};
use dojo_store::NoticeLevel;
use dojo_sync::{AttendanceSession, BatchPolicy, BulkOutcomeKind, SessionConfig, SyncClient};

#[derive(Parser)]
#[command(name = "dojo", version, about = "Attendance sheets for the academy backend")]
struct Cli {
    /// Backend API base URL.
    #[arg(
        long,
        env = "DOJO_API_URL",
        default_value = "http://localhost:8000/api",
        global = true
    )]
    api_url: String,

    /// Bearer token for the backend.
    #[arg(long, env = "DOJO_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Branch sent with writes for rows that carry none.
    #[arg(long, env = "DOJO_BRANCH_ID", default_value = "", global = true)]
    branch: String,

    /// Name recorded in the notes of every write.
    #[arg(long, env = "DOJO_ACTOR", default_value = "Admin", global = true)]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Sheet {
    /// `student` or `coach`.
    #[arg(long, default_value = "student")]
    kind: EntityKind,

    /// Sheet date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl Sheet {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show the attendance sheet.
    List {
        #[command(flatten)]
        sheet: Sheet,
        /// Only rows matching this text (name, email, course, branch, expertise).
        #[arg(long, short, default_value = "")]
        query: String,
        /// Print rows as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Mark one row and write it immediately.
    Mark {
        #[command(flatten)]
        sheet: Sheet,
        /// Student or coach id.
        entity_id: String,
        /// present, absent, late.
        status: AttendanceStatus,
    },
    /// Stage several marks and save them in one bulk write.
    Save {
        #[command(flatten)]
        sheet: Sheet,
        /// Writes kept in flight at once. 1 saves one row at a time.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        /// Marks as ENTITY_ID=STATUS.
        #[arg(required = true)]
        marks: Vec<String>,
    },
    /// Show the attendance summary for a date.
    Stats {
        #[command(flatten)]
        sheet: Sheet,
    },
    /// Export the sheet as CSV.
    Export {
        #[command(flatten)]
        sheet: Sheet,
        #[arg(long, short, default_value = "")]
        query: String,
        /// Output file. Writes to stdout when omitted.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    tracing::debug!(api_url = %cli.api_url, "dojo v{}", env!("CARGO_PKG_VERSION"));

    let client = Arc::new(SyncClient::new(cli.api_url.clone()).with_token(cli.token.clone()));
    let config = SessionConfig::new(cli.branch.clone(), cli.actor.clone());

    match cli.command {
        Command::List { sheet, query, json } => {
            let session = open(client, &sheet, config).await?;
            let rows = session.search(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                display::print_sheet(session.kind(), session.date(), &rows);
                display::print_stats(&session.stats());
            }
        }
        Command::Mark {
            sheet,
            entity_id,
            status,
        } => {
            let session = open(client, &sheet, config).await?;
            let id = record_id(&entity_id, session.date());
            let record = session
                .mark(&id, status)
                .await
                .with_context(|| format!("marking {entity_id} {status}"))?;
            display::print_marked(&record);
        }
        Command::Save {
            sheet,
            concurrency,
            marks,
        } => {
            let marks = marks
                .iter()
                .map(|m| roster::parse_mark(m))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let config = config.with_batch(BatchPolicy::with_concurrency(concurrency));
            let session = open(client, &sheet, config).await?;

            let run = roster::run_bulk_save(&session, &marks).await?;
            let Some(report) = run.outcome.report() else {
                eprintln!("Nothing to save.");
                return Ok(());
            };
            display::print_report(report, run.elapsed_secs);
            if let Some(notice) = session.notice(NoticeLevel::Error) {
                eprintln!("{}", notice.message);
            }
            if report.outcome_kind() == BulkOutcomeKind::AllFailed {
                anyhow::bail!("all {} attendance writes failed", report.error_count);
            }
        }
        Command::Stats { sheet } => {
            let session = open(client, &sheet, config).await?;
            display::print_stats(&session.summary().await);
        }
        Command::Export { sheet, query, out } => {
            let session = open(client, &sheet, config).await?;
            match out {
                Some(path) => {
                    let rows = session.search(&query);
                    write_csv(&path, &rows, session.kind())
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Wrote {} rows to {}", rows.len(), path.display());
                }
                None => print!("{}", session.export_csv(&query)),
            }
        }
    }

    Ok(())
}

async fn open(
    client: Arc<SyncClient>,
    sheet: &Sheet,
    config: SessionConfig,
) -> anyhow::Result<AttendanceSession<SyncClient>> {
    let date = sheet.date();
    AttendanceSession::open(client, sheet.kind, date, config)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("loading {} attendance for {date}", sheet.kind))
}
