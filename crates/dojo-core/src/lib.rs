pub mod export;
pub mod filter;
pub mod normalize;
pub mod record;
pub mod stats;

pub use export::{export_csv, write_csv};
pub use filter::{filter_records, matches_query};
pub use normalize::{NormalizeContext, format_timestamp, normalize_record, normalize_roster, roster_items};
pub use record::{AttendanceRecord, AttendanceStatus, EntityKind, ParseStatusError, record_id};
pub use stats::AttendanceStats;
