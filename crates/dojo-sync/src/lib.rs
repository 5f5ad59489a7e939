//! Sync layer: transport seam, HTTP client, and the attendance session that
//! reconciles local marks with the backend.

mod batch;
mod config;
mod error;
mod session;
mod transport;
pub mod wire;

#[cfg(feature = "http")]
pub mod http;

pub use batch::{BatchPolicy, BulkFailure, BulkOutcomeKind, BulkSaveOutcome, BulkSaveReport, SkipReason};
pub use config::SessionConfig;
pub use error::{FailureKind, SyncError};
pub use session::AttendanceSession;
pub use transport::AttendanceTransport;
pub use wire::MarkRequest;

#[cfg(feature = "http")]
pub use http::SyncClient;
