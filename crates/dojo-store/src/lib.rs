//! Storage layer: the per-session attendance sheet and its short-lived UI state.

mod error;
pub use error::StoreError;

mod expiring;
pub use expiring::ExpiringMap;

mod status;
pub use status::{Notice, NoticeBoard, NoticeLevel, SaveStatus, StatusBoard};

mod store;
pub use store::{AttendanceStore, ConfirmedMark};
