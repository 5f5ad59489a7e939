use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no attendance record with id {0}")]
    UnknownRecord(String),
}
