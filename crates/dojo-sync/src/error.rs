use dojo_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("authentication required")]
    AuthRequired,
    #[error("access denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("transport failed: {0}")]
    Transport(String),
}

/// How a failure is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No usable session; nothing is rendered.
    AuthRequired,
    /// HTTP 403, shown as "Access Denied" until the user moves on.
    PermissionDenied,
    /// HTTP 404 or an id the sheet does not hold.
    NotFound,
    /// Anything else; retryable, auto-dismissed.
    Transient,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::AuthRequired => FailureKind::AuthRequired,
            SyncError::Server { status: 401, .. } => FailureKind::AuthRequired,
            SyncError::PermissionDenied(_) | SyncError::Server { status: 403, .. } => {
                FailureKind::PermissionDenied
            }
            SyncError::NotFound(_)
            | SyncError::Server { status: 404, .. }
            | SyncError::Store(StoreError::UnknownRecord(_)) => FailureKind::NotFound,
            _ => FailureKind::Transient,
        }
    }

    /// Whether the banner for this error should stay until acted on.
    pub fn is_persistent(&self) -> bool {
        self.kind() != FailureKind::Transient
    }

    /// Banner text for this error.
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::AuthRequired => "Authentication required. Please log in again.".to_string(),
            FailureKind::PermissionDenied => {
                "Access Denied: you do not have permission to view or change this attendance."
                    .to_string()
            }
            FailureKind::NotFound => format!("Attendance record not found: {self}"),
            FailureKind::Transient => format!("Something went wrong, please try again. ({self})"),
        }
    }
}
