//! Service-layer errors and their user-facing rendering.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Rejected before any store call.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Notice text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(StoreError::MissingColumn { table, column }) => {
                let what = if table.is_empty() { column.clone() } else { format!("{table}.{column}") };
                format!("The database schema is out of date (missing column {what}). Run `zonemap migrate` and try again.")
            }
            Self::Store(StoreError::SchemaOutdated(_)) => {
                "The database schema is out of date. Run `zonemap migrate` and try again.".to_owned()
            }
            Self::Store(StoreError::Unauthorized(_)) => {
                "Your session is no longer authorized. Sign in again to keep editing.".to_owned()
            }
            other => other.to_string(),
        }
    }

    /// Authorization failures abort the whole operation: no fallback, no reload.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unauthorized(_)))
    }
}
