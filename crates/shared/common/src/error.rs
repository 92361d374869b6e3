//! Unified error handling for the data-access core and the services above it.
//!
//! Absence is not an error: reads return `Option`/empty collections and only the
//! service layer lifts absence into [`AppError::NotFound`]. Store failures travel as a
//! single [`AppError::Persistence`] signal, and programmer-contract violations get
//! their own variants so callers can tell a bug from a runtime condition.

use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    // Store failures, propagated unchanged
    #[cfg(feature = "database")]
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    // Programmer-contract violations
    #[error("Unit of work has been disposed")]
    Disposed,

    #[error("Entity `{0}` is not tracked by this unit of work")]
    NotTracked(String),

    #[error("Unknown navigation `{path}` on `{entity}`")]
    UnknownNavigation { entity: String, path: String },

    #[error("Unknown column `{column}` on `{entity}`")]
    UnknownColumn { entity: String, column: String },

    // Caller-requested cancellation
    #[error("Operation cancelled")]
    Cancelled,

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            #[cfg(feature = "database")]
            AppError::Persistence(_) => "PERSISTENCE_FAILURE",
            AppError::Disposed => "UNIT_OF_WORK_DISPOSED",
            AppError::NotTracked(_) => "ENTITY_NOT_TRACKED",
            AppError::UnknownNavigation { .. } => "UNKNOWN_NAVIGATION",
            AppError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            AppError::Cancelled => "CANCELLED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the error indicates a bug in the calling code rather than
    /// a runtime condition worth recovering from.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AppError::Disposed
                | AppError::NotTracked(_)
                | AppError::UnknownNavigation { .. }
                | AppError::UnknownColumn { .. }
        )
    }

    /// Get user-facing message (hides store and internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),

            // Hide details; they go to the log instead
            #[cfg(feature = "database")]
            AppError::Persistence(e) => {
                tracing::error!("Persistence failure: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }

    /// True for failures reported by the persistent store.
    pub fn is_persistence(&self) -> bool {
        #[cfg(feature = "database")]
        {
            matches!(self, AppError::Persistence(_))
        }
        #[cfg(not(feature = "database"))]
        {
            false
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn not_tracked(entity: impl Into<String>) -> Self {
        AppError::NotTracked(entity.into())
    }

    pub fn unknown_navigation(entity: impl Into<String>, path: impl Into<String>) -> Self {
        AppError::UnknownNavigation {
            entity: entity.into(),
            path: path.into(),
        }
    }

    pub fn unknown_column(entity: impl Into<String>, column: impl Into<String>) -> Self {
        AppError::UnknownColumn {
            entity: entity.into(),
            column: column.into(),
        }
    }
}
